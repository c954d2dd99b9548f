//! `Result` alias and argument checks shared by the tessera crates.

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Returns an `InvalidArgument` error from the enclosing function unless
/// `$expr` holds. `$name` names the offending argument.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Non-macro form of [`verify_arg!`].
#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

/// Reports `name` as invalid because `condition` does not hold.
#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(Error::invalid_arg(name, format!("expected {condition}")))
}
