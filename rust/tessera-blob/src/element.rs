//! The closed set of element kinds a buffer can hold.

use std::fmt;

use half::{bf16, f16};

/// Numeric category of an element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericClass {
    Unsigned,
    Signed,
    Float,
}

/// Tag identifying the numeric type of a buffer's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F16,
    BF16,
    F32,
    F64,
}

impl ElementKind {
    pub const ALL: [ElementKind; 12] = [
        ElementKind::U8,
        ElementKind::I8,
        ElementKind::U16,
        ElementKind::I16,
        ElementKind::U32,
        ElementKind::I32,
        ElementKind::U64,
        ElementKind::I64,
        ElementKind::F16,
        ElementKind::BF16,
        ElementKind::F32,
        ElementKind::F64,
    ];

    /// Size of one element, in bytes.
    pub const fn width(self) -> usize {
        match self {
            ElementKind::U8 | ElementKind::I8 => 1,
            ElementKind::U16 | ElementKind::I16 | ElementKind::F16 | ElementKind::BF16 => 2,
            ElementKind::U32 | ElementKind::I32 | ElementKind::F32 => 4,
            ElementKind::U64 | ElementKind::I64 | ElementKind::F64 => 8,
        }
    }

    pub const fn class(self) -> NumericClass {
        match self {
            ElementKind::U8 | ElementKind::U16 | ElementKind::U32 | ElementKind::U64 => {
                NumericClass::Unsigned
            }
            ElementKind::I8 | ElementKind::I16 | ElementKind::I32 | ElementKind::I64 => {
                NumericClass::Signed
            }
            ElementKind::F16 | ElementKind::BF16 | ElementKind::F32 | ElementKind::F64 => {
                NumericClass::Float
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementKind::U8 => "u8",
            ElementKind::I8 => "i8",
            ElementKind::U16 => "u16",
            ElementKind::I16 => "i16",
            ElementKind::U32 => "u32",
            ElementKind::I32 => "i32",
            ElementKind::U64 => "u64",
            ElementKind::I64 => "i64",
            ElementKind::F16 => "f16",
            ElementKind::BF16 => "bf16",
            ElementKind::F32 => "f32",
            ElementKind::F64 => "f64",
        }
    }

    #[inline]
    pub fn is_float(self) -> bool {
        self.class() == NumericClass::Float
    }

    /// Whether the kind is one of the signed or unsigned integer kinds.
    #[inline]
    pub fn is_integer(self) -> bool {
        self.class() != NumericClass::Float
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust type that can be read from and written to buffer memory.
///
/// Implemented for exactly one type per [`ElementKind`]; the trait is sealed.
pub trait Element: bytemuck::Pod + PartialEq + fmt::Debug + sealed::Sealed {
    const KIND: ElementKind;
}

mod sealed {
    pub trait Sealed {}
}

macro_rules! impl_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const KIND: ElementKind = ElementKind::$kind;
            }
        )*
    };
}

impl_element! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f16 => F16,
    bf16 => BF16,
    f32 => F32,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_width<T: Element>() {
        assert_eq!(T::KIND.width(), std::mem::size_of::<T>(), "{}", T::KIND);
    }

    #[test]
    fn test_widths_match_rust_types() {
        check_width::<u8>();
        check_width::<i8>();
        check_width::<u16>();
        check_width::<i16>();
        check_width::<u32>();
        check_width::<i32>();
        check_width::<u64>();
        check_width::<i64>();
        check_width::<f16>();
        check_width::<bf16>();
        check_width::<f32>();
        check_width::<f64>();
    }

    #[test]
    fn test_classes() {
        assert_eq!(ElementKind::U16.class(), NumericClass::Unsigned);
        assert_eq!(ElementKind::I64.class(), NumericClass::Signed);
        assert_eq!(ElementKind::BF16.class(), NumericClass::Float);
        assert!(ElementKind::F32.is_float());
        assert!(!ElementKind::F32.is_integer());
        assert!(ElementKind::U8.is_integer());
        assert!(ElementKind::I8.is_integer());

        let floats = ElementKind::ALL.iter().filter(|k| k.is_float()).count();
        assert_eq!(floats, 4);
        let integers = ElementKind::ALL.iter().filter(|k| k.is_integer()).count();
        assert_eq!(integers, 8);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names = ElementKind::ALL.map(|k| k.to_string()).to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ElementKind::ALL.len());
    }
}
