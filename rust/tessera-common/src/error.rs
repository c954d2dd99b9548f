use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn allocation_failure(requested: usize, reason: impl Into<String>) -> Error {
        ErrorKind::AllocationFailure {
            requested,
            reason: reason.into(),
        }
        .into()
    }

    pub fn already_allocated() -> Error {
        ErrorKind::AlreadyAllocated.into()
    }

    pub fn undetermined_shape() -> Error {
        ErrorKind::UndeterminedShape.into()
    }

    pub fn out_of_range(offset: usize, len: usize, available: usize) -> Error {
        ErrorKind::OutOfRange {
            offset,
            len,
            available,
        }
        .into()
    }

    pub fn protocol_violation(message: impl Into<String>) -> Error {
        ErrorKind::ProtocolViolation {
            message: message.into(),
        }
        .into()
    }

    pub fn element_kind_mismatch(expected: &'static str, actual: &'static str) -> Error {
        ErrorKind::ElementKindMismatch { expected, actual }.into()
    }

    pub fn misaligned(offset: usize, alignment: usize) -> Error {
        ErrorKind::Misaligned { offset, alignment }.into()
    }

    pub fn unknown_buffer(index: u32, generation: u32) -> Error {
        ErrorKind::UnknownBuffer { index, generation }.into()
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        ErrorKind::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
        .into()
    }

    /// Returns `true` for window violations reported by proxy construction.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind(), ErrorKind::OutOfRange { .. })
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self.kind(), ErrorKind::ProtocolViolation { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("failed to allocate {requested} bytes: {reason}")]
    AllocationFailure { requested: usize, reason: String },

    #[error("buffer is already allocated")]
    AlreadyAllocated,

    #[error("buffer shape is undetermined (element count is zero)")]
    UndeterminedShape,

    #[error("window of {len} bytes at offset {offset} exceeds {available} available bytes")]
    OutOfRange {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("lock protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("element kind mismatch: expected {expected}, got {actual}")]
    ElementKindMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("window at byte offset {offset} is not aligned to {alignment} bytes")]
    Misaligned { offset: usize, alignment: usize },

    #[error("unknown buffer id (index {index}, generation {generation})")]
    UnknownBuffer { index: u32, generation: u32 },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_round_trip() {
        let err = Error::out_of_range(4, 12, 12);
        assert!(err.is_out_of_range());
        assert!(!err.is_protocol_violation());
        match err.into_kind() {
            ErrorKind::OutOfRange {
                offset,
                len,
                available,
            } => {
                assert_eq!((offset, len, available), (4, 12, 12));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = Error::element_kind_mismatch("f32", "u8");
        assert_eq!(
            err.to_string(),
            "element kind mismatch: expected f32, got u8"
        );

        let err = Error::allocation_failure(64, "capacity limit reached");
        assert_eq!(
            err.to_string(),
            "failed to allocate 64 bytes: capacity limit reached"
        );
    }
}
