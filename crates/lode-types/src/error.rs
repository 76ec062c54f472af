/// Errors from foundation type conversions.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    /// A string is not valid hexadecimal.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A byte sequence has the wrong length for the target type.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
