use lode_types::Hash;

/// Errors from cell construction, traversal, and decoding.
///
/// Error kinds are never converted into one another: a `BadFormat` stays a
/// `BadFormat` all the way up, and a `MissingData` is the only recoverable
/// kind (fetch the hash, retry).
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    /// A byte sequence does not decode to a canonical cell. The bytes must
    /// be discarded; retrying cannot succeed.
    #[error("bad format at byte {pos}: {reason}")]
    BadFormat { pos: usize, reason: String },

    /// A traversal reached a dehydrated ref whose target is not in memory.
    /// Recoverable: fetch the hash from a store or peer and retry.
    #[error("missing data: {0}")]
    MissingData(Hash),

    /// A structural invariant is violated (negative address, oversized
    /// name, non-TRUE set entry). A bug if produced internally.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Random access outside `[0, count)`. Programming error.
    #[error("index {index} out of bounds for count {count}")]
    IndexOutOfBounds { index: u64, count: u64 },

    /// Incompatible cell kinds mixed in an operation. Programming error.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl CellError {
    /// Shorthand for a `BadFormat` at a position.
    pub fn bad_format(pos: usize, reason: impl Into<String>) -> Self {
        Self::BadFormat {
            pos,
            reason: reason.into(),
        }
    }
}

/// Result alias for cell operations.
pub type CellResult<T> = Result<T, CellError>;
