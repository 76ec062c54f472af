use lode_cells::CellError;
use lode_types::Hash;

/// Errors from store operations.
///
/// Cell errors pass through transparently so their kind survives: a
/// `BadFormat` from decoding store bytes is never reported as missing
/// data, and vice versa.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An error surfaced by the cell layer (bad format, missing data,
    /// invalid data).
    #[error(transparent)]
    Cell(#[from] CellError),

    /// Stored bytes do not hash to their key (data corruption).
    #[error("hash mismatch: key {expected} but encoding hashes to {computed}")]
    HashMismatch { expected: Hash, computed: Hash },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
