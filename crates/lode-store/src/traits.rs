use lode_types::Hash;

use crate::error::StoreResult;

/// Append-oriented content-addressed byte store, keyed by hash.
///
/// All implementations must satisfy these invariants:
/// - A stored value equals its key under SHA3-256; `write` verifies this.
/// - Writes are idempotent: re-storing an existing key is a no-op, and at
///   most one physical write happens per hash even under concurrent
///   writers.
/// - A successful `write` is durable before it returns.
/// - Concurrent reads are always safe and proceed in parallel.
/// - The store never interprets encodings; closure over children is
///   maintained by the persistence walk above it, not here.
pub trait ContentStore: Send + Sync {
    /// Write `encoding` under `hash`.
    ///
    /// Fails with `HashMismatch` when the encoding does not hash to the
    /// key. Writing an existing key is a no-op.
    fn write(&self, hash: &Hash, encoding: &[u8]) -> StoreResult<()>;

    /// Read the encoding stored under `hash`, or `None` on a miss.
    fn read(&self, hash: &Hash) -> StoreResult<Option<Vec<u8>>>;

    /// Returns `true` if `hash` is present.
    fn contains(&self, hash: &Hash) -> StoreResult<bool>;

    /// Read multiple encodings in a batch.
    ///
    /// Default implementation calls `read()` per hash. Backends may
    /// override for fewer I/O round-trips.
    fn read_batch(&self, hashes: &[Hash]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        hashes.iter().map(|h| self.read(h)).collect()
    }
}
