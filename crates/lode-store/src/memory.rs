use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lode_types::Hash;

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. Encodings are held behind a `RwLock`
/// for safe concurrent access and shared via `Arc`, so reads never copy
/// the stored bytes more than once per caller.
pub struct InMemoryStore {
    entries: RwLock<HashMap<Hash, Arc<[u8]>>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of encodings currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored encodings.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|e| e.len() as u64)
            .sum()
    }

    /// Remove all encodings from the store.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }

    /// Return a sorted list of all stored hashes.
    pub fn all_hashes(&self) -> Vec<Hash> {
        let map = self.entries.read().expect("lock poisoned");
        let mut hashes: Vec<Hash> = map.keys().copied().collect();
        hashes.sort();
        hashes
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for InMemoryStore {
    fn write(&self, hash: &Hash, encoding: &[u8]) -> StoreResult<()> {
        let computed = Hash::digest(encoding);
        if computed != *hash {
            return Err(StoreError::HashMismatch {
                expected: *hash,
                computed,
            });
        }
        let mut map = self.entries.write().expect("lock poisoned");
        // Idempotent: content-addressing guarantees an existing key holds
        // the same bytes, so the first write wins and later ones are
        // no-ops.
        map.entry(*hash).or_insert_with(|| Arc::from(encoding));
        Ok(())
    }

    fn read(&self, hash: &Hash) -> StoreResult<Option<Vec<u8>>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(hash).map(|e| e.to_vec()))
    }

    fn contains(&self, hash: &Hash) -> StoreResult<bool> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.contains_key(hash))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entry_count", &self.len())
            .finish()
    }
}
