//! The reference layer.
//!
//! A [`CellRef`] is the sole mechanism by which a parent cell refers to a
//! non-embedded child, and the unit the store promotes during
//! persistence. A ref always knows (or can compute) its target's hash; it
//! may or may not hold the target cell itself. Status only ever increases.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use lode_types::Hash;

use crate::cell::Value;
use crate::error::{CellError, CellResult};

/// Persistence status of a ref, a monotone lattice.
///
/// `Unknown < Embedded < Stored < Persisted < Announced < Verified`.
/// `Embedded` is terminal: an embedded cell lives inside its parent's
/// encoding and is never written to a store on its own. `Announced` and
/// `Verified` are reserved for consensus-time guarantees and are never
/// asserted by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Status {
    /// Nothing is known about persistence.
    Unknown = 0,
    /// The target is embedded in its parent's encoding.
    Embedded = 1,
    /// The target's encoding is present in some store.
    Stored = 2,
    /// The target and its full subtree are reachable from the store.
    Persisted = 3,
    /// The target has been announced to peers.
    Announced = 4,
    /// The target has been verified by consensus.
    Verified = 5,
}

impl Status {
    fn from_u8(v: u8) -> Status {
        match v {
            0 => Status::Unknown,
            1 => Status::Embedded,
            2 => Status::Stored,
            3 => Status::Persisted,
            4 => Status::Announced,
            _ => Status::Verified,
        }
    }
}

struct RefInner {
    /// The target cell, if in memory. Monotone: empty until hydrated.
    value: OnceLock<Value>,
    /// The target's hash. Set eagerly for soft refs, lazily for direct.
    hash: OnceLock<Hash>,
    /// Current `Status`, raised with `fetch_max` only.
    status: AtomicU8,
}

/// A handle to a cell: the target's hash, optionally the target itself,
/// and a monotone persistence status.
///
/// Cloning shares the inner state, so hydration and status promotion
/// through any clone are visible to every holder, including the parent
/// cell the ref is embedded in. Races on the caches produce redundant
/// work, never torn values.
#[derive(Clone)]
pub struct CellRef {
    inner: Arc<RefInner>,
}

impl CellRef {
    /// Create a ref holding an in-memory target.
    pub fn direct(value: Value) -> Self {
        let status = if value.is_embedded() {
            Status::Embedded
        } else {
            Status::Unknown
        };
        let inner = RefInner {
            value: OnceLock::new(),
            hash: OnceLock::new(),
            status: AtomicU8::new(status as u8),
        };
        let _ = inner.value.set(value);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Create a dehydrated ref from a hash alone.
    ///
    /// The status must be at least `Stored`: a hash-only ref can only
    /// come from an encoding or a store, both of which imply storage.
    pub fn soft(hash: Hash, status: Status) -> Self {
        let status = status.max(Status::Stored);
        let inner = RefInner {
            value: OnceLock::new(),
            hash: OnceLock::new(),
            status: AtomicU8::new(status as u8),
        };
        let _ = inner.hash.set(hash);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The target cell, if in memory.
    pub fn cell(&self) -> Option<&Value> {
        self.inner.value.get()
    }

    /// The target cell; fails with `MissingData(hash)` when dehydrated.
    pub fn value(&self) -> CellResult<Value> {
        self.cell()
            .cloned()
            .ok_or_else(|| CellError::MissingData(self.hash()))
    }

    /// The target's hash, computed and cached on first call for
    /// in-memory refs.
    pub fn hash(&self) -> Hash {
        *self.inner.hash.get_or_init(|| {
            self.inner
                .value
                .get()
                .expect("ref carries neither value nor hash")
                .hash()
        })
    }

    /// Current persistence status.
    pub fn status(&self) -> Status {
        Status::from_u8(self.inner.status.load(Ordering::Acquire))
    }

    /// Raise the status to at least `status`. Lowering is impossible and
    /// embedded refs are terminal, so this is a no-op for both.
    pub fn raise_status(&self, status: Status) {
        if self.is_embedded() {
            return;
        }
        self.inner
            .status
            .fetch_max(status as u8, Ordering::AcqRel);
    }

    /// Returns `true` if the target is embedded in its parent's encoding.
    pub fn is_embedded(&self) -> bool {
        match self.inner.value.get() {
            Some(v) => v.is_embedded(),
            None => self.status() == Status::Embedded,
        }
    }

    /// Returns `true` if the target is not in memory.
    pub fn is_missing(&self) -> bool {
        self.inner.value.get().is_none()
    }

    /// Hydrate a dehydrated ref with its target.
    ///
    /// Rejects a value whose hash differs from the ref's hash with
    /// `InvalidData`. Filling an already-hydrated ref with the equal
    /// value is a no-op.
    pub fn fill(&self, value: Value) -> CellResult<()> {
        if value.hash() != self.hash() {
            return Err(CellError::InvalidData(format!(
                "cell hash {} does not match ref hash {}",
                value.hash().short_hex(),
                self.hash().short_hex()
            )));
        }
        let _ = self.inner.value.set(value);
        Ok(())
    }
}

impl PartialEq for CellRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.hash() == other.hash()
    }
}

impl Eq for CellRef {}

impl fmt::Debug for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellRef")
            .field("hash", &self.hash().short_hex())
            .field("status", &self.status())
            .field("loaded", &!self.is_missing())
            .finish()
    }
}
