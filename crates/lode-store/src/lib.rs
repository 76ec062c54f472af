//! Content-addressed storage for Lodestone cells.
//!
//! This crate implements the store layer beneath the cell model: an
//! append-oriented map from 32-byte hashes to canonical encodings, plus
//! the persistence walk that promotes a cell and its descendants through
//! the status lattice.
//!
//! # Design Rules
//!
//! 1. A stored value equals its key under the hash function; `write`
//!    verifies this.
//! 2. Children are stored before parents, so the store is always closed
//!    over child references.
//! 3. Writes are idempotent and durable before `write` returns; at most
//!    one physical write happens per hash.
//! 4. Concurrent reads are always safe; the store mediates its own
//!    internal synchronisation.
//! 5. The store never interprets encodings; decoding and verification
//!    happen in the persistence layer above it.
//! 6. A store miss (or an expired deadline) surfaces as `MissingData`;
//!    corruption surfaces as `HashMismatch` or `BadFormat`. Kinds are
//!    never converted into one another.

pub mod error;
pub mod memory;
pub mod persist;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use persist::{
    acquire, acquire_tree, hydrate, persist, ref_for_hash, store_ref, store_ref_with,
    store_top_ref,
};
pub use traits::ContentStore;
