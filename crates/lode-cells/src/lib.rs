//! Immutable content-addressed cells and the canonical encoding layer.
//!
//! This crate implements the value model at the heart of the Lodestone
//! ledger: a family of immutable, structurally shared cells — primitives,
//! blobs, addresses, maps, sets, vectors, and records — together with the
//! canonical binary encoding that gives every value exactly one byte
//! representation and therefore exactly one SHA3-256 hash.
//!
//! # Invariants
//!
//! - **Canonicality**: two cells are equal iff their encodings are
//!   byte-identical iff their hashes are equal. The decoder rejects any
//!   non-canonical byte sequence with [`CellError::BadFormat`].
//! - **Acyclicity**: the reference graph below any cell is a DAG.
//! - **Embedding**: a cell whose encoding is at most [`EMBEDDED_LIMIT`]
//!   bytes is inlined into its parent's encoding; anything larger appears
//!   as a hash ref.
//! - **Hash stability**: cells are immutable, so a hash never changes.
//!
//! # Key Types
//!
//! - [`Value`] — cheaply clonable handle to any cell
//! - [`CellRef`] — hash + optional target + monotone persistence status
//! - [`Map`], [`Set`], [`Vector`], [`Blob`], [`Record`], [`Address`] —
//!   the structured kinds
//! - [`decode`] — strict canonical decoder

pub mod address;
pub mod blob;
pub mod cell;
pub mod encoding;
pub mod error;
pub mod map;
pub mod record;
pub mod reference;
pub mod set;
pub mod tag;
pub mod vector;
pub mod vlc;

/// Maximum encoding length of an embedded cell, in bytes.
///
/// Validated against fixed test vectors: changing it changes every
/// downstream hash.
pub const EMBEDDED_LIMIT: usize = 140;

/// Byte length of a full blob chunk.
pub const CHUNK_SIZE: usize = 4096;

/// Maximum entries in a map leaf node.
pub const MAP_LEAF_MAX: usize = 8;

/// Branching factor of maps and vectors.
pub const BRANCH: usize = 16;

pub use address::Address;
pub use blob::Blob;
pub use cell::{Kind, Value, MAX_NAME_LENGTH};
pub use encoding::decode;
pub use error::{CellError, CellResult};
pub use map::Map;
pub use record::{Record, RecordSchema, ACCOUNT, BLOCK};
pub use reference::{CellRef, Status};
pub use set::Set;
pub use vector::Vector;
