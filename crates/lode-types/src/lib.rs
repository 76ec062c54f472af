//! Foundation types for the Lodestone ledger core.
//!
//! This crate provides the content identity type used throughout the
//! system. Every other `lode` crate depends on `lode-types`.
//!
//! # Key Types
//!
//! - [`Hash`] — 32-byte SHA3-256 digest of a cell's canonical encoding;
//!   doubles as value identity and store key

pub mod error;
pub mod hash;

pub use error::TypeError;
pub use hash::{Hash, HASH_LENGTH};
