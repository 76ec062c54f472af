//! The tag byte table.
//!
//! Byte 0 of every canonical encoding is a tag identifying the cell kind.
//! Tag assignments are part of the public contract: changing any value
//! changes every downstream hash.

/// Boolean `false`.
pub const FALSE: u8 = 0x00;
/// Boolean `true`.
pub const TRUE: u8 = 0x01;

/// Base tag for 64-bit integers. The low nibble carries the payload byte
/// length (0..=8); the payload is the minimal big-endian two's-complement
/// representation.
pub const LONG_BASE: u8 = 0x10;
/// Highest valid long tag (`LONG_BASE + 8`).
pub const LONG_MAX: u8 = 0x18;

/// Unicode character (VLC scalar value).
pub const CHAR: u8 = 0x1C;

/// Reference-by-hash: 32 raw hash bytes follow.
pub const REF: u8 = 0x20;
/// Account address (VLC count).
pub const ADDRESS: u8 = 0x21;

/// UTF-8 string (VLC byte length + bytes).
pub const STRING: u8 = 0x30;
/// Blob: flat when count <= 4096, chunk tree above.
pub const BLOB: u8 = 0x31;
/// Symbol (VLC byte length + UTF-8 name).
pub const SYMBOL: u8 = 0x33;
/// Keyword (VLC byte length + UTF-8 name).
pub const KEYWORD: u8 = 0x34;

/// Vector root (tail + packed prefix children).
pub const VECTOR: u8 = 0x80;
/// Packed vector chunk of exactly 16 elements.
pub const VCHUNK: u8 = 0x81;
/// Packed vector subtree (count a multiple of 16, >= 32).
pub const VNODE: u8 = 0x82;

/// Hash map: leaf payload when count <= 8, tree payload above.
pub const MAP: u8 = 0x90;
/// Hash set: raw map payload without the inner map tag.
pub const SET: u8 = 0x93;

/// First record tag. Each registered schema owns one tag in
/// `RECORD_BASE..=RECORD_MAX`.
pub const RECORD_BASE: u8 = 0xA0;
/// Last record tag.
pub const RECORD_MAX: u8 = 0xAF;

/// Returns `true` if `tag` identifies a long cell.
pub fn is_long(tag: u8) -> bool {
    (LONG_BASE..=LONG_MAX).contains(&tag)
}

/// Returns `true` if `tag` identifies a record schema.
pub fn is_record(tag: u8) -> bool {
    (RECORD_BASE..=RECORD_MAX).contains(&tag)
}
