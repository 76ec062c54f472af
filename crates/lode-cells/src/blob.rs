//! Byte blobs.
//!
//! A blob up to one chunk (4096 bytes) is a flat byte array. Longer blobs
//! are radix-16 trees over full 4096-byte chunks, with only the final
//! chunk allowed to be short. Tree shape is a pure function of the byte
//! count, so any construction path yields the same encoding and hash.

use std::fmt;
use std::sync::Arc;

use crate::cell::{Kind, Value};
use crate::error::{CellError, CellResult};
use crate::reference::CellRef;
use crate::CHUNK_SIZE;

const CHUNK: u64 = CHUNK_SIZE as u64;

/// A finite ordered byte sequence.
#[derive(Clone)]
pub enum Blob {
    /// Up to 4096 bytes, stored inline.
    Flat(Arc<[u8]>),
    /// More than 4096 bytes: a balanced tree over chunk blobs.
    Tree {
        /// Total byte count across all chunks.
        count: u64,
        /// Child blobs: full-span subtrees except the last.
        children: Vec<CellRef>,
    },
}

/// The per-child byte span at a tree level covering `count` bytes.
fn child_span(count: u64) -> u64 {
    let mut span = CHUNK;
    while span * 16 < count {
        span *= 16;
    }
    span
}

/// Canonical child byte counts for a tree node covering `count` bytes.
pub(crate) fn child_sizes(count: u64) -> Vec<u64> {
    debug_assert!(count > CHUNK);
    let span = child_span(count);
    let n = count.div_ceil(span);
    (0..n)
        .map(|i| if i == n - 1 { count - (n - 1) * span } else { span })
        .collect()
}

impl Blob {
    /// The empty blob.
    pub fn empty() -> Blob {
        Blob::Flat(Arc::from(&[][..]))
    }

    /// Build a blob in canonical shape from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Blob {
        if bytes.len() as u64 <= CHUNK {
            return Blob::Flat(Arc::from(bytes));
        }
        let count = bytes.len() as u64;
        let mut children = Vec::new();
        let mut offset = 0u64;
        for size in child_sizes(count) {
            let child = Blob::from_bytes(&bytes[offset as usize..(offset + size) as usize]);
            children.push(CellRef::direct(child.into_value()));
            offset += size;
        }
        Blob::Tree { count, children }
    }

    /// Total byte count.
    pub fn count(&self) -> u64 {
        match self {
            Blob::Flat(bytes) => bytes.len() as u64,
            Blob::Tree { count, .. } => *count,
        }
    }

    /// Returns `true` for the empty blob.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Wrap into a cell.
    pub fn into_value(self) -> Value {
        Value::from_kind(Kind::Blob(self))
    }

    pub(crate) fn ref_count(&self) -> usize {
        match self {
            Blob::Flat(_) => 0,
            Blob::Tree { children, .. } => children.len(),
        }
    }

    pub(crate) fn child_ref(&self, i: usize) -> CellRef {
        match self {
            Blob::Flat(_) => panic!("flat blob has no child refs"),
            Blob::Tree { children, .. } => children[i].clone(),
        }
    }

    pub(crate) fn update_refs(&self, f: &mut dyn FnMut(&CellRef) -> CellRef) -> Blob {
        match self {
            Blob::Flat(bytes) => Blob::Flat(bytes.clone()),
            Blob::Tree { count, children } => Blob::Tree {
                count: *count,
                children: children.iter().map(|r| f(r)).collect(),
            },
        }
    }

    fn check_range(&self, start: u64, end: u64) -> CellResult<()> {
        if start > end || end > self.count() {
            return Err(CellError::IndexOutOfBounds {
                index: end.max(start),
                count: self.count(),
            });
        }
        Ok(())
    }

    /// The byte at position `i`.
    pub fn byte_at(&self, i: u64) -> CellResult<u8> {
        if i >= self.count() {
            return Err(CellError::IndexOutOfBounds {
                index: i,
                count: self.count(),
            });
        }
        match self {
            Blob::Flat(bytes) => Ok(bytes[i as usize]),
            Blob::Tree { count, children } => {
                let span = child_span(*count);
                let child = child_blob(&children[(i / span) as usize])?;
                child.byte_at(i % span)
            }
        }
    }

    /// Bulk-copy `count` bytes starting at `pos` into `dest`.
    pub fn read(&self, pos: u64, count: u64, dest: &mut [u8]) -> CellResult<()> {
        let end = pos.checked_add(count).ok_or(CellError::IndexOutOfBounds {
            index: u64::MAX,
            count: self.count(),
        })?;
        self.check_range(pos, end)?;
        if (dest.len() as u64) < count {
            return Err(CellError::IndexOutOfBounds {
                index: count,
                count: dest.len() as u64,
            });
        }
        self.read_into(pos, count, &mut dest[..count as usize])
    }

    fn read_into(&self, pos: u64, count: u64, dest: &mut [u8]) -> CellResult<()> {
        if count == 0 {
            return Ok(());
        }
        match self {
            Blob::Flat(bytes) => {
                dest.copy_from_slice(&bytes[pos as usize..(pos + count) as usize]);
                Ok(())
            }
            Blob::Tree {
                count: total,
                children,
            } => {
                let span = child_span(*total);
                let mut copied = 0u64;
                let mut at = pos;
                while copied < count {
                    let idx = (at / span) as usize;
                    let child = child_blob(&children[idx])?;
                    let child_off = at % span;
                    let take = (count - copied).min(child.count() - child_off);
                    child.read_into(
                        child_off,
                        take,
                        &mut dest[copied as usize..(copied + take) as usize],
                    )?;
                    copied += take;
                    at += take;
                }
                Ok(())
            }
        }
    }

    /// The full content as a contiguous byte vector.
    pub fn to_bytes(&self) -> CellResult<Vec<u8>> {
        let mut out = vec![0u8; self.count() as usize];
        self.read_into(0, self.count(), &mut out)?;
        Ok(out)
    }

    /// Collect refs to the leaf chunks, left to right.
    ///
    /// Existing chunk refs are shared; only a root-level flat blob gets a
    /// fresh ref.
    fn chunk_refs(&self, out: &mut Vec<(CellRef, u64)>) -> CellResult<()> {
        match self {
            Blob::Flat(bytes) => {
                let len = bytes.len() as u64;
                let chunk = Blob::Flat(bytes.clone());
                out.push((CellRef::direct(chunk.into_value()), len));
                Ok(())
            }
            Blob::Tree { children, .. } => {
                for r in children {
                    let child = child_blob(r)?;
                    match child {
                        Blob::Flat(_) => out.push((r.clone(), child.count())),
                        Blob::Tree { .. } => child.chunk_refs(out)?,
                    }
                }
                Ok(())
            }
        }
    }

    /// Rebuild the canonical tree over an ordered chunk list. Every chunk
    /// must be full except the last.
    fn from_chunks(chunks: &[(CellRef, u64)]) -> CellResult<Blob> {
        match chunks {
            [] => Ok(Blob::empty()),
            [(r, _)] => child_blob(r),
            _ => {
                let total: u64 = chunks.iter().map(|(_, len)| len).sum();
                let span = child_span(total);
                let per_child = (span / CHUNK) as usize;
                let mut children = Vec::new();
                for group in chunks.chunks(per_child) {
                    if group.len() == 1 {
                        children.push(group[0].0.clone());
                    } else {
                        let sub = Blob::from_chunks(group)?;
                        children.push(CellRef::direct(sub.into_value()));
                    }
                }
                Ok(Blob::Tree {
                    count: total,
                    children,
                })
            }
        }
    }

    /// The sub-sequence `[start, end)`, sharing whole chunks when `start`
    /// is chunk-aligned.
    pub fn slice(&self, start: u64, end: u64) -> CellResult<Blob> {
        self.check_range(start, end)?;
        let len = end - start;
        if len <= CHUNK || start % CHUNK != 0 {
            // Small or misaligned: a bulk copy is the canonical result.
            let mut out = vec![0u8; len as usize];
            self.read_into(start, len, &mut out)?;
            return Ok(Blob::from_bytes(&out));
        }
        let mut chunks = Vec::new();
        self.chunk_refs(&mut chunks)?;
        let first = (start / CHUNK) as usize;
        let mut taken = Vec::new();
        let mut remaining = len;
        for (r, chunk_len) in &chunks[first..] {
            if remaining == 0 {
                break;
            }
            if remaining >= *chunk_len {
                taken.push((r.clone(), *chunk_len));
                remaining -= chunk_len;
            } else {
                let bytes = child_blob(r)?.to_bytes()?;
                let partial = Blob::from_bytes(&bytes[..remaining as usize]);
                taken.push((CellRef::direct(partial.into_value()), remaining));
                remaining = 0;
            }
        }
        Blob::from_chunks(&taken)
    }

    /// Concatenate `other` after this blob, rebalancing into the shape a
    /// bulk construction of the same content would take.
    pub fn append(&self, other: &Blob) -> CellResult<Blob> {
        if self.is_empty() {
            return Ok(other.clone());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        let total = self.count() + other.count();
        if total <= CHUNK {
            let mut bytes = self.to_bytes()?;
            bytes.extend(other.to_bytes()?);
            return Ok(Blob::from_bytes(&bytes));
        }
        let mut chunks = Vec::new();
        self.chunk_refs(&mut chunks)?;
        if self.count() % CHUNK == 0 {
            // Chunk-aligned: share both sides wholesale.
            other.chunk_refs(&mut chunks)?;
            return Blob::from_chunks(&chunks);
        }
        // Re-chunk from the trailing partial chunk onward.
        let (partial, partial_len) = chunks.pop().expect("non-aligned blob has a chunk");
        let mut tail = child_blob(&partial)?.to_bytes()?;
        debug_assert_eq!(tail.len() as u64, partial_len);
        tail.extend(other.to_bytes()?);
        for piece in tail.chunks(CHUNK as usize) {
            let chunk = Blob::from_bytes(piece);
            chunks.push((CellRef::direct(chunk.into_value()), piece.len() as u64));
        }
        Blob::from_chunks(&chunks)
    }

    /// Overwrite `replacement.count()` bytes starting at `pos`, sharing
    /// structure with the unchanged head and tail.
    pub fn replace_slice(&self, pos: u64, replacement: &Blob) -> CellResult<Blob> {
        let rep_end = pos
            .checked_add(replacement.count())
            .ok_or(CellError::IndexOutOfBounds {
                index: u64::MAX,
                count: self.count(),
            })?;
        self.check_range(pos, rep_end)?;
        let head = self.slice(0, pos)?;
        let tail = self.slice(rep_end, self.count())?;
        head.append(replacement)?.append(&tail)
    }

    pub(crate) fn estimated_encoding_size(&self) -> usize {
        match self {
            Blob::Flat(bytes) => 11 + bytes.len(),
            Blob::Tree { children, .. } => 12 + 33 * children.len(),
        }
    }
}

/// View a tree child as a blob; non-blob children are invalid data.
fn child_blob(r: &CellRef) -> CellResult<Blob> {
    let v = r.value()?;
    match v.kind() {
        Kind::Blob(b) => Ok(b.clone()),
        _ => Err(CellError::InvalidData(
            "blob tree child is not a blob".into(),
        )),
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.count())
    }
}

impl fmt::Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blob::Flat(bytes) if bytes.len() <= 32 => {
                write!(f, "0x")?;
                for b in bytes.iter() {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            _ => write!(f, "<blob:{}>", self.count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    // -----------------------------------------------------------------------
    // Shape
    // -----------------------------------------------------------------------

    #[test]
    fn small_blob_is_flat() {
        let b = Blob::from_bytes(&pattern(4096));
        assert!(matches!(b, Blob::Flat(_)));
        assert_eq!(b.count(), 4096);
    }

    #[test]
    fn blob_of_8193_bytes_has_three_chunks() {
        let b = Blob::from_bytes(&pattern(8193));
        let Blob::Tree { count, children } = &b else {
            panic!("expected chunk tree");
        };
        assert_eq!(*count, 8193);
        assert_eq!(children.len(), 3);
        let sizes: Vec<u64> = children
            .iter()
            .map(|r| r.cell().unwrap().as_blob().unwrap().count())
            .collect();
        assert_eq!(sizes, vec![4096, 4096, 1]);
    }

    #[test]
    fn deep_tree_child_sizes() {
        assert_eq!(child_sizes(8193), vec![4096, 4096, 1]);
        assert_eq!(child_sizes(65536).len(), 16);
        assert_eq!(child_sizes(65537), vec![65536, 1]);
        assert_eq!(child_sizes(200_000), vec![65536, 65536, 65536, 3392]);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[test]
    fn byte_at_matches_source() {
        let data = pattern(10_000);
        let b = Blob::from_bytes(&data);
        for i in [0u64, 4095, 4096, 8191, 8192, 9999] {
            assert_eq!(b.byte_at(i).unwrap(), data[i as usize]);
        }
        assert!(matches!(
            b.byte_at(10_000),
            Err(CellError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn read_copies_across_chunk_boundaries() {
        let data = pattern(9000);
        let b = Blob::from_bytes(&data);
        let mut dest = [0u8; 100];
        b.read(4050, 100, &mut dest).unwrap();
        assert_eq!(&dest[..], &data[4050..4150]);
    }

    #[test]
    fn read_rejects_short_destination() {
        let b = Blob::from_bytes(&pattern(100));
        let mut dest = [0u8; 4];
        assert!(b.read(0, 10, &mut dest).is_err());
    }

    #[test]
    fn to_bytes_roundtrip() {
        let data = pattern(70_000);
        assert_eq!(Blob::from_bytes(&data).to_bytes().unwrap(), data);
    }

    // -----------------------------------------------------------------------
    // Slice
    // -----------------------------------------------------------------------

    #[test]
    fn slice_across_chunk_boundary() {
        let data = pattern(8193);
        let b = Blob::from_bytes(&data);
        let s = b.slice(4095, 4098).unwrap();
        assert!(matches!(s, Blob::Flat(_)));
        assert_eq!(s.to_bytes().unwrap(), &data[4095..4098]);
    }

    #[test]
    fn aligned_slice_shares_chunks() {
        let data = pattern(20_000);
        let b = Blob::from_bytes(&data);
        let s = b.slice(4096, 14_000).unwrap();
        assert_eq!(s.to_bytes().unwrap(), &data[4096..14_000]);
        // Canonical shape: equal to a bulk construction of the same bytes.
        let bulk = Blob::from_bytes(&data[4096..14_000]);
        assert_eq!(s.into_value(), bulk.into_value());
    }

    #[test]
    fn slice_bounds_checked() {
        let b = Blob::from_bytes(&pattern(10));
        assert!(b.slice(5, 11).is_err());
        assert!(b.slice(7, 3).is_err());
    }

    // -----------------------------------------------------------------------
    // Append / replace
    // -----------------------------------------------------------------------

    #[test]
    fn append_matches_bulk_construction() {
        for (a, b) in [(0usize, 5000usize), (4096, 4097), (5000, 9000), (8192, 1)] {
            let left = pattern(a);
            let right: Vec<u8> = pattern(b).iter().map(|x| x ^ 0x55).collect();
            let joined = Blob::from_bytes(&left)
                .append(&Blob::from_bytes(&right))
                .unwrap();
            let mut bytes = left.clone();
            bytes.extend(&right);
            assert_eq!(joined.into_value(), Blob::from_bytes(&bytes).into_value());
        }
    }

    #[test]
    fn replace_slice_matches_splice() {
        let data = pattern(12_000);
        let rep: Vec<u8> = (0..300).map(|i| (i % 7) as u8).collect();
        let b = Blob::from_bytes(&data);
        let replaced = b.replace_slice(5000, &Blob::from_bytes(&rep)).unwrap();
        let mut expect = data.clone();
        expect[5000..5300].copy_from_slice(&rep);
        assert_eq!(
            replaced.into_value(),
            Blob::from_bytes(&expect).into_value()
        );
    }

    #[test]
    fn replace_slice_bounds_checked() {
        let b = Blob::from_bytes(&pattern(100));
        let rep = Blob::from_bytes(&[1, 2, 3]);
        assert!(b.replace_slice(98, &rep).is_err());
    }
}
