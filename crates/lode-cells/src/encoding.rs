//! The canonical binary codec.
//!
//! Every cell encodes as a tag byte followed by a kind-specific payload.
//! Children appear as *slots*: the full inline encoding when the child is
//! embedded (≤ 140 bytes), or the ref tag plus 32 hash bytes otherwise.
//! The decoder enforces canonical form byte-for-byte — any deviation is a
//! `BadFormat`, never silently repaired — and attaches the parsed slice
//! to the decoded cell so a re-encode is bit-identical by construction.

use lode_types::Hash;

use crate::blob::{self, Blob};
use crate::cell::{Kind, Value, MAX_NAME_LENGTH};
use crate::error::{CellError, CellResult};
use crate::map::{Map, MapEntry, MapLeaf, MapTree};
use crate::record::{schema_for_tag, Record};
use crate::reference::{CellRef, Status};
use crate::set::Set;
use crate::vector::{self, Vector, VectorNode};
use crate::vlc::{read_count, write_count};
use crate::{tag, CHUNK_SIZE, EMBEDDED_LIMIT, MAP_LEAF_MAX};

/// Minimal big-endian two's-complement payload length for a long.
pub(crate) fn long_payload_length(n: i64) -> u8 {
    if n == 0 {
        return 0;
    }
    let bytes = n.to_be_bytes();
    let mut i = 0;
    while i < 7 {
        if bytes[i] == 0x00 && bytes[i + 1] < 0x80 {
            i += 1;
        } else if bytes[i] == 0xFF && bytes[i + 1] >= 0x80 {
            i += 1;
        } else {
            break;
        }
    }
    (8 - i) as u8
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Write the full canonical encoding of `value` (tag + payload).
pub(crate) fn encode_cell(value: &Value, buf: &mut Vec<u8>) {
    match value.kind() {
        Kind::Boolean(b) => buf.push(if *b { tag::TRUE } else { tag::FALSE }),
        Kind::Long(n) => {
            let len = long_payload_length(*n);
            buf.push(tag::LONG_BASE + len);
            buf.extend_from_slice(&n.to_be_bytes()[8 - len as usize..]);
        }
        Kind::Char(c) => {
            buf.push(tag::CHAR);
            write_count(buf, *c as u64);
        }
        Kind::Text(s) => {
            buf.push(tag::STRING);
            write_count(buf, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Kind::Keyword(s) => {
            buf.push(tag::KEYWORD);
            write_count(buf, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Kind::Symbol(s) => {
            buf.push(tag::SYMBOL);
            write_count(buf, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Kind::Address(a) => {
            buf.push(tag::ADDRESS);
            write_count(buf, a.index());
        }
        Kind::Blob(b) => {
            buf.push(tag::BLOB);
            encode_blob_payload(b, buf);
        }
        Kind::Map(m) => {
            buf.push(tag::MAP);
            encode_map_payload(m, buf);
        }
        Kind::Set(s) => {
            buf.push(tag::SET);
            encode_map_payload(s.map(), buf);
        }
        Kind::Vector(v) => {
            buf.push(tag::VECTOR);
            encode_vector_payload(v, buf);
        }
        Kind::VectorChunk(items) => {
            buf.push(tag::VCHUNK);
            for r in items {
                write_slot(r, buf);
            }
        }
        Kind::VectorNode(n) => {
            buf.push(tag::VNODE);
            write_count(buf, n.count);
            for r in &n.children {
                write_slot(r, buf);
            }
        }
        Kind::Record(r) => {
            buf.push(r.schema().tag);
            for i in 0..r.field_count() {
                write_slot(&r.child_ref(i), buf);
            }
        }
    }
}

/// Write a child slot: inline for embedded targets, hash ref otherwise.
pub(crate) fn write_slot(r: &CellRef, buf: &mut Vec<u8>) {
    match r.cell() {
        Some(v) if v.is_embedded() => buf.extend_from_slice(v.encoding()),
        _ => {
            buf.push(tag::REF);
            buf.extend_from_slice(r.hash().as_bytes());
        }
    }
}

fn encode_blob_payload(b: &Blob, buf: &mut Vec<u8>) {
    write_count(buf, b.count());
    match b {
        Blob::Flat(bytes) => buf.extend_from_slice(bytes),
        Blob::Tree { children, .. } => {
            write_count(buf, children.len() as u64);
            for r in children {
                write_slot(r, buf);
            }
        }
    }
}

fn encode_map_payload(m: &Map, buf: &mut Vec<u8>) {
    match m {
        Map::Leaf(l) => {
            write_count(buf, l.entries.len() as u64);
            for e in &l.entries {
                write_slot(&e.key, buf);
                write_slot(&e.value, buf);
            }
        }
        Map::Tree(t) => {
            write_count(buf, t.count);
            buf.extend_from_slice(&t.mask.to_be_bytes());
            write_count(buf, t.shift as u64);
            for r in &t.children {
                write_slot(r, buf);
            }
        }
    }
}

fn encode_vector_payload(v: &Vector, buf: &mut Vec<u8>) {
    write_count(buf, v.count());
    write_count(buf, v.tail().len() as u64);
    for r in v.tail() {
        write_slot(r, buf);
    }
    write_count(buf, v.children().len() as u64);
    for r in v.children() {
        write_slot(r, buf);
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a complete top-level cell, consuming every byte.
pub fn decode(bytes: &[u8]) -> CellResult<Value> {
    let mut pos = 0;
    let value = read_cell(bytes, &mut pos)?;
    if pos != bytes.len() {
        return Err(CellError::bad_format(pos, "trailing bytes after cell"));
    }
    Ok(value)
}

/// Parse one cell at `*pos`, advancing past it. The parsed slice is
/// attached as the cell's cached encoding.
pub(crate) fn read_cell(buf: &[u8], pos: &mut usize) -> CellResult<Value> {
    let start = *pos;
    let t = *buf
        .get(*pos)
        .ok_or_else(|| CellError::bad_format(start, "missing tag byte"))?;
    *pos += 1;
    let kind = match t {
        tag::FALSE => Kind::Boolean(false),
        tag::TRUE => Kind::Boolean(true),
        t if tag::is_long(t) => read_long(buf, pos, (t - tag::LONG_BASE) as usize)?,
        tag::CHAR => {
            let cp = read_count(buf, pos)?;
            let c = u32::try_from(cp)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| CellError::bad_format(start, "invalid character scalar"))?;
            Kind::Char(c)
        }
        tag::ADDRESS => {
            let index = read_count(buf, pos)?;
            Kind::Address(crate::address::Address::new(index))
        }
        tag::STRING => Kind::Text(read_utf8(buf, pos, usize::MAX)?),
        tag::KEYWORD => Kind::Keyword(read_name(buf, pos)?),
        tag::SYMBOL => Kind::Symbol(read_name(buf, pos)?),
        tag::BLOB => Kind::Blob(read_blob_payload(buf, pos)?),
        tag::MAP => Kind::Map(read_map_payload(buf, pos)?),
        tag::SET => {
            let m = read_map_payload(buf, pos)?;
            if m.validate_set_values().is_err() {
                return Err(CellError::bad_format(start, "set entry value is not TRUE"));
            }
            Kind::Set(Set::wrap(m))
        }
        tag::VECTOR => Kind::Vector(read_vector_payload(buf, pos)?),
        tag::VCHUNK => {
            let mut items = Vec::with_capacity(16);
            for _ in 0..16 {
                items.push(read_slot(buf, pos)?);
            }
            Kind::VectorChunk(items)
        }
        tag::VNODE => Kind::VectorNode(read_vnode_payload(buf, pos)?),
        tag::REF => {
            return Err(CellError::bad_format(
                start,
                "hash ref is not a standalone cell",
            ));
        }
        t if tag::is_record(t) => {
            let schema = schema_for_tag(t)
                .ok_or_else(|| CellError::bad_format(start, "unregistered record tag"))?;
            let mut fields = Vec::with_capacity(schema.keys.len());
            for _ in schema.keys {
                fields.push(read_slot(buf, pos)?);
            }
            Kind::Record(Record::from_refs(schema, fields))
        }
        t => {
            return Err(CellError::bad_format(
                start,
                format!("unknown tag 0x{t:02X}"),
            ));
        }
    };
    let value = Value::from_kind(kind);
    value.attach_encoding(&buf[start..*pos]);
    Ok(value)
}

/// Parse a child slot: a hash ref or an inline embedded cell.
pub(crate) fn read_slot(buf: &[u8], pos: &mut usize) -> CellResult<CellRef> {
    let start = *pos;
    match buf.get(*pos) {
        None => Err(CellError::bad_format(start, "missing child slot")),
        Some(&t) if t == tag::REF => {
            *pos += 1;
            let end = *pos + 32;
            let bytes = buf
                .get(*pos..end)
                .ok_or_else(|| CellError::bad_format(start, "truncated hash ref"))?;
            *pos = end;
            let mut arr = [0u8; 32];
            arr.copy_from_slice(bytes);
            Ok(CellRef::soft(Hash::from_bytes(arr), Status::Stored))
        }
        Some(_) => {
            let value = read_cell(buf, pos)?;
            if *pos - start > EMBEDDED_LIMIT {
                return Err(CellError::bad_format(
                    start,
                    "non-embedded child written inline",
                ));
            }
            Ok(CellRef::direct(value))
        }
    }
}

fn read_long(buf: &[u8], pos: &mut usize, len: usize) -> CellResult<Kind> {
    let start = *pos;
    if len == 0 {
        return Ok(Kind::Long(0));
    }
    let bytes = buf
        .get(*pos..*pos + len)
        .ok_or_else(|| CellError::bad_format(start, "truncated long payload"))?;
    *pos += len;
    if bytes[0] == 0x00 && (len == 1 || bytes[1] < 0x80) {
        return Err(CellError::bad_format(start, "redundant leading long byte"));
    }
    if bytes[0] == 0xFF && len > 1 && bytes[1] >= 0x80 {
        return Err(CellError::bad_format(start, "redundant leading long byte"));
    }
    let mut value: i64 = if bytes[0] >= 0x80 { -1 } else { 0 };
    for b in bytes {
        value = (value << 8) | *b as i64;
    }
    Ok(Kind::Long(value))
}

fn read_utf8(buf: &[u8], pos: &mut usize, max_len: usize) -> CellResult<String> {
    let start = *pos;
    let len = read_count(buf, pos)?;
    if len > max_len as u64 {
        return Err(CellError::bad_format(start, "name too long"));
    }
    let len = usize::try_from(len)
        .map_err(|_| CellError::bad_format(start, "truncated string payload"))?;
    let end = pos
        .checked_add(len)
        .ok_or_else(|| CellError::bad_format(start, "truncated string payload"))?;
    let bytes = buf
        .get(*pos..end)
        .ok_or_else(|| CellError::bad_format(start, "truncated string payload"))?;
    *pos = end;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CellError::bad_format(start, "string payload is not UTF-8"))
}

fn read_name(buf: &[u8], pos: &mut usize) -> CellResult<String> {
    let start = *pos;
    let name = read_utf8(buf, pos, MAX_NAME_LENGTH)?;
    if name.is_empty() {
        return Err(CellError::bad_format(start, "empty name"));
    }
    Ok(name)
}

fn read_blob_payload(buf: &[u8], pos: &mut usize) -> CellResult<Blob> {
    let start = *pos;
    let count = read_count(buf, pos)?;
    if count <= CHUNK_SIZE as u64 {
        let len = count as usize;
        let bytes = buf
            .get(*pos..*pos + len)
            .ok_or_else(|| CellError::bad_format(start, "truncated blob payload"))?;
        *pos += len;
        return Ok(Blob::Flat(bytes.into()));
    }
    let sizes = blob::child_sizes(count);
    let n = read_count(buf, pos)?;
    if n != sizes.len() as u64 {
        return Err(CellError::bad_format(
            start,
            "blob child count does not match canonical shape",
        ));
    }
    let mut children = Vec::with_capacity(sizes.len());
    for expected in &sizes {
        let slot_pos = *pos;
        let r = read_slot(buf, pos)?;
        if let Some(v) = r.cell() {
            let b = v
                .as_blob()
                .map_err(|_| CellError::bad_format(slot_pos, "blob child is not a blob"))?;
            if b.count() != *expected {
                return Err(CellError::bad_format(
                    slot_pos,
                    "blob child size does not match canonical shape",
                ));
            }
        }
        children.push(r);
    }
    Ok(Blob::Tree { count, children })
}

fn read_map_payload(buf: &[u8], pos: &mut usize) -> CellResult<Map> {
    let start = *pos;
    let count = read_count(buf, pos)?;
    if count <= MAP_LEAF_MAX as u64 {
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = read_slot(buf, pos)?;
            let value = read_slot(buf, pos)?;
            entries.push(MapEntry { key, value });
        }
        for w in entries.windows(2) {
            if w[0].key_hash() >= w[1].key_hash() {
                return Err(CellError::bad_format(
                    start,
                    "map entries not in ascending key-hash order",
                ));
            }
        }
        return Ok(Map::Leaf(MapLeaf { entries }));
    }
    let mask_bytes = buf
        .get(*pos..*pos + 2)
        .ok_or_else(|| CellError::bad_format(start, "truncated map bitmap"))?;
    let mask = u16::from_be_bytes([mask_bytes[0], mask_bytes[1]]);
    *pos += 2;
    let shift64 = read_count(buf, pos)?;
    if shift64 > 63 {
        return Err(CellError::bad_format(start, "map shift exceeds hash depth"));
    }
    let shift = shift64 as u32;
    let n = mask.count_ones() as usize;
    if n == 0 {
        return Err(CellError::bad_format(start, "map tree with empty bitmap"));
    }
    let mut children = Vec::with_capacity(n);
    let mut loaded_sum = Some(0u64);
    for _ in 0..n {
        let slot_pos = *pos;
        let r = read_slot(buf, pos)?;
        match r.cell() {
            Some(v) => {
                let child = v
                    .as_map()
                    .map_err(|_| CellError::bad_format(slot_pos, "map child is not a map"))?;
                if let Map::Tree(ct) = child {
                    if ct.shift != shift + 1 {
                        return Err(CellError::bad_format(
                            slot_pos,
                            "map child shift does not match depth",
                        ));
                    }
                }
                loaded_sum = loaded_sum.map(|s| s + child.count());
            }
            None => loaded_sum = None,
        }
        children.push(r);
    }
    if let Some(sum) = loaded_sum {
        if sum != count {
            return Err(CellError::bad_format(
                start,
                "map tree count does not match children",
            ));
        }
    }
    Ok(Map::Tree(MapTree {
        count,
        shift,
        mask,
        children,
    }))
}

fn read_vector_payload(buf: &[u8], pos: &mut usize) -> CellResult<Vector> {
    let start = *pos;
    let count = read_count(buf, pos)?;
    let tl = read_count(buf, pos)?;
    if tl != vector::tail_len(count) {
        return Err(CellError::bad_format(
            start,
            "vector tail length does not match count",
        ));
    }
    let mut tail = Vec::with_capacity(tl as usize);
    for _ in 0..tl {
        tail.push(read_slot(buf, pos)?);
    }
    let prefix = count - tl;
    let sizes = vector::packed_child_sizes(prefix);
    let n = read_count(buf, pos)?;
    if n != sizes.len() as u64 {
        return Err(CellError::bad_format(
            start,
            "vector child count does not match canonical shape",
        ));
    }
    let children = read_packed_children(buf, pos, &sizes)?;
    Ok(Vector::from_parts(count, tail, children))
}

fn read_vnode_payload(buf: &[u8], pos: &mut usize) -> CellResult<VectorNode> {
    let start = *pos;
    let count = read_count(buf, pos)?;
    if count < 32 || count % 16 != 0 {
        return Err(CellError::bad_format(
            start,
            "packed vector node count must be a multiple of 16, at least 32",
        ));
    }
    let sizes = vector::packed_child_sizes(count);
    let children = read_packed_children(buf, pos, &sizes)?;
    Ok(VectorNode { count, children })
}

fn read_packed_children(
    buf: &[u8],
    pos: &mut usize,
    sizes: &[u64],
) -> CellResult<Vec<CellRef>> {
    let mut children = Vec::with_capacity(sizes.len());
    for expected in sizes {
        let slot_pos = *pos;
        let r = read_slot(buf, pos)?;
        if let Some(v) = r.cell() {
            let actual = match v.kind() {
                Kind::VectorChunk(_) => 16,
                Kind::VectorNode(n) => n.count,
                _ => {
                    return Err(CellError::bad_format(
                        slot_pos,
                        "packed vector child is not a chunk or node",
                    ));
                }
            };
            if actual != *expected {
                return Err(CellError::bad_format(
                    slot_pos,
                    "packed vector child size does not match canonical shape",
                ));
            }
        }
        children.push(r);
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;
    use crate::set::Set;

    fn roundtrip(v: &Value) -> Value {
        let decoded = decode(v.encoding()).unwrap();
        assert_eq!(&decoded, v);
        assert_eq!(decoded.encoding(), v.encoding());
        assert_eq!(decoded.hash(), v.hash());
        decoded
    }

    // -----------------------------------------------------------------------
    // Golden vectors
    // -----------------------------------------------------------------------

    #[test]
    fn empty_map_encoding() {
        let m = Value::empty_map();
        assert_eq!(m.encoding(), &[tag::MAP, 0x00]);
        // The hash is a pure function of the encoding, identical across
        // runs.
        assert_eq!(m.hash(), Hash::digest(&[tag::MAP, 0x00]));
        roundtrip(&m);
    }

    #[test]
    fn address_encodings() {
        assert_eq!(Value::address(0).encoding(), &[tag::ADDRESS, 0x00]);
        assert_eq!(Value::address(127).encoding(), &[tag::ADDRESS, 0x7F]);
        assert_eq!(
            Value::address(128).encoding(),
            &[tag::ADDRESS, 0x81, 0x00]
        );
        for index in [0u64, 127, 128, 1 << 40] {
            let decoded = roundtrip(&Value::address(index));
            assert_eq!(decoded.as_address().unwrap().index(), index);
        }
    }

    #[test]
    fn boolean_encodings() {
        assert_eq!(Value::boolean(false).encoding(), &[tag::FALSE]);
        assert_eq!(Value::boolean(true).encoding(), &[tag::TRUE]);
        roundtrip(&Value::boolean(true));
    }

    #[test]
    fn long_encodings_are_minimal() {
        assert_eq!(Value::long(0).encoding(), &[0x10]);
        assert_eq!(Value::long(1).encoding(), &[0x11, 0x01]);
        assert_eq!(Value::long(127).encoding(), &[0x11, 0x7F]);
        assert_eq!(Value::long(128).encoding(), &[0x12, 0x00, 0x80]);
        assert_eq!(Value::long(-1).encoding(), &[0x11, 0xFF]);
        assert_eq!(Value::long(-128).encoding(), &[0x11, 0x80]);
        assert_eq!(Value::long(-129).encoding(), &[0x12, 0xFF, 0x7F]);
        for n in [0i64, 1, -1, 127, 128, -128, -129, i64::MAX, i64::MIN] {
            roundtrip(&Value::long(n));
        }
    }

    #[test]
    fn singleton_true_set() {
        let s = Set::of([Value::boolean(true)]).unwrap().into_value();
        let encoding = s.encoding();
        assert_eq!(encoding[0], tag::SET);
        assert_ne!(encoding[0], tag::MAP);
        let decoded = roundtrip(&s);
        let set = decoded.as_set().unwrap();
        assert_eq!(set.count(), 1);
        assert!(set.contains(&Value::boolean(true)).unwrap());
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    #[test]
    fn primitive_roundtrips() {
        roundtrip(&Value::character('a'));
        roundtrip(&Value::character('\u{1F600}'));
        roundtrip(&Value::text(""));
        roundtrip(&Value::text("hello, lodestone"));
        roundtrip(&Value::keyword("balance").unwrap());
        roundtrip(&Value::symbol("transfer").unwrap());
    }

    #[test]
    fn container_roundtrips() {
        let m = Map::of((0..30).map(|i| (Value::long(i), Value::long(i * 2))))
            .unwrap()
            .into_value();
        roundtrip(&m);

        let v = crate::vector::Vector::from_values((0..300).map(Value::long))
            .unwrap()
            .into_value();
        roundtrip(&v);

        let b = Value::blob(&vec![0xA5u8; 10_000]);
        roundtrip(&b);

        let r = Record::new(
            &crate::record::ACCOUNT,
            vec![Value::long(1), Value::long(500), Value::address(9)],
        )
        .unwrap()
        .into_value();
        roundtrip(&r);
    }

    #[test]
    fn nested_container_roundtrip() {
        let inner = Map::of([(
            Value::keyword("owner").unwrap(),
            Value::address(42),
        )])
        .unwrap()
        .into_value();
        let outer = Map::of([
            (Value::keyword("state").unwrap(), inner),
            (Value::keyword("data").unwrap(), Value::blob(&[9u8; 500])),
        ])
        .unwrap()
        .into_value();
        let decoded = roundtrip(&outer);
        // The big blob child appears as a hash ref; its slot is
        // dehydrated after decode.
        let m = decoded.as_map().unwrap();
        let err = m.get(&Value::keyword("data").unwrap()).unwrap_err();
        assert!(matches!(err, CellError::MissingData(_)));
    }

    #[test]
    fn large_map_decodes_with_soft_children() {
        let m = Map::of((0..200).map(|i| (Value::long(i), Value::long(i))))
            .unwrap()
            .into_value();
        let decoded = decode(m.encoding()).unwrap();
        assert_eq!(decoded.hash(), m.hash());
        assert_eq!(decoded.as_map().unwrap().count(), 200);
    }

    // -----------------------------------------------------------------------
    // Canonical-form enforcement
    // -----------------------------------------------------------------------

    fn expect_bad(bytes: &[u8]) {
        assert!(
            matches!(decode(bytes), Err(CellError::BadFormat { .. })),
            "expected BadFormat for {bytes:02X?}"
        );
    }

    #[test]
    fn rejects_unknown_tag() {
        expect_bad(&[0xFE]);
    }

    #[test]
    fn rejects_trailing_bytes() {
        expect_bad(&[tag::TRUE, 0x00]);
    }

    #[test]
    fn rejects_empty_input() {
        expect_bad(&[]);
    }

    #[test]
    fn rejects_standalone_ref() {
        let mut bytes = vec![tag::REF];
        bytes.extend_from_slice(&[0u8; 32]);
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_redundant_long_bytes() {
        // 127 padded to two bytes.
        expect_bad(&[0x12, 0x00, 0x7F]);
        // -1 padded to two bytes.
        expect_bad(&[0x12, 0xFF, 0xFF]);
    }

    #[test]
    fn rejects_redundant_count_bytes() {
        expect_bad(&[tag::ADDRESS, 0x80, 0x01]);
    }

    #[test]
    fn rejects_unordered_map_entries() {
        let a = Value::long(1);
        let b = Value::long(2);
        let (lo, hi) = if a.hash() < b.hash() { (a, b) } else { (b, a) };
        let mut bytes = vec![tag::MAP, 0x02];
        bytes.extend_from_slice(hi.encoding());
        bytes.extend_from_slice(Value::boolean(true).encoding());
        bytes.extend_from_slice(lo.encoding());
        bytes.extend_from_slice(Value::boolean(true).encoding());
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_duplicate_map_keys() {
        let k = Value::long(1);
        let mut bytes = vec![tag::MAP, 0x02];
        for _ in 0..2 {
            bytes.extend_from_slice(k.encoding());
            bytes.extend_from_slice(Value::boolean(true).encoding());
        }
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_set_with_non_true_value() {
        let k = Value::long(1);
        let mut bytes = vec![tag::SET, 0x01];
        bytes.extend_from_slice(k.encoding());
        bytes.extend_from_slice(Value::long(9).encoding());
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_flat_blob_longer_than_chunk() {
        // Count says 4097 but flat payload follows: the decoder expects a
        // tree and the child count byte cannot satisfy the shape.
        let mut bytes = vec![tag::BLOB];
        write_count(&mut bytes, 4097);
        bytes.extend_from_slice(&[0u8; 4097]);
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_oversized_inline_child() {
        // A vector whose single tail slot is a 200-byte blob written
        // inline instead of as a hash ref.
        let big = Value::blob(&[1u8; 200]);
        let mut bytes = vec![tag::VECTOR];
        write_count(&mut bytes, 1); // count
        write_count(&mut bytes, 1); // tail length
        bytes.extend_from_slice(big.encoding());
        write_count(&mut bytes, 0); // children
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_vector_tail_mismatch() {
        let mut bytes = vec![tag::VECTOR];
        write_count(&mut bytes, 2); // count = 2
        write_count(&mut bytes, 1); // tail claims 1
        bytes.extend_from_slice(Value::long(1).encoding());
        write_count(&mut bytes, 0);
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_long_name() {
        let mut bytes = vec![tag::KEYWORD];
        write_count(&mut bytes, 65);
        bytes.extend_from_slice(&[b'x'; 65]);
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_invalid_utf8_string() {
        let mut bytes = vec![tag::STRING];
        write_count(&mut bytes, 2);
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        expect_bad(&bytes);
    }

    #[test]
    fn rejects_surrogate_char() {
        let mut bytes = vec![tag::CHAR];
        write_count(&mut bytes, 0xD800);
        expect_bad(&bytes);
    }

    // -----------------------------------------------------------------------
    // Embedding dichotomy
    // -----------------------------------------------------------------------

    #[test]
    fn embedding_threshold_boundary() {
        // A flat blob of n bytes encodes to n + 1 (tag) + VLC(count)
        // bytes. 137 bytes → 140-byte encoding: embedded. 138 → 141: not.
        let at_limit = Value::blob(&[7u8; 137]);
        assert_eq!(at_limit.encoding().len(), EMBEDDED_LIMIT);
        assert!(at_limit.is_embedded());

        let over = Value::blob(&[7u8; 138]);
        assert_eq!(over.encoding().len(), EMBEDDED_LIMIT + 1);
        assert!(!over.is_embedded());
    }
}
