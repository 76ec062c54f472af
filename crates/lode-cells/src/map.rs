//! Persistent hash maps.
//!
//! A map is a 16-way hash-array mapped trie over key hashes, indexed by
//! 4-bit nibbles from the most significant end. A node holding at most 8
//! entries is a leaf (entries sorted by ascending key hash); any larger
//! node is a tree (occupancy bitmap + children in slot order). The node
//! shape is a pure function of the entry set, which is what makes the
//! encoding canonical: every sequence of operations yielding the same
//! entries yields the same bytes and the same hash.
//!
//! Key-hash equality is key equality: two keys with one hash have one
//! canonical encoding and are therefore the same value.

use lode_types::Hash;

use crate::cell::{Kind, Value};
use crate::error::{CellError, CellResult};
use crate::reference::CellRef;
use crate::MAP_LEAF_MAX;

/// Deepest nibble index usable for trie descent (64 nibbles in a 32-byte
/// hash).
const MAX_SHIFT: u32 = 63;

/// One key/value pair held by refs.
#[derive(Clone, Debug)]
pub struct MapEntry {
    pub(crate) key: CellRef,
    pub(crate) value: CellRef,
}

impl MapEntry {
    fn new(key: Value, value: Value) -> Self {
        Self {
            key: CellRef::direct(key),
            value: CellRef::direct(value),
        }
    }

    pub(crate) fn key_hash(&self) -> Hash {
        self.key.hash()
    }
}

/// Sorted array of up to 8 entries.
#[derive(Clone, Debug)]
pub struct MapLeaf {
    pub(crate) entries: Vec<MapEntry>,
}

/// Interior node: 16 slots indexed by the nibble at `shift`.
#[derive(Clone, Debug)]
pub struct MapTree {
    pub(crate) count: u64,
    pub(crate) shift: u32,
    pub(crate) mask: u16,
    /// Child maps in ascending slot order; one per set bit in `mask`.
    pub(crate) children: Vec<CellRef>,
}

impl MapTree {
    /// Position of slot `digit` among the occupied children.
    fn slot_index(&self, digit: u8) -> usize {
        (self.mask & ((1u16 << digit) - 1)).count_ones() as usize
    }

    fn has_slot(&self, digit: u8) -> bool {
        self.mask & (1u16 << digit) != 0
    }
}

/// A persistent hash map cell.
#[derive(Clone, Debug)]
pub enum Map {
    Leaf(MapLeaf),
    Tree(MapTree),
}

impl Map {
    /// The empty map.
    pub fn empty() -> Map {
        Map::Leaf(MapLeaf {
            entries: Vec::new(),
        })
    }

    /// Build a map from key/value pairs; later keys overwrite earlier.
    pub fn of(pairs: impl IntoIterator<Item = (Value, Value)>) -> CellResult<Map> {
        let mut m = Map::empty();
        for (k, v) in pairs {
            m = m.assoc(k, v)?;
        }
        Ok(m)
    }

    /// Number of entries.
    pub fn count(&self) -> u64 {
        match self {
            Map::Leaf(l) => l.entries.len() as u64,
            Map::Tree(t) => t.count,
        }
    }

    /// Returns `true` for the empty map.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Wrap into a cell.
    pub fn into_value(self) -> Value {
        Value::from_kind(Kind::Map(self))
    }

    /// Look up the value for `key`, or `None` when absent.
    pub fn get(&self, key: &Value) -> CellResult<Option<Value>> {
        let kh = key.hash();
        match self.get_entry(&kh)? {
            Some(e) => Ok(Some(e.value.value()?)),
            None => Ok(None),
        }
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &Value) -> CellResult<bool> {
        Ok(self.get_entry(&key.hash())?.is_some())
    }

    fn get_entry(&self, kh: &Hash) -> CellResult<Option<MapEntry>> {
        match self {
            Map::Leaf(l) => Ok(l
                .entries
                .iter()
                .find(|e| e.key_hash() == *kh)
                .cloned()),
            Map::Tree(t) => {
                let digit = kh.nibble(t.shift);
                if !t.has_slot(digit) {
                    return Ok(None);
                }
                let child = child_map(&t.children[t.slot_index(digit)])?;
                child.get_entry(kh)
            }
        }
    }

    /// Return a map with `key` bound to `value`, sharing structure with
    /// this one.
    pub fn assoc(&self, key: Value, value: Value) -> CellResult<Map> {
        self.assoc_entry(MapEntry::new(key, value), 0)
    }

    pub(crate) fn assoc_entry(&self, e: MapEntry, shift: u32) -> CellResult<Map> {
        match self {
            Map::Leaf(l) => {
                let kh = e.key_hash();
                match l.entries.binary_search_by(|x| x.key_hash().cmp(&kh)) {
                    Ok(i) => {
                        let mut entries = l.entries.clone();
                        entries[i] = e;
                        Ok(Map::Leaf(MapLeaf { entries }))
                    }
                    Err(i) => {
                        let mut entries = l.entries.clone();
                        entries.insert(i, e);
                        if entries.len() <= MAP_LEAF_MAX {
                            Ok(Map::Leaf(MapLeaf { entries }))
                        } else {
                            split_leaf(entries, shift)
                        }
                    }
                }
            }
            Map::Tree(t) => {
                debug_assert_eq!(t.shift, shift);
                let digit = e.key_hash().nibble(shift);
                if t.has_slot(digit) {
                    let idx = t.slot_index(digit);
                    let child = child_map(&t.children[idx])?;
                    let old_count = child.count();
                    let new_child = child.assoc_entry(e, shift + 1)?;
                    let count = t.count - old_count + new_child.count();
                    let mut children = t.children.clone();
                    children[idx] = CellRef::direct(new_child.into_value());
                    Ok(Map::Tree(MapTree {
                        count,
                        shift,
                        mask: t.mask,
                        children,
                    }))
                } else {
                    let idx = t.slot_index(digit);
                    let leaf = Map::Leaf(MapLeaf { entries: vec![e] });
                    let mut children = t.children.clone();
                    children.insert(idx, CellRef::direct(leaf.into_value()));
                    Ok(Map::Tree(MapTree {
                        count: t.count + 1,
                        shift,
                        mask: t.mask | (1u16 << digit),
                        children,
                    }))
                }
            }
        }
    }

    /// Return a map without `key`. Collapses back to a leaf at 8 entries,
    /// which is mandatory for canonicality.
    pub fn dissoc(&self, key: &Value) -> CellResult<Map> {
        self.dissoc_hash(&key.hash())
    }

    fn dissoc_hash(&self, kh: &Hash) -> CellResult<Map> {
        match self {
            Map::Leaf(l) => {
                match l.entries.iter().position(|e| e.key_hash() == *kh) {
                    None => Ok(self.clone()),
                    Some(i) => {
                        let mut entries = l.entries.clone();
                        entries.remove(i);
                        Ok(Map::Leaf(MapLeaf { entries }))
                    }
                }
            }
            Map::Tree(t) => {
                let digit = kh.nibble(t.shift);
                if !t.has_slot(digit) {
                    return Ok(self.clone());
                }
                let idx = t.slot_index(digit);
                let child = child_map(&t.children[idx])?;
                let new_child = child.dissoc_hash(kh)?;
                if new_child.count() == child.count() {
                    return Ok(self.clone());
                }
                let count = t.count - 1;
                if count <= MAP_LEAF_MAX as u64 {
                    // Gather the survivors into a single sorted leaf.
                    let mut entries = Vec::with_capacity(count as usize);
                    for (i, r) in t.children.iter().enumerate() {
                        if i == idx {
                            new_child.collect_entries(&mut entries)?;
                        } else {
                            child_map(r)?.collect_entries(&mut entries)?;
                        }
                    }
                    entries.sort_by(|a, b| a.key_hash().cmp(&b.key_hash()));
                    return Ok(Map::Leaf(MapLeaf { entries }));
                }
                let mut children = t.children.clone();
                let mut mask = t.mask;
                if new_child.is_empty() {
                    children.remove(idx);
                    mask &= !(1u16 << digit);
                } else {
                    children[idx] = CellRef::direct(new_child.into_value());
                }
                Ok(Map::Tree(MapTree {
                    count,
                    shift: t.shift,
                    mask,
                    children,
                }))
            }
        }
    }

    fn collect_entries(&self, out: &mut Vec<MapEntry>) -> CellResult<()> {
        match self {
            Map::Leaf(l) => {
                out.extend(l.entries.iter().cloned());
                Ok(())
            }
            Map::Tree(t) => {
                for r in &t.children {
                    child_map(r)?.collect_entries(out)?;
                }
                Ok(())
            }
        }
    }

    /// All entries as resolved key/value pairs, in ascending key-hash
    /// order.
    pub fn entries(&self) -> CellResult<Vec<(Value, Value)>> {
        let mut raw = Vec::with_capacity(self.count() as usize);
        self.collect_entries(&mut raw)?;
        raw.iter()
            .map(|e| Ok((e.key.value()?, e.value.value()?)))
            .collect()
    }

    /// All keys, in ascending key-hash order.
    pub fn keys(&self) -> CellResult<Vec<Value>> {
        let mut raw = Vec::with_capacity(self.count() as usize);
        self.collect_entries(&mut raw)?;
        raw.iter().map(|e| e.key.value()).collect()
    }

    /// Merge `other` into this map. Keys present on one side only are
    /// taken as-is; colliding keys are combined with `combine`, where
    /// `None` removes the key.
    pub fn merge_with(
        &self,
        other: &Map,
        combine: &mut dyn FnMut(&Value, &Value) -> Option<Value>,
    ) -> CellResult<Map> {
        let mut result = self.clone();
        for (k, bv) in other.entries()? {
            match self.get(&k)? {
                None => result = result.assoc(k, bv)?,
                Some(av) => match combine(&av, &bv) {
                    Some(merged) => result = result.assoc(k, merged)?,
                    None => result = result.dissoc(&k)?,
                },
            }
        }
        Ok(result)
    }

    pub(crate) fn ref_count(&self) -> usize {
        match self {
            Map::Leaf(l) => 2 * l.entries.len(),
            Map::Tree(t) => t.children.len(),
        }
    }

    pub(crate) fn child_ref(&self, i: usize) -> CellRef {
        match self {
            Map::Leaf(l) => {
                let e = &l.entries[i / 2];
                if i % 2 == 0 {
                    e.key.clone()
                } else {
                    e.value.clone()
                }
            }
            Map::Tree(t) => t.children[i].clone(),
        }
    }

    pub(crate) fn update_refs(&self, f: &mut dyn FnMut(&CellRef) -> CellRef) -> Map {
        match self {
            Map::Leaf(l) => Map::Leaf(MapLeaf {
                entries: l
                    .entries
                    .iter()
                    .map(|e| MapEntry {
                        key: f(&e.key),
                        value: f(&e.value),
                    })
                    .collect(),
            }),
            Map::Tree(t) => Map::Tree(MapTree {
                count: t.count,
                shift: t.shift,
                mask: t.mask,
                children: t.children.iter().map(|r| f(r)).collect(),
            }),
        }
    }

    /// Check that every loaded value in a set payload is the `TRUE`
    /// sentinel.
    pub(crate) fn validate_set_values(&self) -> CellResult<()> {
        match self {
            Map::Leaf(l) => {
                for e in &l.entries {
                    if let Some(v) = e.value.cell() {
                        if !v.is_true() {
                            return Err(CellError::InvalidData(
                                "set entry value is not TRUE".into(),
                            ));
                        }
                    }
                }
                Ok(())
            }
            Map::Tree(t) => {
                for r in &t.children {
                    if let Some(v) = r.cell() {
                        v.as_map()?.validate_set_values()?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Split an oversized sorted entry list into a tree node at `shift`.
fn split_leaf(entries: Vec<MapEntry>, shift: u32) -> CellResult<Map> {
    if shift > MAX_SHIFT {
        return Err(CellError::InvalidData(
            "key hashes collide beyond trie depth".into(),
        ));
    }
    let count = entries.len() as u64;
    let mut groups: [Vec<MapEntry>; 16] = Default::default();
    for e in entries {
        groups[e.key_hash().nibble(shift) as usize].push(e);
    }
    let mut mask: u16 = 0;
    let mut children = Vec::new();
    for (digit, group) in groups.into_iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        mask |= 1u16 << digit;
        let child = if group.len() <= MAP_LEAF_MAX {
            Map::Leaf(MapLeaf { entries: group })
        } else {
            split_leaf(group, shift + 1)?
        };
        children.push(CellRef::direct(child.into_value()));
    }
    Ok(Map::Tree(MapTree {
        count,
        shift,
        mask,
        children,
    }))
}

/// View a tree child as a map; anything else is invalid data.
fn child_map(r: &CellRef) -> CellResult<Map> {
    let v = r.value()?;
    match v.kind() {
        Kind::Map(m) => Ok(m.clone()),
        _ => Err(CellError::InvalidData("map tree child is not a map".into())),
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.clone().into_value() == other.clone().into_value()
    }
}

impl Eq for Map {}
