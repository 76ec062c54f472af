//! Persistent vectors.
//!
//! A vector keeps its last `((count - 1) % 16) + 1` elements in a tail
//! and the remaining prefix (a multiple of 16) in a radix-16 tree of
//! packed cells: `VCHUNK` (exactly 16 elements) and `VNODE` (full-span
//! children except the last). Tree shape is a pure function of the count,
//! so every construction path produces the same canonical encoding.
//! Indexed access, append, and update are O(log n).

use crate::cell::{Kind, Value};
use crate::error::{CellError, CellResult};
use crate::reference::CellRef;

/// Elements held by the tail for a given count.
pub(crate) fn tail_len(count: u64) -> u64 {
    if count == 0 {
        0
    } else {
        (count - 1) % 16 + 1
    }
}

/// The per-child element span at a tree level covering `prefix` elements.
fn child_span(prefix: u64) -> u64 {
    let mut span = 16;
    while span * 16 < prefix {
        span *= 16;
    }
    span
}

/// Canonical child element counts for a packed level of `prefix`
/// elements.
pub(crate) fn packed_child_sizes(prefix: u64) -> Vec<u64> {
    if prefix == 0 {
        return Vec::new();
    }
    let span = child_span(prefix);
    let n = prefix.div_ceil(span);
    (0..n)
        .map(|i| if i == n - 1 { prefix - (n - 1) * span } else { span })
        .collect()
}

/// Packed vector subtree: `count` is a multiple of 16, at least 32.
#[derive(Clone, Debug)]
pub struct VectorNode {
    pub(crate) count: u64,
    pub(crate) children: Vec<CellRef>,
}

/// A persistent vector cell.
#[derive(Clone, Debug)]
pub struct Vector {
    count: u64,
    /// The last 1..=16 elements; empty only for the empty vector.
    tail: Vec<CellRef>,
    /// Packed prefix children (chunks or subtrees).
    children: Vec<CellRef>,
}

impl Vector {
    /// The empty vector.
    pub fn empty() -> Vector {
        Vector {
            count: 0,
            tail: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Build a vector from a sequence of values.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> CellResult<Vector> {
        let mut v = Vector::empty();
        for value in values {
            v = v.push(value)?;
        }
        Ok(v)
    }

    pub(crate) fn from_parts(count: u64, tail: Vec<CellRef>, children: Vec<CellRef>) -> Vector {
        Vector {
            count,
            tail,
            children,
        }
    }

    /// Number of elements.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns `true` for the empty vector.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Wrap into a cell.
    pub fn into_value(self) -> Value {
        Value::from_kind(Kind::Vector(self))
    }

    pub(crate) fn tail(&self) -> &[CellRef] {
        &self.tail
    }

    pub(crate) fn children(&self) -> &[CellRef] {
        &self.children
    }

    fn prefix(&self) -> u64 {
        self.count - tail_len(self.count)
    }

    /// The element at index `i`.
    pub fn get(&self, i: u64) -> CellResult<Value> {
        if i >= self.count {
            return Err(CellError::IndexOutOfBounds {
                index: i,
                count: self.count,
            });
        }
        let prefix = self.prefix();
        if i >= prefix {
            self.tail[(i - prefix) as usize].value()
        } else {
            let span = child_span(prefix);
            packed_get(&self.children[(i / span) as usize], i % span)
        }
    }

    /// Return a vector with `value` appended.
    pub fn push(&self, value: Value) -> CellResult<Vector> {
        let r = CellRef::direct(value);
        if self.tail.len() < 16 {
            let mut tail = self.tail.clone();
            tail.push(r);
            return Ok(Vector {
                count: self.count + 1,
                tail,
                children: self.children.clone(),
            });
        }
        // Full tail rolls into the packed prefix as a chunk.
        let chunk = CellRef::direct(Value::from_kind(Kind::VectorChunk(self.tail.clone())));
        let children = packed_push(&self.children, self.count - 16, chunk)?;
        Ok(Vector {
            count: self.count + 1,
            tail: vec![r],
            children,
        })
    }

    /// Return a vector with the element at `i` replaced.
    pub fn assoc(&self, i: u64, value: Value) -> CellResult<Vector> {
        if i >= self.count {
            return Err(CellError::IndexOutOfBounds {
                index: i,
                count: self.count,
            });
        }
        let prefix = self.prefix();
        if i >= prefix {
            let mut tail = self.tail.clone();
            tail[(i - prefix) as usize] = CellRef::direct(value);
            return Ok(Vector {
                count: self.count,
                tail,
                children: self.children.clone(),
            });
        }
        let span = child_span(prefix);
        let idx = (i / span) as usize;
        let mut children = self.children.clone();
        children[idx] = packed_assoc(&children[idx], i % span, value)?;
        Ok(Vector {
            count: self.count,
            tail: self.tail.clone(),
            children,
        })
    }

    /// All elements in index order.
    pub fn to_values(&self) -> CellResult<Vec<Value>> {
        (0..self.count).map(|i| self.get(i)).collect()
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.tail.len() + self.children.len()
    }

    pub(crate) fn child_ref(&self, i: usize) -> CellRef {
        if i < self.tail.len() {
            self.tail[i].clone()
        } else {
            self.children[i - self.tail.len()].clone()
        }
    }

    pub(crate) fn update_refs(&self, f: &mut dyn FnMut(&CellRef) -> CellRef) -> Vector {
        Vector {
            count: self.count,
            tail: self.tail.iter().map(|r| f(r)).collect(),
            children: self.children.iter().map(|r| f(r)).collect(),
        }
    }
}

fn packed_get(r: &CellRef, i: u64) -> CellResult<Value> {
    let v = r.value()?;
    match v.kind() {
        Kind::VectorChunk(items) => items[i as usize].value(),
        Kind::VectorNode(n) => {
            let span = child_span(n.count);
            packed_get(&n.children[(i / span) as usize], i % span)
        }
        _ => Err(CellError::InvalidData(
            "packed vector child is not a chunk or node".into(),
        )),
    }
}

fn packed_assoc(r: &CellRef, i: u64, value: Value) -> CellResult<CellRef> {
    let v = r.value()?;
    match v.kind() {
        Kind::VectorChunk(items) => {
            let mut items = items.clone();
            items[i as usize] = CellRef::direct(value);
            Ok(CellRef::direct(Value::from_kind(Kind::VectorChunk(items))))
        }
        Kind::VectorNode(n) => {
            let span = child_span(n.count);
            let idx = (i / span) as usize;
            let mut children = n.children.clone();
            children[idx] = packed_assoc(&children[idx], i % span, value)?;
            Ok(CellRef::direct(Value::from_kind(Kind::VectorNode(
                VectorNode {
                    count: n.count,
                    children,
                },
            ))))
        }
        _ => Err(CellError::InvalidData(
            "packed vector child is not a chunk or node".into(),
        )),
    }
}

/// Append a full chunk to a packed level of `prefix` elements, returning
/// the children for `prefix + 16`.
fn packed_push(children: &[CellRef], prefix: u64, chunk: CellRef) -> CellResult<Vec<CellRef>> {
    if prefix == 0 {
        return Ok(vec![chunk]);
    }
    let span = child_span(prefix);
    if prefix == span * 16 {
        // Level is full: it becomes the first child of a deeper level.
        let node = VectorNode {
            count: prefix,
            children: children.to_vec(),
        };
        return Ok(vec![
            CellRef::direct(Value::from_kind(Kind::VectorNode(node))),
            chunk,
        ]);
    }
    let rem = prefix % span;
    let mut out = children.to_vec();
    if rem == 0 {
        out.push(chunk);
    } else {
        let last = out.last().expect("non-empty packed level has children");
        let grown = grow_packed(last, rem, chunk)?;
        *out.last_mut().expect("non-empty packed level has children") = grown;
    }
    Ok(out)
}

/// Grow a partially full packed child of `size` elements by one chunk.
fn grow_packed(r: &CellRef, size: u64, chunk: CellRef) -> CellResult<CellRef> {
    if size == 16 {
        let node = VectorNode {
            count: 32,
            children: vec![r.clone(), chunk],
        };
        return Ok(CellRef::direct(Value::from_kind(Kind::VectorNode(node))));
    }
    let v = r.value()?;
    let Kind::VectorNode(n) = v.kind() else {
        return Err(CellError::InvalidData(
            "packed vector child is not a node".into(),
        ));
    };
    let children = packed_push(&n.children, n.count, chunk)?;
    Ok(CellRef::direct(Value::from_kind(Kind::VectorNode(
        VectorNode {
            count: n.count + 16,
            children,
        },
    ))))
}
