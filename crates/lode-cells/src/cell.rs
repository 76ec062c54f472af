//! The universal cell: a cheaply clonable handle to an immutable value.
//!
//! Every value in the data model is a [`Value`] wrapping a closed
//! [`Kind`] sum plus three monotone caches: the canonical encoding, the
//! content hash, and the memory-size estimate. Cells are deeply immutable
//! after construction, so sharing across threads needs no coordination;
//! concurrent cache fills do redundant work at worst.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use lode_types::Hash;

use crate::address::Address;
use crate::blob::Blob;
use crate::encoding;
use crate::error::{CellError, CellResult};
use crate::map::Map;
use crate::record::Record;
use crate::reference::CellRef;
use crate::set::Set;
use crate::vector::{Vector, VectorNode};
use crate::{tag, EMBEDDED_LIMIT};

/// Maximum byte length of a keyword or symbol name.
pub const MAX_NAME_LENGTH: usize = 64;

/// The closed sum of cell kinds. Dispatch branches on this, never on
/// open subtyping.
#[derive(Clone)]
pub enum Kind {
    /// Boolean truth value.
    Boolean(bool),
    /// 64-bit signed integer.
    Long(i64),
    /// Unicode scalar value.
    Char(char),
    /// UTF-8 string.
    Text(String),
    /// Interned-style name with keyword semantics (`:name`).
    Keyword(String),
    /// Interned-style name with symbol semantics.
    Symbol(String),
    /// Account address; an 8-byte long blob.
    Address(Address),
    /// Byte sequence, flat or chunk tree.
    Blob(Blob),
    /// Hash-array mapped trie.
    Map(Map),
    /// Set view over a map with `TRUE` sentinel values.
    Set(Set),
    /// Radix-balanced vector root.
    Vector(Vector),
    /// Packed vector chunk of exactly 16 elements.
    VectorChunk(Vec<CellRef>),
    /// Packed vector subtree.
    VectorNode(VectorNode),
    /// Fixed-schema record.
    Record(Record),
}

struct CellInner {
    kind: Kind,
    encoding: OnceLock<Box<[u8]>>,
    hash: OnceLock<Hash>,
    memory_size: OnceLock<u64>,
}

/// A handle to an immutable cell. Cloning is cheap (shared inner).
#[derive(Clone)]
pub struct Value {
    inner: Arc<CellInner>,
}

impl Value {
    pub(crate) fn from_kind(kind: Kind) -> Self {
        Self {
            inner: Arc::new(CellInner {
                kind,
                encoding: OnceLock::new(),
                hash: OnceLock::new(),
                memory_size: OnceLock::new(),
            }),
        }
    }

    // -- constructors -------------------------------------------------------

    /// Boolean cell.
    pub fn boolean(b: bool) -> Self {
        Self::from_kind(Kind::Boolean(b))
    }

    /// 64-bit integer cell.
    pub fn long(n: i64) -> Self {
        Self::from_kind(Kind::Long(n))
    }

    /// Character cell.
    pub fn character(c: char) -> Self {
        Self::from_kind(Kind::Char(c))
    }

    /// String cell.
    pub fn text(s: impl Into<String>) -> Self {
        Self::from_kind(Kind::Text(s.into()))
    }

    /// Keyword cell. Names are 1..=64 bytes of UTF-8.
    pub fn keyword(name: impl Into<String>) -> CellResult<Self> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self::from_kind(Kind::Keyword(name)))
    }

    /// Symbol cell. Names are 1..=64 bytes of UTF-8.
    pub fn symbol(name: impl Into<String>) -> CellResult<Self> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self::from_kind(Kind::Symbol(name)))
    }

    /// Address cell for an account index.
    pub fn address(index: u64) -> Self {
        Self::from_kind(Kind::Address(Address::new(index)))
    }

    /// Blob cell in canonical shape for the byte content.
    pub fn blob(bytes: &[u8]) -> Self {
        Blob::from_bytes(bytes).into_value()
    }

    /// The empty map.
    pub fn empty_map() -> Self {
        Map::empty().into_value()
    }

    /// The empty set.
    pub fn empty_set() -> Self {
        Set::empty().into_value()
    }

    /// The empty vector.
    pub fn empty_vector() -> Self {
        Vector::empty().into_value()
    }

    // -- inspection ---------------------------------------------------------

    /// The cell's kind.
    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// The tag byte identifying this cell's kind in its encoding.
    pub fn tag(&self) -> u8 {
        match &self.inner.kind {
            Kind::Boolean(false) => tag::FALSE,
            Kind::Boolean(true) => tag::TRUE,
            Kind::Long(n) => tag::LONG_BASE + encoding::long_payload_length(*n),
            Kind::Char(_) => tag::CHAR,
            Kind::Text(_) => tag::STRING,
            Kind::Keyword(_) => tag::KEYWORD,
            Kind::Symbol(_) => tag::SYMBOL,
            Kind::Address(_) => tag::ADDRESS,
            Kind::Blob(_) => tag::BLOB,
            Kind::Map(_) => tag::MAP,
            Kind::Set(_) => tag::SET,
            Kind::Vector(_) => tag::VECTOR,
            Kind::VectorChunk(_) => tag::VCHUNK,
            Kind::VectorNode(_) => tag::VNODE,
            Kind::Record(r) => r.schema().tag,
        }
    }

    /// The canonical encoding, computed once and cached.
    pub fn encoding(&self) -> &[u8] {
        self.inner.encoding.get_or_init(|| {
            let mut buf = Vec::with_capacity(self.estimated_encoding_size());
            encoding::encode_cell(self, &mut buf);
            buf.into_boxed_slice()
        })
    }

    /// The 32-byte content hash of the canonical encoding.
    pub fn hash(&self) -> Hash {
        *self
            .inner
            .hash
            .get_or_init(|| Hash::digest(self.encoding()))
    }

    /// Returns `true` iff the encoding fits the embedding limit, in which
    /// case this cell is inlined into its parent's encoding.
    pub fn is_embedded(&self) -> bool {
        self.encoding().len() <= EMBEDDED_LIMIT
    }

    /// Memory-size estimate: zero for embedded cells, otherwise encoding
    /// length plus the memory sizes of reachable children, each unique
    /// hash counted once. Dehydrated children contribute zero.
    pub fn memory_size(&self) -> u64 {
        *self.inner.memory_size.get_or_init(|| {
            if self.is_embedded() {
                0
            } else {
                let mut seen = HashSet::new();
                self.calc_memory_size(&mut seen)
            }
        })
    }

    fn calc_memory_size(&self, seen: &mut HashSet<Hash>) -> u64 {
        if self.is_embedded() {
            return 0;
        }
        let mut total = self.encoding().len() as u64;
        for i in 0..self.ref_count() {
            let r = self.child_ref(i);
            if !seen.insert(r.hash()) {
                continue;
            }
            if let Some(child) = r.cell() {
                total += child.calc_memory_size(seen);
            }
        }
        total
    }

    /// Pre-sizing hint for the encoding buffer.
    pub fn estimated_encoding_size(&self) -> usize {
        match &self.inner.kind {
            Kind::Boolean(_) => 1,
            Kind::Long(_) => 9,
            Kind::Char(_) => 6,
            Kind::Text(s) => 11 + s.len(),
            Kind::Keyword(s) | Kind::Symbol(s) => 2 + s.len(),
            Kind::Address(_) => 11,
            Kind::Blob(b) => b.estimated_encoding_size(),
            Kind::Map(_) | Kind::Set(_) | Kind::Vector(_) | Kind::VectorNode(_) => {
                16 + 33 * self.ref_count()
            }
            Kind::VectorChunk(_) => 1 + 33 * 16,
            Kind::Record(_) => 1 + 33 * self.ref_count(),
        }
    }

    pub(crate) fn attach_encoding(&self, bytes: &[u8]) {
        let _ = self.inner.encoding.set(bytes.to_vec().into_boxed_slice());
    }

    // -- child refs ---------------------------------------------------------

    /// Number of direct child refs.
    pub fn ref_count(&self) -> usize {
        match &self.inner.kind {
            Kind::Boolean(_)
            | Kind::Long(_)
            | Kind::Char(_)
            | Kind::Text(_)
            | Kind::Keyword(_)
            | Kind::Symbol(_)
            | Kind::Address(_) => 0,
            Kind::Blob(b) => b.ref_count(),
            Kind::Map(m) => m.ref_count(),
            Kind::Set(s) => s.map().ref_count(),
            Kind::Vector(v) => v.ref_count(),
            Kind::VectorChunk(items) => items.len(),
            Kind::VectorNode(n) => n.children.len(),
            Kind::Record(r) => r.field_count(),
        }
    }

    /// The `i`-th direct child ref. Panics if `i >= ref_count()`.
    pub fn child_ref(&self, i: usize) -> CellRef {
        match &self.inner.kind {
            Kind::Blob(b) => b.child_ref(i),
            Kind::Map(m) => m.child_ref(i),
            Kind::Set(s) => s.map().child_ref(i),
            Kind::Vector(v) => v.child_ref(i),
            Kind::VectorChunk(items) => items[i].clone(),
            Kind::VectorNode(n) => n.children[i].clone(),
            Kind::Record(r) => r.child_ref(i),
            _ => panic!("cell has no child refs"),
        }
    }

    /// Return a structurally equal cell whose direct child refs have been
    /// mapped through `f`.
    ///
    /// `f` must map each ref to a ref of the same target hash; the result
    /// shares no caches with `self`.
    pub fn update_refs(&self, f: &mut dyn FnMut(&CellRef) -> CellRef) -> Value {
        let kind = match &self.inner.kind {
            k @ (Kind::Boolean(_)
            | Kind::Long(_)
            | Kind::Char(_)
            | Kind::Text(_)
            | Kind::Keyword(_)
            | Kind::Symbol(_)
            | Kind::Address(_)) => k.clone(),
            Kind::Blob(b) => Kind::Blob(b.update_refs(f)),
            Kind::Map(m) => Kind::Map(m.update_refs(f)),
            Kind::Set(s) => Kind::Set(Set::wrap(s.map().update_refs(f))),
            Kind::Vector(v) => Kind::Vector(v.update_refs(f)),
            Kind::VectorChunk(items) => {
                Kind::VectorChunk(items.iter().map(|r| f(r)).collect())
            }
            Kind::VectorNode(n) => Kind::VectorNode(VectorNode {
                count: n.count,
                children: n.children.iter().map(|r| f(r)).collect(),
            }),
            Kind::Record(r) => Kind::Record(r.update_refs(f)),
        };
        Value::from_kind(kind)
    }

    // -- typed accessors ----------------------------------------------------

    /// The boolean payload, or `Unsupported`.
    pub fn as_boolean(&self) -> CellResult<bool> {
        match self.kind() {
            Kind::Boolean(b) => Ok(*b),
            _ => Err(CellError::Unsupported("cell is not a boolean")),
        }
    }

    /// The long payload, or `Unsupported`.
    pub fn as_long(&self) -> CellResult<i64> {
        match self.kind() {
            Kind::Long(n) => Ok(*n),
            _ => Err(CellError::Unsupported("cell is not a long")),
        }
    }

    /// The string payload, or `Unsupported`.
    pub fn as_text(&self) -> CellResult<&str> {
        match self.kind() {
            Kind::Text(s) => Ok(s),
            _ => Err(CellError::Unsupported("cell is not a string")),
        }
    }

    /// The address payload, or `Unsupported`.
    pub fn as_address(&self) -> CellResult<Address> {
        match self.kind() {
            Kind::Address(a) => Ok(*a),
            _ => Err(CellError::Unsupported("cell is not an address")),
        }
    }

    /// The blob payload, or `Unsupported`.
    pub fn as_blob(&self) -> CellResult<&Blob> {
        match self.kind() {
            Kind::Blob(b) => Ok(b),
            _ => Err(CellError::Unsupported("cell is not a blob")),
        }
    }

    /// The map payload, or `Unsupported`.
    pub fn as_map(&self) -> CellResult<&Map> {
        match self.kind() {
            Kind::Map(m) => Ok(m),
            _ => Err(CellError::Unsupported("cell is not a map")),
        }
    }

    /// The set payload, or `Unsupported`.
    pub fn as_set(&self) -> CellResult<&Set> {
        match self.kind() {
            Kind::Set(s) => Ok(s),
            _ => Err(CellError::Unsupported("cell is not a set")),
        }
    }

    /// The vector payload, or `Unsupported`.
    pub fn as_vector(&self) -> CellResult<&Vector> {
        match self.kind() {
            Kind::Vector(v) => Ok(v),
            _ => Err(CellError::Unsupported("cell is not a vector")),
        }
    }

    /// The record payload, or `Unsupported`.
    pub fn as_record(&self) -> CellResult<&Record> {
        match self.kind() {
            Kind::Record(r) => Ok(r),
            _ => Err(CellError::Unsupported("cell is not a record")),
        }
    }

    /// Returns `true` if this is the boolean `true` cell.
    pub fn is_true(&self) -> bool {
        matches!(self.kind(), Kind::Boolean(true))
    }
}

fn check_name(name: &str) -> CellResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(CellError::InvalidData(format!(
            "name length {} outside 1..={}",
            name.len(),
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        // Shortcut on cached hashes before forcing an encoding.
        if let (Some(a), Some(b)) = (self.inner.hash.get(), other.inner.hash.get()) {
            return a == b;
        }
        self.hash() == other.hash()
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash().as_bytes().hash(state);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            Kind::Boolean(b) => write!(f, "{b}"),
            Kind::Long(n) => write!(f, "{n}"),
            Kind::Char(c) => write!(f, "\\{c}"),
            Kind::Text(s) => write!(f, "{s:?}"),
            Kind::Keyword(s) => write!(f, ":{s}"),
            Kind::Symbol(s) => write!(f, "{s}"),
            Kind::Address(a) => write!(f, "{a}"),
            Kind::Blob(b) => write!(f, "{b}"),
            Kind::Map(m) => write!(f, "<map:{}>", m.count()),
            Kind::Set(s) => write!(f, "<set:{}>", s.count()),
            Kind::Vector(v) => write!(f, "<vector:{}>", v.count()),
            Kind::VectorChunk(_) => write!(f, "<vchunk>"),
            Kind::VectorNode(n) => write!(f, "<vnode:{}>", n.count),
            Kind::Record(r) => write!(f, "<{}:{}>", r.schema().name, r.field_count()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({self})")
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        m.into_value()
    }
}

impl From<Set> for Value {
    fn from(s: Set) -> Self {
        s.into_value()
    }
}

impl From<Vector> for Value {
    fn from(v: Vector) -> Self {
        v.into_value()
    }
}

impl From<Blob> for Value {
    fn from(b: Blob) -> Self {
        b.into_value()
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        r.into_value()
    }
}
