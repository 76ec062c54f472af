//! Persistent hash sets.
//!
//! A set is a thin view over a map in which every value is the `TRUE`
//! sentinel; element presence is map membership. The encoding swaps the
//! map tag for the set tag and keeps the map's raw payload.

use crate::cell::{Kind, Value};
use crate::error::CellResult;
use crate::map::Map;

/// A persistent hash set cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Set {
    map: Map,
}

impl Set {
    /// The empty set.
    pub fn empty() -> Set {
        Set { map: Map::empty() }
    }

    /// Wrap an existing map whose values are all `TRUE`.
    pub(crate) fn wrap(map: Map) -> Set {
        Set { map }
    }

    /// Build a set from elements.
    pub fn of(elements: impl IntoIterator<Item = Value>) -> CellResult<Set> {
        let mut s = Set::empty();
        for e in elements {
            s = s.include(e)?;
        }
        Ok(s)
    }

    /// The underlying map.
    pub(crate) fn map(&self) -> &Map {
        &self.map
    }

    /// Number of elements.
    pub fn count(&self) -> u64 {
        self.map.count()
    }

    /// Returns `true` for the empty set.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Wrap into a cell.
    pub fn into_value(self) -> Value {
        Value::from_kind(Kind::Set(self))
    }

    /// Returns `true` if `element` is a member.
    pub fn contains(&self, element: &Value) -> CellResult<bool> {
        self.map.contains_key(element)
    }

    /// Return a set including `element`.
    pub fn include(&self, element: Value) -> CellResult<Set> {
        Ok(Set::wrap(self.map.assoc(element, Value::boolean(true))?))
    }

    /// Return a set without `element`.
    pub fn exclude(&self, element: &Value) -> CellResult<Set> {
        Ok(Set::wrap(self.map.dissoc(element)?))
    }

    /// Union with another set.
    pub fn include_all(&self, other: &Set) -> CellResult<Set> {
        let mut s = self.clone();
        for e in other.members()? {
            s = s.include(e)?;
        }
        Ok(s)
    }

    /// Difference: members of this set absent from `other`.
    pub fn exclude_all(&self, other: &Set) -> CellResult<Set> {
        let mut s = self.clone();
        for e in other.members()? {
            s = s.exclude(&e)?;
        }
        Ok(s)
    }

    /// Intersection with another set.
    pub fn intersection(&self, other: &Set) -> CellResult<Set> {
        let mut s = Set::empty();
        for e in self.members()? {
            if other.contains(&e)? {
                s = s.include(e)?;
            }
        }
        Ok(s)
    }

    /// All members, in ascending hash order.
    pub fn members(&self) -> CellResult<Vec<Value>> {
        self.map.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(values: &[i64]) -> Set {
        Set::of(values.iter().map(|n| Value::long(*n))).unwrap()
    }

    #[test]
    fn include_and_contains() {
        let s = set_of(&[1, 2, 3]);
        assert_eq!(s.count(), 3);
        assert!(s.contains(&Value::long(2)).unwrap());
        assert!(!s.contains(&Value::long(4)).unwrap());
    }

    #[test]
    fn include_is_idempotent() {
        let s = set_of(&[1]).include(Value::long(1)).unwrap();
        assert_eq!(s.count(), 1);
    }

    #[test]
    fn exclude_removes_member() {
        let s = set_of(&[1, 2]).exclude(&Value::long(1)).unwrap();
        assert_eq!(s.count(), 1);
        assert!(!s.contains(&Value::long(1)).unwrap());
    }

    #[test]
    fn union_difference_intersection() {
        let a = set_of(&[1, 2, 3]);
        let b = set_of(&[2, 3, 4]);

        let union = a.include_all(&b).unwrap();
        assert_eq!(union.count(), 4);

        let diff = a.exclude_all(&b).unwrap();
        assert_eq!(diff.count(), 1);
        assert!(diff.contains(&Value::long(1)).unwrap());

        let inter = a.intersection(&b).unwrap();
        assert_eq!(inter.count(), 2);
        assert!(inter.contains(&Value::long(2)).unwrap());
        assert!(inter.contains(&Value::long(3)).unwrap());
    }

    #[test]
    fn set_equality_ignores_insertion_order() {
        let a = set_of(&[1, 2, 3]);
        let b = set_of(&[3, 1, 2]);
        assert_eq!(a.into_value(), b.into_value());
    }

    #[test]
    fn set_hash_differs_from_map_hash() {
        let s = set_of(&[5]);
        let m = Map::of([(Value::long(5), Value::boolean(true))]).unwrap();
        assert_ne!(s.into_value().hash(), m.into_value().hash());
    }
}
