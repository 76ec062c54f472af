//! Fixed-schema records.
//!
//! A record is an ordered tuple of values under a declared list of
//! keyword keys. The schema is implicit in the tag, so field names never
//! appear in the encoding, and records of different schemas are never
//! equal. Associating a key outside the schema upgrades the record into
//! a general map.

use crate::cell::{Kind, Value};
use crate::error::{CellError, CellResult};
use crate::map::Map;
use crate::reference::CellRef;
use crate::tag;

/// A record schema: a tag and an ordered list of keyword keys.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordSchema {
    /// Tag byte in `RECORD_BASE..=RECORD_MAX`, unique per schema.
    pub tag: u8,
    /// Human-readable schema name.
    pub name: &'static str,
    /// Keyword names in field order.
    pub keys: &'static [&'static str],
}

/// Ledger account state: transaction sequence, native balance, and the
/// controlling address.
pub static ACCOUNT: RecordSchema = RecordSchema {
    tag: tag::RECORD_BASE,
    name: "account",
    keys: &["sequence", "balance", "controller"],
};

/// An ordered batch of transactions with its timestamp.
pub static BLOCK: RecordSchema = RecordSchema {
    tag: tag::RECORD_BASE + 1,
    name: "block",
    keys: &["timestamp", "transactions"],
};

/// All registered schemas, indexed by `tag - RECORD_BASE`.
pub static SCHEMAS: &[&RecordSchema] = &[&ACCOUNT, &BLOCK];

/// Look up a schema by its tag byte.
pub fn schema_for_tag(t: u8) -> Option<&'static RecordSchema> {
    if !tag::is_record(t) {
        return None;
    }
    SCHEMAS.get((t - tag::RECORD_BASE) as usize).copied()
}

/// A fixed-schema record cell.
#[derive(Clone, Debug)]
pub struct Record {
    schema: &'static RecordSchema,
    fields: Vec<CellRef>,
}

impl Record {
    /// Create a record; `fields` must match the schema arity.
    pub fn new(schema: &'static RecordSchema, fields: Vec<Value>) -> CellResult<Record> {
        if fields.len() != schema.keys.len() {
            return Err(CellError::InvalidData(format!(
                "schema {} expects {} fields, got {}",
                schema.name,
                schema.keys.len(),
                fields.len()
            )));
        }
        Ok(Record {
            schema,
            fields: fields.into_iter().map(CellRef::direct).collect(),
        })
    }

    pub(crate) fn from_refs(schema: &'static RecordSchema, fields: Vec<CellRef>) -> Record {
        debug_assert_eq!(fields.len(), schema.keys.len());
        Record { schema, fields }
    }

    /// The record's schema.
    pub fn schema(&self) -> &'static RecordSchema {
        self.schema
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Wrap into a cell.
    pub fn into_value(self) -> Value {
        Value::from_kind(Kind::Record(self))
    }

    /// Schema index of a keyword key, if the key belongs to the schema.
    fn key_index(&self, key: &str) -> Option<usize> {
        self.schema.keys.iter().position(|k| *k == key)
    }

    /// The field value for a keyword name, or `None` outside the schema.
    pub fn get_named(&self, key: &str) -> CellResult<Option<Value>> {
        match self.key_index(key) {
            Some(i) => Ok(Some(self.fields[i].value()?)),
            None => Ok(None),
        }
    }

    /// The field value for a keyword cell, or `None` outside the schema.
    pub fn get(&self, key: &Value) -> CellResult<Option<Value>> {
        match key.kind() {
            Kind::Keyword(name) => self.get_named(name),
            _ => Ok(None),
        }
    }

    /// The field value at a schema index.
    pub fn field(&self, i: usize) -> CellResult<Value> {
        if i >= self.fields.len() {
            return Err(CellError::IndexOutOfBounds {
                index: i as u64,
                count: self.fields.len() as u64,
            });
        }
        self.fields[i].value()
    }

    /// Associate a keyword with a value.
    ///
    /// A schema key yields a record with one field replaced. A non-schema
    /// keyword upgrades the record into a general map of keyword → value.
    pub fn assoc(&self, key: &Value, value: Value) -> CellResult<Value> {
        let Kind::Keyword(name) = key.kind() else {
            return Err(CellError::Unsupported("record keys are keywords"));
        };
        if let Some(i) = self.key_index(name) {
            let mut fields = self.fields.clone();
            fields[i] = CellRef::direct(value);
            return Ok(Record {
                schema: self.schema,
                fields,
            }
            .into_value());
        }
        let mut map = self.to_map()?;
        map = map.assoc(key.clone(), value)?;
        Ok(map.into_value())
    }

    /// The record as a general map of keyword → value.
    pub fn to_map(&self) -> CellResult<Map> {
        let mut map = Map::empty();
        for (i, key) in self.schema.keys.iter().enumerate() {
            map = map.assoc(Value::keyword(*key)?, self.fields[i].value()?)?;
        }
        Ok(map)
    }

    pub(crate) fn child_ref(&self, i: usize) -> CellRef {
        self.fields[i].clone()
    }

    pub(crate) fn update_refs(&self, f: &mut dyn FnMut(&CellRef) -> CellRef) -> Record {
        Record {
            schema: self.schema,
            fields: self.fields.iter().map(|r| f(r)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(seq: i64, balance: i64, controller: u64) -> Record {
        Record::new(
            &ACCOUNT,
            vec![
                Value::long(seq),
                Value::long(balance),
                Value::address(controller),
            ],
        )
        .unwrap()
    }

    #[test]
    fn arity_is_checked() {
        let err = Record::new(&ACCOUNT, vec![Value::long(1)]).unwrap_err();
        assert!(matches!(err, CellError::InvalidData(_)));
    }

    #[test]
    fn get_by_schema_key() {
        let r = account(3, 1000, 12);
        assert_eq!(
            r.get_named("balance").unwrap(),
            Some(Value::long(1000))
        );
        assert_eq!(
            r.get(&Value::keyword("sequence").unwrap()).unwrap(),
            Some(Value::long(3))
        );
        assert_eq!(r.get_named("missing").unwrap(), None);
    }

    #[test]
    fn field_by_index() {
        let r = account(3, 1000, 12);
        assert_eq!(r.field(2).unwrap(), Value::address(12));
        assert!(matches!(
            r.field(3),
            Err(CellError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn assoc_schema_key_stays_a_record() {
        let r = account(3, 1000, 12);
        let updated = r
            .assoc(&Value::keyword("balance").unwrap(), Value::long(900))
            .unwrap();
        let rec = updated.as_record().unwrap();
        assert_eq!(rec.get_named("balance").unwrap(), Some(Value::long(900)));
        assert_eq!(rec.get_named("sequence").unwrap(), Some(Value::long(3)));
    }

    #[test]
    fn assoc_foreign_key_upgrades_to_map() {
        let r = account(3, 1000, 12);
        let upgraded = r
            .assoc(&Value::keyword("memo").unwrap(), Value::text("hi"))
            .unwrap();
        let map = upgraded.as_map().unwrap();
        assert_eq!(map.count(), 4);
        assert_eq!(
            map.get(&Value::keyword("memo").unwrap()).unwrap(),
            Some(Value::text("hi"))
        );
        assert_eq!(
            map.get(&Value::keyword("balance").unwrap()).unwrap(),
            Some(Value::long(1000))
        );
    }

    #[test]
    fn records_of_different_schemas_are_never_equal() {
        let a = Record::new(&BLOCK, vec![Value::long(0), Value::long(0)]).unwrap();
        // A two-field view of an account-like record cannot exist, so
        // compare against a block with different content instead.
        let b = Record::new(&BLOCK, vec![Value::long(0), Value::long(1)]).unwrap();
        assert_ne!(a.clone().into_value(), b.into_value());
        let acc = account(0, 0, 0);
        assert_ne!(a.into_value(), acc.into_value());
    }

    #[test]
    fn schema_lookup_by_tag() {
        assert_eq!(schema_for_tag(0xA0), Some(&ACCOUNT));
        assert_eq!(schema_for_tag(0xA1), Some(&BLOCK));
        assert_eq!(schema_for_tag(0xA2), None);
        assert_eq!(schema_for_tag(0x90), None);
    }
}
