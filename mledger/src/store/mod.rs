//! Backend abstraction: named tables of items keyed by a single string attribute,
//! with existence-conditioned single-item writes as the only atomic primitive.

use std::collections::BTreeSet;
use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{errors::StoreError, types::KEY_ATTRIBUTE};

pub mod memory;
pub mod redis_store;
mod scripts;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Precondition attached to a write, evaluated atomically against the target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// No item with this key exists.
    KeyAbsent,
    /// An item with this key exists.
    KeyExists,
}

impl Condition {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::KeyAbsent => "absent",
            Self::KeyExists => "exists",
        }
    }

    pub(crate) fn holds(self, present: bool) -> bool {
        match self {
            Self::KeyAbsent => !present,
            Self::KeyExists => present,
        }
    }
}

/// Primary key definition of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub attribute: String,
}

impl KeySchema {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::new(KEY_ATTRIBUTE)
    }
}

/// Raw attribute set as stored by a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Item(Map<String, Value>);

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a record; the record must serialize to a JSON object.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, StoreError> {
        match serde_json::to_value(record)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::Codec(serde::ser::Error::custom(format!(
                "records must encode to an object, got {other}"
            )))),
        }
    }

    /// Decodes into a typed record. Unknown attributes are ignored; missing
    /// required ones fail.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(attribute.into(), value.into());
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    /// Returns the string key under `schema`, if present.
    pub fn key(&self, schema: &KeySchema) -> Option<&str> {
        self.0.get(&schema.attribute).and_then(Value::as_str)
    }

    pub(crate) fn merge(&mut self, changes: &Item) {
        for (attribute, value) in &changes.0 {
            self.0.insert(attribute.clone(), value.clone());
        }
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Item {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Item-level CRUD over named tables.
///
/// Conditional writes are the sole synchronization primitive the ledger and
/// the lock rely on: an implementation must evaluate the [`Condition`] and
/// apply the write as one atomic step, and report a failed condition as
/// [`StoreError::ConditionFailed`].
pub trait KeyValueStore: Send + Sync {
    /// Lists every item of `table`, ordered by key.
    fn scan(&self, table: &str) -> impl Future<Output = Result<Vec<Item>, StoreError>> + Send;

    /// Writes `item` whole, replacing any previous item with the same key.
    fn put(
        &self,
        table: &str,
        item: Item,
        condition: Option<Condition>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Merges `changes` into the item at `key`, creating it when absent and
    /// no condition forbids it.
    fn update(
        &self,
        table: &str,
        key: &str,
        changes: Item,
        condition: Option<Condition>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes the item at `key`. Without a condition, deleting a missing key succeeds.
    fn delete(
        &self,
        table: &str,
        key: &str,
        condition: Option<Condition>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_tables(&self) -> impl Future<Output = Result<BTreeSet<String>, StoreError>> + Send;

    /// Creates an empty table; fails with [`StoreError::TableAlreadyExists`] if present.
    fn create_table(&self, table: &str, schema: KeySchema) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Drops a table with all its items; fails with [`StoreError::TableNotFound`] if absent.
    fn delete_table(&self, table: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, serde::Deserialize, PartialEq)]
    struct Record {
        id: String,
        dirty: bool,
    }

    #[test]
    fn decode_ignores_unknown_attributes() {
        let item = Item::new().with("id", "7").with("dirty", false).with("applied_by", "ci");
        let record: Record = item.decode().unwrap();
        assert_eq!(
            record,
            Record {
                id: "7".to_string(),
                dirty: false
            }
        );
    }

    #[test]
    fn decode_rejects_missing_attributes() {
        let item = Item::new().with("id", "7");
        assert!(item.decode::<Record>().is_err());
    }

    #[test]
    fn default_schema_keys_on_the_record_id() {
        assert_eq!(KeySchema::default(), KeySchema::new(KEY_ATTRIBUTE));
        let record = Item::from_record(&Record {
            id: "7".to_string(),
            dirty: true,
        })
        .unwrap();
        assert_eq!(record.key(&KeySchema::default()), Some("7"));
    }

    #[test]
    fn key_requires_a_string() {
        let schema = KeySchema::default();
        assert_eq!(Item::new().with("id", "a").key(&schema), Some("a"));
        assert_eq!(Item::new().with("id", 3).key(&schema), None);
    }

    #[test]
    fn conditions_evaluate_presence() {
        assert!(Condition::KeyAbsent.holds(false));
        assert!(!Condition::KeyAbsent.holds(true));
        assert!(Condition::KeyExists.holds(true));
        assert!(!Condition::KeyExists.holds(false));
    }
}
