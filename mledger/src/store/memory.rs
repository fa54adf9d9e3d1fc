use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{Condition, Item, KeySchema, KeyValueStore};
use crate::errors::StoreError;

#[derive(Debug)]
struct MemoryTable {
    schema: KeySchema,
    items: BTreeMap<String, Item>,
}

/// Process-local store. Clones share the same tables, so a clone handed to
/// each task behaves like several clients of one backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check(condition: Option<Condition>, present: bool) -> Result<(), StoreError> {
    match condition {
        Some(condition) if !condition.holds(present) => Err(StoreError::ConditionFailed),
        _ => Ok(()),
    }
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    table: &str,
) -> Result<&'a mut MemoryTable, StoreError> {
    tables.get_mut(table).ok_or_else(|| StoreError::TableNotFound {
        table: table.to_string(),
    })
}

impl KeyValueStore for MemoryStore {
    async fn scan(&self, table: &str) -> Result<Vec<Item>, StoreError> {
        let mut tables = self.tables.lock().await;
        let table = table_mut(&mut tables, table)?;
        Ok(table.items.values().cloned().collect())
    }

    async fn put(&self, table: &str, item: Item, condition: Option<Condition>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let entry = table_mut(&mut tables, table)?;
        let key = item
            .key(&entry.schema)
            .ok_or_else(|| StoreError::MissingKey {
                table: table.to_string(),
                attribute: entry.schema.attribute.clone(),
            })?
            .to_string();
        check(condition, entry.items.contains_key(&key))?;
        entry.items.insert(key, item);
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        changes: Item,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let entry = table_mut(&mut tables, table)?;
        check(condition, entry.items.contains_key(key))?;
        let attribute = entry.schema.attribute.clone();
        let item = entry
            .items
            .entry(key.to_string())
            .or_insert_with(|| Item::new().with(attribute, key));
        item.merge(&changes);
        Ok(())
    }

    async fn delete(&self, table: &str, key: &str, condition: Option<Condition>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let entry = table_mut(&mut tables, table)?;
        check(condition, entry.items.contains_key(key))?;
        entry.items.remove(key);
        Ok(())
    }

    async fn list_tables(&self) -> Result<BTreeSet<String>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.keys().cloned().collect())
    }

    async fn create_table(&self, table: &str, schema: KeySchema) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.contains_key(table) {
            return Err(StoreError::TableAlreadyExists {
                table: table.to_string(),
            });
        }
        tables.insert(
            table.to_string(),
            MemoryTable {
                schema,
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| StoreError::TableNotFound {
                table: table.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(table: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table(table, KeySchema::default()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn put_respects_key_absent() {
        let store = store_with("t").await;
        let item = Item::new().with("id", "a");
        store.put("t", item.clone(), Some(Condition::KeyAbsent)).await.unwrap();
        let err = store.put("t", item, Some(Condition::KeyAbsent)).await.unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
    }

    #[tokio::test]
    async fn put_requires_the_key_attribute() {
        let store = store_with("t").await;
        let err = store.put("t", Item::new().with("name", "a"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingKey { .. }));
    }

    #[tokio::test]
    async fn update_merges_attributes() {
        let store = store_with("t").await;
        store
            .put("t", Item::new().with("id", "a").with("dirty", true).with("note", "x"), None)
            .await
            .unwrap();
        store
            .update("t", "a", Item::new().with("dirty", false), Some(Condition::KeyExists))
            .await
            .unwrap();
        let items = store.scan("t").await.unwrap();
        assert_eq!(items, vec![Item::new().with("id", "a").with("dirty", false).with("note", "x")]);
    }

    #[tokio::test]
    async fn update_without_condition_creates() {
        let store = store_with("t").await;
        store.update("t", "b", Item::new().with("dirty", true), None).await.unwrap();
        let items = store.scan("t").await.unwrap();
        assert_eq!(items, vec![Item::new().with("id", "b").with("dirty", true)]);
    }

    #[tokio::test]
    async fn unconditional_delete_of_missing_key_succeeds() {
        let store = store_with("t").await;
        store.delete("t", "missing", None).await.unwrap();
        let err = store.delete("t", "missing", Some(Condition::KeyExists)).await.unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
    }

    #[tokio::test]
    async fn scan_is_ordered_by_key() {
        let store = store_with("t").await;
        for key in ["b", "c", "a"] {
            store.put("t", Item::new().with("id", key), None).await.unwrap();
        }
        let keys: Vec<String> = store
            .scan("t")
            .await
            .unwrap()
            .iter()
            .map(|item| item.key(&KeySchema::default()).unwrap().to_string())
            .collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn missing_tables_are_reported() {
        let store = MemoryStore::new();
        assert!(matches!(store.scan("t").await, Err(StoreError::TableNotFound { .. })));
        assert!(matches!(store.delete_table("t").await, Err(StoreError::TableNotFound { .. })));
        store.create_table("t", KeySchema::default()).await.unwrap();
        assert!(matches!(
            store.create_table("t", KeySchema::default()).await,
            Err(StoreError::TableAlreadyExists { .. })
        ));
    }
}
