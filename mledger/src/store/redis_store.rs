use std::borrow::Cow;
use std::collections::BTreeSet;

use log::debug;
use redis::{Script, aio::ConnectionManager};
use serde::Deserialize;
use serde_json::Value;

use super::{
    Condition, Item, KeySchema, KeyValueStore,
    scripts::{DELETE_ITEM_SCRIPT, DELETE_TABLE_SCRIPT, PUT_ITEM_SCRIPT, SCAN_TABLE_SCRIPT, UPDATE_ITEM_SCRIPT},
};
use crate::errors::StoreError;

/// Redis-backed store.
///
/// Layout under `namespace` (braced so every key lands in one cluster slot):
/// - `{namespace}:tables` hash of table name to key attribute
/// - `{namespace}:table:<name>` hash of item key to item JSON
///
/// Each conditional write runs as one Lua script, so the existence check and
/// the write cannot interleave with another client.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    namespace: String,
}

#[derive(Deserialize)]
struct ScanReply {
    key_attribute: String,
    items: Vec<Item>,
}

fn condition_arg(condition: Option<Condition>) -> &'static str {
    condition.map_or("none", Condition::as_str)
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    /// Opens a managed connection to `url`.
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn, namespace))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn registry_key(&self) -> String {
        format!("{{{}}}:tables", self.namespace)
    }

    pub fn table_key(&self, table: &str) -> String {
        format!("{{{}}}:table:{}", self.namespace, table)
    }

    async fn invoke(&self, script: &Script, table: &str, args: &[&str]) -> Result<Value, StoreError> {
        let mut conn = self.conn.clone();
        let mut invocation = script.prepare_invoke();
        invocation.key(self.registry_key()).key(self.table_key(table)).arg(table);
        for arg in args {
            invocation.arg(*arg);
        }
        let raw: String = invocation.invoke_async(&mut conn).await?;
        decode_reply(&raw, table)
    }
}

/// Parses a script reply, turning `{"error": ...}` into the matching [`StoreError`].
fn decode_reply(raw: &str, table: &str) -> Result<Value, StoreError> {
    let value: Value = serde_json::from_str(raw)?;
    let Some(error) = value.get("error") else {
        return Ok(value);
    };
    Err(match error.as_str() {
        Some("condition_failed") => StoreError::ConditionFailed,
        Some("table_not_found") => StoreError::TableNotFound {
            table: table.to_string(),
        },
        Some("missing_key") => StoreError::MissingKey {
            table: table.to_string(),
            attribute: value
                .get("attribute")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        Some(other) => StoreError::Script {
            message: Cow::Owned(other.to_string()),
        },
        None => StoreError::Script {
            message: Cow::Borrowed("lua_error"),
        },
    })
}

impl KeyValueStore for RedisStore {
    async fn scan(&self, table: &str) -> Result<Vec<Item>, StoreError> {
        debug!("scan {table}");
        let value = self.invoke(&SCAN_TABLE_SCRIPT, table, &[]).await?;
        let reply: ScanReply = serde_json::from_value(value)?;
        let schema = KeySchema::new(reply.key_attribute);
        let mut items = reply.items;
        items.sort_by(|a, b| a.key(&schema).cmp(&b.key(&schema)));
        Ok(items)
    }

    async fn put(&self, table: &str, item: Item, condition: Option<Condition>) -> Result<(), StoreError> {
        debug!("put into {table} ({condition:?})");
        let payload = serde_json::to_string(&item)?;
        self.invoke(&PUT_ITEM_SCRIPT, table, &[payload.as_str(), condition_arg(condition)])
            .await
            .map(|_| ())
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        changes: Item,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        debug!("update {table}/{key} ({condition:?})");
        let payload = serde_json::to_string(&changes)?;
        self.invoke(&UPDATE_ITEM_SCRIPT, table, &[key, payload.as_str(), condition_arg(condition)])
            .await
            .map(|_| ())
    }

    async fn delete(&self, table: &str, key: &str, condition: Option<Condition>) -> Result<(), StoreError> {
        debug!("delete {table}/{key} ({condition:?})");
        self.invoke(&DELETE_ITEM_SCRIPT, table, &[key, condition_arg(condition)])
            .await
            .map(|_| ())
    }

    async fn list_tables(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut conn = self.conn.clone();
        let names: Vec<String> = redis::cmd("HKEYS")
            .arg(self.registry_key())
            .query_async(&mut conn)
            .await?;
        Ok(names.into_iter().collect())
    }

    async fn create_table(&self, table: &str, schema: KeySchema) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let created: i64 = redis::cmd("HSETNX")
            .arg(self.registry_key())
            .arg(table)
            .arg(&schema.attribute)
            .query_async(&mut conn)
            .await?;
        if created == 0 {
            return Err(StoreError::TableAlreadyExists {
                table: table.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), StoreError> {
        self.invoke(&DELETE_TABLE_SCRIPT, table, &[]).await.map(|_| ())
    }
}
