//! Durable record of applied migrations.
//!
//! Every state change is one conditional write on one item. A migration is
//! recorded dirty when it starts and cleared when it finishes, so a runner
//! that dies in between leaves a dirty record behind, and `list_done`/`current`
//! refuse to answer until an operator resolves it.

use log::{debug, info};

use crate::{
    config::{LedgerConfig, LedgerOption},
    errors::{LedgerError, LedgerResult, StoreError},
    store::{Condition, Item, KeySchema, KeyValueStore},
    types::{DIRTY_ATTRIBUTE, KEY_ATTRIBUTE, MigrationRecord},
};

/// Ledger and lock over one backend, configured once at construction.
#[derive(Debug, Clone)]
pub struct Ledger<S> {
    pub(crate) store: S,
    pub(crate) config: LedgerConfig,
}

impl<S> Ledger<S>
where
    S: KeyValueStore,
{
    /// Resolves the configuration from the defaults plus `options`, applied in order.
    pub fn new<I>(store: S, options: I) -> Self
    where
        I: IntoIterator<Item = LedgerOption>,
    {
        Self::with_config(store, LedgerConfig::from_options(options))
    }

    pub fn with_config(store: S, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates the ledger and lock tables unless they already exist.
    pub async fn provision(&self) -> LedgerResult<()> {
        let existing = self
            .store
            .list_tables()
            .await
            .map_err(|err| LedgerError::store("list tables", err))?;

        for (table, operation) in [
            (&self.config.table_name, "create migrations table"),
            (&self.config.lock_table_name, "create migrations lock table"),
        ] {
            if existing.contains(table) {
                debug!("table {table} already provisioned");
                continue;
            }
            match self.store.create_table(table, KeySchema::new(KEY_ATTRIBUTE)).await {
                Ok(()) => info!("provisioned table {table}"),
                // another runner provisioned it between our listing and now
                Err(StoreError::TableAlreadyExists { .. }) => debug!("table {table} created concurrently"),
                Err(err) => return Err(LedgerError::store(operation, err)),
            }
        }
        Ok(())
    }

    /// Drops both tables. Stops at the first failure without restoring anything.
    pub async fn deprovision(&self) -> LedgerResult<()> {
        self.store
            .delete_table(&self.config.table_name)
            .await
            .map_err(|err| LedgerError::store("delete migrations table", err))?;
        info!("deleted table {}", self.config.table_name);

        self.store
            .delete_table(&self.config.lock_table_name)
            .await
            .map_err(|err| LedgerError::store("delete migrations lock table", err))?;
        info!("deleted table {}", self.config.lock_table_name);
        Ok(())
    }

    /// Every record in the ledger, dirty or not, ordered by id.
    pub async fn records(&self) -> LedgerResult<Vec<MigrationRecord>> {
        let items = self
            .store
            .scan(&self.config.table_name)
            .await
            .map_err(|err| LedgerError::store("scan migrations table", err))?;

        let mut records = items
            .iter()
            .map(|item| {
                item.decode::<MigrationRecord>().map_err(|source| LedgerError::Decode {
                    table: self.config.table_name.clone(),
                    source,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// Ids of all finished migrations in ascending order.
    ///
    /// Fails with [`LedgerError::DirtyState`] if any record is dirty; no partial
    /// list is ever returned.
    pub async fn list_done(&self) -> LedgerResult<Vec<String>> {
        let records = self.records().await?;
        if records.iter().any(|record| record.dirty) {
            return Err(LedgerError::DirtyState);
        }
        Ok(records.into_iter().map(|record| record.id).collect())
    }

    /// The greatest finished id.
    pub async fn current(&self) -> LedgerResult<String> {
        self.list_done()
            .await?
            .pop()
            .ok_or(LedgerError::NoCurrentMigration)
    }

    /// Records `id` as started. The id must not be recorded yet.
    pub async fn add(&self, id: &str) -> LedgerResult<()> {
        let item = Item::from_record(&MigrationRecord::started(id))
            .map_err(|err| LedgerError::store("add migration", err))?;

        match self
            .store
            .put(&self.config.table_name, item, Some(Condition::KeyAbsent))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionFailed) => Err(LedgerError::MigrationAlreadyExists { id: id.to_string() }),
            Err(err) => Err(LedgerError::store("add migration", err)),
        }
    }

    /// Deletes the record of `id`.
    pub async fn remove(&self, id: &str) -> LedgerResult<()> {
        match self
            .store
            .delete(&self.config.table_name, id, Some(Condition::KeyExists))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionFailed) => Err(LedgerError::MigrationNotFound { id: id.to_string() }),
            Err(err) => Err(LedgerError::store("remove migration", err)),
        }
    }

    /// Marks an existing record dirty.
    pub async fn start_migration(&self, id: &str) -> LedgerResult<()> {
        self.set_dirty(id, true, "start migration").await
    }

    /// Marks an existing record clean.
    pub async fn finish_migration(&self, id: &str) -> LedgerResult<()> {
        self.set_dirty(id, false, "finish migration").await
    }

    async fn set_dirty(&self, id: &str, dirty: bool, operation: &'static str) -> LedgerResult<()> {
        let changes = Item::new().with(DIRTY_ATTRIBUTE, dirty);
        match self
            .store
            .update(&self.config.table_name, id, changes, Some(Condition::KeyExists))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionFailed) => Err(LedgerError::MigrationNotFound { id: id.to_string() }),
            Err(err) => Err(LedgerError::store(operation, err)),
        }
    }
}
