//! Advisory lock built from a conditional insert and an unconditional delete
//! on one well-known key.
//!
//! Free -> Held on a successful insert, Held -> Free on delete. Nothing is
//! stored about the holder: no owner, no lease, no fencing token. A holder
//! that dies without releasing keeps the lock until an operator removes it
//! (see [`Ledger::force_release`]).

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{LedgerError, LedgerResult, StoreError},
    ledger::Ledger,
    store::{Condition, Item, KeySchema, KeyValueStore},
    types::{KEY_ATTRIBUTE, LockRecord},
};

impl<S> Ledger<S>
where
    S: KeyValueStore + Clone,
{
    /// Blocks until the lock is ours.
    ///
    /// While another runner holds the lock this retries every
    /// `lock_retry_interval`, forever; contention never turns into an error.
    /// `cancel` is checked before each attempt and during the pause between
    /// attempts, but a write already sent is always awaited to completion.
    pub async fn acquire(&self, cancel: &CancellationToken) -> LedgerResult<LockGuard<S>> {
        let table = &self.config.lock_table_name;
        let key = &self.config.lock_key;
        let mut attempts: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }

            let item = Item::from_record(&LockRecord { id: key.clone() })
                .map_err(|err| LedgerError::store("lock before migrating", err))?;
            attempts += 1;

            match self.store.put(table, item, Some(Condition::KeyAbsent)).await {
                Ok(()) => break,
                Err(StoreError::ConditionFailed) => {
                    debug!(
                        "lock {table}/{key} is held, retrying in {:?} (attempt {attempts})",
                        self.config.lock_retry_interval
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(LedgerError::Cancelled),
                        _ = tokio::time::sleep(self.config.lock_retry_interval) => {}
                    }
                }
                Err(err) => return Err(LedgerError::store("lock before migrating", err)),
            }
        }

        info!("acquired lock {table}/{key} after {attempts} attempt(s)");
        Ok(LockGuard {
            store: self.store.clone(),
            lock_table_name: table.clone(),
            lock_key: key.clone(),
            released: false,
        })
    }

    /// Whether the lock item is currently present.
    pub async fn is_locked(&self) -> LedgerResult<bool> {
        let items = self
            .store
            .scan(&self.config.lock_table_name)
            .await
            .map_err(|err| LedgerError::store("scan migrations lock table", err))?;
        let schema = KeySchema::new(KEY_ATTRIBUTE);
        Ok(items
            .iter()
            .any(|item| item.key(&schema) == Some(self.config.lock_key.as_str())))
    }

    /// Deletes the lock item regardless of who holds it. Operator recovery
    /// for a holder that died without releasing.
    pub async fn force_release(&self) -> LedgerResult<()> {
        self.store
            .delete(&self.config.lock_table_name, &self.config.lock_key, None)
            .await
            .map_err(|err| LedgerError::store("force release lock", err))?;
        warn!(
            "force released lock {}/{}",
            self.config.lock_table_name, self.config.lock_key
        );
        Ok(())
    }
}

/// Proof of a successful [`Ledger::acquire`]. Consumed by [`LockGuard::release`].
///
/// Release is an unconditional delete of the lock key: it cannot tell whether
/// the key still belongs to this acquisition. Dropping the guard without
/// releasing leaves the lock held.
#[must_use = "dropping a LockGuard without releasing it leaves the lock held"]
pub struct LockGuard<S> {
    store: S,
    lock_table_name: String,
    lock_key: String,
    released: bool,
}

impl<S> LockGuard<S>
where
    S: KeyValueStore,
{
    pub fn lock_table_name(&self) -> &str {
        &self.lock_table_name
    }

    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    /// Marks the lock free. If the delete fails the lock is still held and
    /// the dropped guard reports it.
    pub async fn release(mut self) -> LedgerResult<()> {
        self.delete_lock().await
    }

    async fn delete_lock(&mut self) -> LedgerResult<()> {
        self.store
            .delete(&self.lock_table_name, &self.lock_key, None)
            .await
            .map_err(|err| LedgerError::store("release lock", err))?;
        self.released = true;
        info!("released lock {}/{}", self.lock_table_name, self.lock_key);
        Ok(())
    }
}

impl<S> Drop for LockGuard<S> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "lock {}/{} dropped without release; it stays held until force released",
                self.lock_table_name, self.lock_key
            );
        }
    }
}

impl<S> std::fmt::Debug for LockGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock_table_name", &self.lock_table_name)
            .field("lock_key", &self.lock_key)
            .field("released", &self.released)
            .finish()
    }
}
