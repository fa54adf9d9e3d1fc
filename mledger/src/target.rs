//! Interface consumed by a migration runner.
//!
//! A runner is written against [`MigrationTarget`] so it can drive any ledger
//! backend; [`Ledger`] is the implementation shipped here.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::{
    errors::LedgerResult,
    ledger::Ledger,
    lock::LockGuard,
    store::KeyValueStore,
};

/// Releases a held migration lock.
pub trait Unlocker: Send {
    fn unlock(self) -> impl Future<Output = LedgerResult<()>> + Send;
}

impl<S> Unlocker for LockGuard<S>
where
    S: KeyValueStore,
{
    async fn unlock(self) -> LedgerResult<()> {
        self.release().await
    }
}

/// Everything a runner needs from the place migrations are recorded.
pub trait MigrationTarget: Send + Sync {
    type Unlocker: Unlocker;

    /// Latest finished migration id.
    fn current(&self) -> impl Future<Output = LedgerResult<String>> + Send;
    /// Provisions storage; safe to call repeatedly.
    fn create(&self) -> impl Future<Output = LedgerResult<()>> + Send;
    /// Removes storage.
    fn destroy(&self) -> impl Future<Output = LedgerResult<()>> + Send;
    /// Finished ids, ascending.
    fn done(&self) -> impl Future<Output = LedgerResult<Vec<String>>> + Send;
    fn add(&self, id: &str) -> impl Future<Output = LedgerResult<()>> + Send;
    fn remove(&self, id: &str) -> impl Future<Output = LedgerResult<()>> + Send;
    fn start_migration(&self, id: &str) -> impl Future<Output = LedgerResult<()>> + Send;
    fn finish_migration(&self, id: &str) -> impl Future<Output = LedgerResult<()>> + Send;
    /// Waits for exclusive access to the migration process.
    fn lock(&self, cancel: &CancellationToken) -> impl Future<Output = LedgerResult<Self::Unlocker>> + Send;
}

impl<S> MigrationTarget for Ledger<S>
where
    S: KeyValueStore + Clone,
{
    type Unlocker = LockGuard<S>;

    async fn current(&self) -> LedgerResult<String> {
        Ledger::current(self).await
    }

    async fn create(&self) -> LedgerResult<()> {
        self.provision().await
    }

    async fn destroy(&self) -> LedgerResult<()> {
        self.deprovision().await
    }

    async fn done(&self) -> LedgerResult<Vec<String>> {
        self.list_done().await
    }

    async fn add(&self, id: &str) -> LedgerResult<()> {
        Ledger::add(self, id).await
    }

    async fn remove(&self, id: &str) -> LedgerResult<()> {
        Ledger::remove(self, id).await
    }

    async fn start_migration(&self, id: &str) -> LedgerResult<()> {
        Ledger::start_migration(self, id).await
    }

    async fn finish_migration(&self, id: &str) -> LedgerResult<()> {
        Ledger::finish_migration(self, id).await
    }

    async fn lock(&self, cancel: &CancellationToken) -> LedgerResult<LockGuard<S>> {
        self.acquire(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::LedgerError, store::MemoryStore};

    /// Minimal runner loop written only against the trait.
    async fn apply_pending<T: MigrationTarget>(target: &T, ids: &[&str]) -> LedgerResult<Vec<String>> {
        target.create().await?;
        let unlocker = target.lock(&CancellationToken::new()).await?;
        let done = target.done().await?;
        let mut applied = Vec::new();
        for id in ids.iter().filter(|id| !done.iter().any(|d| d == *id)) {
            target.add(id).await?;
            target.finish_migration(id).await?;
            applied.push(id.to_string());
        }
        unlocker.unlock().await?;
        Ok(applied)
    }

    #[tokio::test]
    async fn runner_applies_only_pending_migrations() {
        let ledger = Ledger::new(MemoryStore::new(), []);
        assert_eq!(apply_pending(&ledger, &["001", "002"]).await.unwrap(), ["001", "002"]);
        assert_eq!(apply_pending(&ledger, &["001", "002", "003"]).await.unwrap(), ["003"]);
        assert_eq!(MigrationTarget::current(&ledger).await.unwrap(), "003");
        assert!(!ledger.is_locked().await.unwrap());
    }

    #[tokio::test]
    async fn destroy_then_current_is_a_store_fault() {
        let ledger = Ledger::new(MemoryStore::new(), []);
        ledger.create().await.unwrap();
        ledger.destroy().await.unwrap();
        assert!(matches!(
            MigrationTarget::current(&ledger).await,
            Err(LedgerError::Store { .. })
        ));
    }
}
