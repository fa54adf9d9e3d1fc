//! Migration ledger and advisory lock over a key-value store with conditional writes.
//!
//! [`Ledger`] records which migrations were applied (with a dirty flag that
//! exposes runs interrupted half-way) and serialises runners through a polling
//! lock on a single key. Both rest only on single-item writes guarded by
//! "key exists" / "key absent" preconditions, so any [`KeyValueStore`] that can
//! evaluate those atomically can back them. [`RedisStore`] and [`MemoryStore`]
//! are provided.

pub mod config;
pub mod errors;
pub mod ledger;
pub mod lock;
pub mod store;
pub mod target;
pub mod types;

pub use config::{LedgerConfig, LedgerOption};
pub use errors::*;
pub use ledger::Ledger;
pub use lock::LockGuard;
pub use store::{Condition, Item, KeySchema, KeyValueStore, MemoryStore, RedisStore};
pub use target::{MigrationTarget, Unlocker};
pub use types::{LockRecord, MigrationRecord};

// Re-export so callers do not need to pin matching versions themselves
pub use redis;
pub use redis::aio::ConnectionManager;
pub use tokio_util::sync::CancellationToken;
