use std::borrow::Cow;

use thiserror::Error;

/// Errors raised by a [`KeyValueStore`](crate::store::KeyValueStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The precondition attached to a conditional write did not hold.
    #[error("conditional check failed")]
    ConditionFailed,

    /// The addressed table has not been created.
    #[error("table '{table}' does not exist")]
    TableNotFound { table: String },

    /// A table with this name is already registered.
    #[error("table '{table}' already exists")]
    TableAlreadyExists { table: String },

    /// An item was written without the table's key attribute (or with a non-string key).
    #[error("item for table '{table}' is missing string key attribute '{attribute}'")]
    MissingKey { table: String, attribute: String },

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Item payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A server-side script replied with something we do not understand.
    #[error("unexpected script reply: {message}")]
    Script { message: Cow<'static, str> },
}

/// Top-level error type returned by the ledger and the lock.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger holds no finished migration.
    #[error("no current migration")]
    NoCurrentMigration,

    /// At least one migration was started and never confirmed finished.
    #[error("dirty migration found: the ledger needs operator intervention")]
    DirtyState,

    /// `add` hit an id that is already recorded.
    #[error("migration '{id}' already exists")]
    MigrationAlreadyExists { id: String },

    /// The addressed migration is not recorded.
    #[error("migration '{id}' not found")]
    MigrationNotFound { id: String },

    /// The caller cancelled a pending lock acquisition.
    #[error("lock acquisition cancelled")]
    Cancelled,

    /// A stored item does not match the expected record layout.
    #[error("failed to decode item from table '{table}': {source}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    /// Any other backend fault, tagged with the operation that failed.
    #[error("failed to {operation}: {source}")]
    Store {
        operation: Cow<'static, str>,
        #[source]
        source: StoreError,
    },
}

impl LedgerError {
    pub(crate) fn store(operation: impl Into<Cow<'static, str>>, source: StoreError) -> Self {
        Self::Store {
            operation: operation.into(),
            source,
        }
    }

    /// True for the state errors an orchestrator is expected to branch on,
    /// false for backend faults and decode failures.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::NoCurrentMigration
                | Self::DirtyState
                | Self::MigrationAlreadyExists { .. }
                | Self::MigrationNotFound { .. }
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
