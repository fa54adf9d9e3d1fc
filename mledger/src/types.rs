use serde::{Deserialize, Serialize};

/// One row of the ledger table.
///
/// `dirty` is set while a migration is being applied and cleared once it is
/// confirmed; a record left dirty means a runner stopped half-way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: String,
    pub dirty: bool,
}

impl MigrationRecord {
    pub fn started(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dirty: true,
        }
    }
}

/// The lock item. Its presence in the lock table is the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub id: String,
}

/// Name of the key attribute of both tables.
pub const KEY_ATTRIBUTE: &str = "id";
/// Attribute toggled by start/finish.
pub const DIRTY_ATTRIBUTE: &str = "dirty";
