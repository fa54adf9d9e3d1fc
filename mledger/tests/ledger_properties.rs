//! Ledger behaviour against the in-memory store.
//!
//! Covers provisioning from every starting state, the add/remove/start/finish
//! transitions and how dirty records block the done-list.

use mledger::{
    KeySchema, KeyValueStore, Ledger, LedgerError, LedgerOption, MemoryStore, MigrationRecord,
};

// ============================================================================
// Test Utilities
// ============================================================================

fn ledger() -> Ledger<MemoryStore> {
    Ledger::new(MemoryStore::new(), [])
}

async fn provisioned() -> Ledger<MemoryStore> {
    let ledger = ledger();
    ledger.provision().await.expect("provision");
    ledger
}

async fn table_names(ledger: &Ledger<MemoryStore>) -> Vec<String> {
    ledger
        .store()
        .list_tables()
        .await
        .expect("list tables")
        .into_iter()
        .collect()
}

// ============================================================================
// Provision / Deprovision
// ============================================================================

#[tokio::test]
async fn provision_creates_both_tables() {
    let ledger = ledger();
    ledger.provision().await.unwrap();
    assert_eq!(table_names(&ledger).await, ["_migrations", "_migrations-lock"]);
}

#[tokio::test]
async fn provision_completes_when_only_ledger_table_exists() {
    let ledger = ledger();
    ledger
        .store()
        .create_table("_migrations", KeySchema::default())
        .await
        .unwrap();
    ledger.provision().await.unwrap();
    assert_eq!(table_names(&ledger).await, ["_migrations", "_migrations-lock"]);
}

#[tokio::test]
async fn provision_completes_when_only_lock_table_exists() {
    let ledger = ledger();
    ledger
        .store()
        .create_table("_migrations-lock", KeySchema::default())
        .await
        .unwrap();
    ledger.provision().await.unwrap();
    assert_eq!(table_names(&ledger).await, ["_migrations", "_migrations-lock"]);
}

#[tokio::test]
async fn provision_twice_succeeds() {
    let ledger = ledger();
    ledger.provision().await.unwrap();
    ledger.provision().await.unwrap();
    assert_eq!(table_names(&ledger).await, ["_migrations", "_migrations-lock"]);
}

#[tokio::test]
async fn provision_keeps_existing_records() {
    let ledger = provisioned().await;
    ledger.add("1").await.unwrap();
    ledger.provision().await.unwrap();
    assert_eq!(ledger.records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn deprovision_removes_both_tables() {
    let ledger = provisioned().await;
    ledger.deprovision().await.unwrap();
    assert!(table_names(&ledger).await.is_empty());
}

#[tokio::test]
async fn deprovision_fails_loudly_when_a_table_is_missing() {
    let ledger = ledger();
    ledger
        .store()
        .create_table("_migrations", KeySchema::default())
        .await
        .unwrap();
    let err = ledger.deprovision().await.unwrap_err();
    assert!(err.to_string().contains("delete migrations lock table"), "{err}");
    // the first deletion is not rolled back
    assert!(table_names(&ledger).await.is_empty());
}

// ============================================================================
// Add / Remove
// ============================================================================

#[tokio::test]
async fn add_twice_reports_already_exists() {
    let ledger = provisioned().await;
    ledger.add("1").await.unwrap();
    let err = ledger.add("1").await.unwrap_err();
    assert!(matches!(err, LedgerError::MigrationAlreadyExists { ref id } if id == "1"));
    assert!(err.is_expected());
    assert_eq!(ledger.records().await.unwrap(), vec![MigrationRecord::started("1")]);
}

#[tokio::test]
async fn add_does_not_reset_a_finished_record() {
    let ledger = provisioned().await;
    ledger.add("1").await.unwrap();
    ledger.finish_migration("1").await.unwrap();
    assert!(ledger.add("1").await.is_err());
    assert_eq!(ledger.list_done().await.unwrap(), ["1"]);
}

#[tokio::test]
async fn remove_on_empty_ledger_is_not_found() {
    let ledger = provisioned().await;
    assert!(matches!(
        ledger.remove("1").await,
        Err(LedgerError::MigrationNotFound { ref id }) if id == "1"
    ));
}

#[tokio::test]
async fn remove_deletes_the_record() {
    let ledger = provisioned().await;
    ledger.add("1").await.unwrap();
    ledger.remove("1").await.unwrap();
    assert!(ledger.records().await.unwrap().is_empty());
}

// ============================================================================
// Start / Finish
// ============================================================================

#[tokio::test]
async fn finish_sets_dirty_false() {
    let ledger = provisioned().await;
    ledger.add("1").await.unwrap();
    ledger.finish_migration("1").await.unwrap();
    assert_eq!(
        ledger.records().await.unwrap(),
        vec![MigrationRecord {
            id: "1".to_string(),
            dirty: false
        }]
    );
}

#[tokio::test]
async fn start_sets_dirty_true_again() {
    let ledger = provisioned().await;
    ledger.add("1").await.unwrap();
    ledger.finish_migration("1").await.unwrap();
    ledger.start_migration("1").await.unwrap();
    assert_eq!(ledger.records().await.unwrap(), vec![MigrationRecord::started("1")]);
}

#[tokio::test]
async fn start_and_finish_on_missing_id_are_not_found() {
    let ledger = provisioned().await;
    assert!(matches!(
        ledger.start_migration("1").await,
        Err(LedgerError::MigrationNotFound { .. })
    ));
    assert!(matches!(
        ledger.finish_migration("1").await,
        Err(LedgerError::MigrationNotFound { .. })
    ));
    // neither call may create a record as a side effect
    assert!(ledger.records().await.unwrap().is_empty());
}

// ============================================================================
// Done / Current
// ============================================================================

#[tokio::test]
async fn list_done_is_sorted_regardless_of_insertion_order() {
    let ledger = provisioned().await;
    for id in ["2", "1"] {
        ledger.add(id).await.unwrap();
        ledger.finish_migration(id).await.unwrap();
    }
    assert_eq!(ledger.list_done().await.unwrap(), ["1", "2"]);
}

#[tokio::test]
async fn list_done_orders_lexicographically() {
    let ledger = provisioned().await;
    for id in ["10", "9", "100"] {
        ledger.add(id).await.unwrap();
        ledger.finish_migration(id).await.unwrap();
    }
    assert_eq!(ledger.list_done().await.unwrap(), ["10", "100", "9"]);
}

#[tokio::test]
async fn dirty_record_blocks_done_and_current() {
    let ledger = provisioned().await;
    ledger.add("1").await.unwrap();
    ledger.finish_migration("1").await.unwrap();
    ledger.add("2").await.unwrap();

    assert!(matches!(ledger.list_done().await, Err(LedgerError::DirtyState)));
    assert!(matches!(ledger.current().await, Err(LedgerError::DirtyState)));

    ledger.finish_migration("2").await.unwrap();
    assert_eq!(ledger.current().await.unwrap(), "2");
}

#[tokio::test]
async fn current_on_empty_ledger_is_no_current_migration() {
    let ledger = provisioned().await;
    assert!(matches!(ledger.current().await, Err(LedgerError::NoCurrentMigration)));
}

#[tokio::test]
async fn current_is_greatest_id_not_latest_added() {
    let ledger = provisioned().await;
    for id in ["2", "1"] {
        ledger.add(id).await.unwrap();
        ledger.finish_migration(id).await.unwrap();
    }
    assert_eq!(ledger.current().await.unwrap(), "2");
}

#[tokio::test]
async fn custom_table_name_isolates_ledgers() {
    let store = MemoryStore::new();
    let app = Ledger::new(store.clone(), [LedgerOption::table_name("app_migrations")]);
    let audit = Ledger::new(store.clone(), [LedgerOption::table_name("audit_migrations")]);
    app.provision().await.unwrap();
    audit.provision().await.unwrap();

    app.add("1").await.unwrap();
    app.finish_migration("1").await.unwrap();

    assert_eq!(app.list_done().await.unwrap(), ["1"]);
    assert!(audit.list_done().await.unwrap().is_empty());
}
