pub mod ledger;
pub mod lock;
pub mod tables;
