//! Transaction store boundary.
//!
//! The store persists product rows, ledger rows and opname rows. It performs no
//! business validation beyond the concurrency checks that make a mutation
//! atomic: a commit either applies completely or not at all.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{
    CommitOutcome, LedgerChange, LedgerSnapshot, LedgerStore, StockMutation, StoreError,
    StoreResult,
};
