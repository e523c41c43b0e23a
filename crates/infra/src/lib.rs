//! Infrastructure layer: ledger storage, the stock mutator, the opname
//! workflow and the read-side queries built on top of them.

pub mod config;
pub mod mutator;
pub mod reconciliation;
pub mod stock_card;
pub mod store;

mod retry;

#[cfg(test)]
mod integration_tests;

pub use config::LedgerConfig;
pub use mutator::{MovementReceipt, StockMutator, OPENING_STOCK_NOTE};
pub use reconciliation::{OpnameOutcome, OpnameWorkflow};
pub use stock_card::{BalanceCheck, ProductStockCard, StockCardService};
pub use store::{InMemoryLedgerStore, LedgerStore, StoreError};
