//! Stock ledger domain module.
//!
//! This crate contains the business rules of the ledger, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): products and their
//! balance, stock transactions and their fold rule, the replay engine that turns
//! a transaction history into a stock card, and the opname (physical count)
//! state machine.

pub mod event;
pub mod opname;
pub mod product;
pub mod replay;
pub mod transaction;

pub use event::LedgerEvent;
pub use opname::{NewOpname, OpnameStatus, StockOpname};
pub use product::{NewProduct, Product, ProductStatus};
pub use replay::{DateWindow, StockCard, StockCardRow, closing_balance, stock_card};
pub use transaction::{MovementMetadata, NewTransaction, Step, StockTransaction, TransactionKind};
