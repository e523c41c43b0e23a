//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the ledger error taxonomy and the versioning contract used for
//! optimistic concurrency.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, Entity, ExpectedVersion};
pub use error::{EntityKind, LedgerError, LedgerResult};
pub use id::{OpnameId, ProductId, TransactionId};
