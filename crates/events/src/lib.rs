//! Ledger audit events and the pub/sub mechanics that carry them.
//!
//! The ledger notifies an optional audit sink after each committed change.
//! Nothing in the ledger depends on a subscriber being present.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
