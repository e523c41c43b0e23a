use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{OpnameId, ProductId, TransactionId};
use stockledger_events::Event;

use crate::transaction::TransactionKind;

/// Audit notifications emitted after a ledger change is committed.
///
/// `occurred_at` is the commit instant, not the business time of the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    MovementRecorded {
        product_id: ProductId,
        transaction_id: TransactionId,
        kind: TransactionKind,
        quantity: i64,
        balance_after: i64,
        occurred_at: DateTime<Utc>,
    },
    /// Retroactive edit: every later running balance may have changed.
    MovementEdited {
        product_id: ProductId,
        transaction_id: TransactionId,
        old_kind: TransactionKind,
        old_quantity: i64,
        new_kind: TransactionKind,
        new_quantity: i64,
        balance_after: i64,
        occurred_at: DateTime<Utc>,
    },
    MovementDeleted {
        product_id: ProductId,
        transaction_id: TransactionId,
        kind: TransactionKind,
        quantity: i64,
        balance_after: i64,
        occurred_at: DateTime<Utc>,
    },
    OpnameRecorded {
        product_id: ProductId,
        opname_id: OpnameId,
        system_stock: i64,
        physical_stock: i64,
        difference: i64,
        occurred_at: DateTime<Utc>,
    },
    OpnameAdjusted {
        product_id: ProductId,
        opname_id: OpnameId,
        transaction_id: TransactionId,
        balance_after: i64,
        occurred_at: DateTime<Utc>,
    },
    OpnameDeleted {
        product_id: ProductId,
        opname_id: OpnameId,
        occurred_at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            LedgerEvent::MovementRecorded { product_id, .. }
            | LedgerEvent::MovementEdited { product_id, .. }
            | LedgerEvent::MovementDeleted { product_id, .. }
            | LedgerEvent::OpnameRecorded { product_id, .. }
            | LedgerEvent::OpnameAdjusted { product_id, .. }
            | LedgerEvent::OpnameDeleted { product_id, .. } => *product_id,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::MovementRecorded { .. } => "ledger.movement.recorded",
            LedgerEvent::MovementEdited { .. } => "ledger.movement.edited",
            LedgerEvent::MovementDeleted { .. } => "ledger.movement.deleted",
            LedgerEvent::OpnameRecorded { .. } => "ledger.opname.recorded",
            LedgerEvent::OpnameAdjusted { .. } => "ledger.opname.adjusted",
            LedgerEvent::OpnameDeleted { .. } => "ledger.opname.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::MovementRecorded { occurred_at, .. }
            | LedgerEvent::MovementEdited { occurred_at, .. }
            | LedgerEvent::MovementDeleted { occurred_at, .. }
            | LedgerEvent::OpnameRecorded { occurred_at, .. }
            | LedgerEvent::OpnameAdjusted { occurred_at, .. }
            | LedgerEvent::OpnameDeleted { occurred_at, .. } => *occurred_at,
        }
    }
}
