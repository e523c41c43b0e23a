use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, LedgerError, LedgerResult, OpnameId, ProductId, TransactionId};

/// Kind of stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    /// Receipt: quantity is added to the balance.
    In,
    /// Issue: quantity is removed from the balance.
    Out,
    /// Physical-count correction: quantity is the absolute target balance.
    Adjust,
}

/// Outcome of folding one transaction over a running balance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub qty_in: i64,
    pub qty_out: i64,
    pub balance: i64,
}

impl TransactionKind {
    /// Fold rule shared by every consumer of the ledger.
    ///
    /// ADJUST assigns rather than accumulates: the reported in/out is whatever
    /// difference it took to reach the target from the balance at that point.
    /// A balance that would leave the `i64` range is an invalid quantity.
    pub fn step(self, balance: i64, quantity: i64) -> LedgerResult<Step> {
        let overflow = || LedgerError::InvalidQuantity(quantity);
        let step = match self {
            TransactionKind::In => Step {
                qty_in: quantity,
                qty_out: 0,
                balance: balance.checked_add(quantity).ok_or_else(overflow)?,
            },
            TransactionKind::Out => Step {
                qty_in: 0,
                qty_out: quantity,
                balance: balance.checked_sub(quantity).ok_or_else(overflow)?,
            },
            TransactionKind::Adjust if quantity >= balance => Step {
                qty_in: quantity.checked_sub(balance).ok_or_else(overflow)?,
                qty_out: 0,
                balance: quantity,
            },
            TransactionKind::Adjust => Step {
                qty_in: 0,
                qty_out: balance.checked_sub(quantity).ok_or_else(overflow)?,
                balance: quantity,
            },
        };
        Ok(step)
    }

    /// Quantity rule for a new or rewritten transaction of this kind.
    ///
    /// IN/OUT move a strictly positive amount; ADJUST targets a non-negative
    /// balance (counting zero items on the shelf is legitimate).
    pub fn validate_quantity(self, quantity: i64) -> LedgerResult<()> {
        let ok = match self {
            TransactionKind::In | TransactionKind::Out => quantity > 0,
            TransactionKind::Adjust => quantity >= 0,
        };
        if ok {
            Ok(())
        } else {
            Err(LedgerError::InvalidQuantity(quantity))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::In => "IN",
            TransactionKind::Out => "OUT",
            TransactionKind::Adjust => "ADJUST",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(TransactionKind::In),
            "OUT" => Ok(TransactionKind::Out),
            "ADJUST" => Ok(TransactionKind::Adjust),
            other => Err(LedgerError::validation(format!(
                "unknown transaction kind '{other}' (expected IN, OUT or ADJUST)"
            ))),
        }
    }
}

/// Caller-supplied context for a movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementMetadata {
    pub note: String,
    pub responsible: Option<String>,
    /// Business time of the movement. `None` means "now".
    pub occurred_at: Option<DateTime<Utc>>,
}

impl MovementMetadata {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            ..Self::default()
        }
    }

    pub fn with_responsible(mut self, responsible: impl Into<String>) -> Self {
        self.responsible = Some(responsible.into());
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

/// A transaction ready to be appended (not yet assigned an id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub product_id: ProductId,
    pub kind: TransactionKind,
    pub quantity: i64,
    pub note: String,
    pub responsible: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub opname_id: Option<OpnameId>,
}

impl NewTransaction {
    pub fn new(
        product_id: ProductId,
        kind: TransactionKind,
        quantity: i64,
        metadata: MovementMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            kind,
            quantity,
            note: metadata.note,
            responsible: metadata.responsible.filter(|r| !r.trim().is_empty()),
            occurred_at: metadata.occurred_at.unwrap_or(now),
            opname_id: None,
        }
    }

    pub fn from_opname(mut self, opname_id: OpnameId) -> Self {
        self.opname_id = Some(opname_id);
        self
    }

    /// Materialize with a store-assigned id.
    pub fn into_stored(self, id: TransactionId) -> StockTransaction {
        StockTransaction {
            id,
            product_id: self.product_id,
            kind: self.kind,
            quantity: self.quantity,
            note: self.note,
            responsible: self.responsible,
            occurred_at: self.occurred_at,
            opname_id: self.opname_id,
        }
    }
}

/// A committed ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub kind: TransactionKind,
    /// Moved amount for IN/OUT, target balance for ADJUST.
    pub quantity: i64,
    pub note: String,
    pub responsible: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Set on ADJUST rows produced by an opname commit.
    pub opname_id: Option<OpnameId>,
}

impl StockTransaction {
    /// Replay order: business time, then insertion order.
    pub fn ordering_key(&self) -> (DateTime<Utc>, TransactionId) {
        (self.occurred_at, self.id)
    }

    pub fn step(&self, balance: i64) -> LedgerResult<Step> {
        self.kind.step(balance, self.quantity)
    }

    /// Rewrite kind/quantity/note in place, keeping identity and business time.
    pub fn rewritten(&self, kind: TransactionKind, quantity: i64, metadata: MovementMetadata) -> Self {
        Self {
            id: self.id,
            product_id: self.product_id,
            kind,
            quantity,
            note: metadata.note,
            responsible: metadata.responsible.or_else(|| self.responsible.clone()),
            occurred_at: metadata.occurred_at.unwrap_or(self.occurred_at),
            opname_id: self.opname_id,
        }
    }
}

impl Entity for StockTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
