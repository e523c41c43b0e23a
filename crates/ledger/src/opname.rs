use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, LedgerError, LedgerResult, OpnameId, ProductId, TransactionId};

/// Reconciliation status of an opname record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpnameStatus {
    NotAdjusted,
    /// Terminal: the count has been written to the ledger as an ADJUST row.
    Adjusted,
}

impl core::str::FromStr for OpnameStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_adjusted" => Ok(OpnameStatus::NotAdjusted),
            "adjusted" => Ok(OpnameStatus::Adjusted),
            other => Err(LedgerError::validation(format!(
                "unknown opname status '{other}'"
            ))),
        }
    }
}

/// Operator input for a physical count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOpname {
    pub product_id: ProductId,
    pub count_date: NaiveDate,
    pub physical_stock: i64,
    pub petugas: String,
    #[serde(default)]
    pub note: String,
}

impl NewOpname {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.physical_stock < 0 {
            return Err(LedgerError::InvalidQuantity(self.physical_stock));
        }
        if self.petugas.trim().is_empty() {
            return Err(LedgerError::validation("petugas cannot be empty"));
        }
        Ok(())
    }
}

/// A physical count compared against the system balance at count time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOpname {
    pub id: OpnameId,
    pub product_id: ProductId,
    pub count_date: NaiveDate,
    /// Snapshot of the product balance when the record was created.
    pub system_stock: i64,
    pub physical_stock: i64,
    /// `physical_stock - system_stock`.
    pub difference: i64,
    pub status: OpnameStatus,
    pub petugas: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
    /// The ADJUST row this record produced, once adjusted.
    pub adjustment_tx: Option<TransactionId>,
}

impl StockOpname {
    /// Open a record against the balance observed right now.
    pub fn open(
        id: OpnameId,
        new: NewOpname,
        system_stock: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id: new.product_id,
            count_date: new.count_date,
            system_stock,
            physical_stock: new.physical_stock,
            difference: new.physical_stock - system_stock,
            status: OpnameStatus::NotAdjusted,
            petugas: new.petugas.trim().to_string(),
            note: new.note,
            created_at,
            adjustment_tx: None,
        }
    }

    pub fn is_adjusted(&self) -> bool {
        self.status == OpnameStatus::Adjusted
    }

    pub fn ensure_can_commit(&self) -> LedgerResult<()> {
        if self.is_adjusted() {
            return Err(LedgerError::AlreadyAdjusted);
        }
        Ok(())
    }

    pub fn ensure_can_delete(&self) -> LedgerResult<()> {
        if self.is_adjusted() {
            return Err(LedgerError::CannotDeleteAdjusted);
        }
        Ok(())
    }

    /// NotAdjusted -> Adjusted, exactly once.
    pub fn mark_adjusted(&mut self, transaction_id: TransactionId) -> LedgerResult<()> {
        self.ensure_can_commit()?;
        self.status = OpnameStatus::Adjusted;
        self.adjustment_tx = Some(transaction_id);
        Ok(())
    }

    /// Note written on the ADJUST row.
    pub fn adjustment_note(&self) -> String {
        let head = format!("Stock opname {}", self.count_date);
        if self.note.trim().is_empty() {
            head
        } else {
            format!("{head}: {}", self.note.trim())
        }
    }
}

impl Entity for StockOpname {
    type Id = OpnameId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
