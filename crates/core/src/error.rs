//! Ledger error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the ledger crates.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Kind of entity a lookup failed for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Transaction,
    Opname,
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            EntityKind::Product => "product",
            EntityKind::Transaction => "transaction",
            EntityKind::Opname => "opname",
        })
    }
}

/// Ledger-level error.
///
/// Domain variants are deterministic and returned to the caller verbatim.
/// `ConcurrentModification` and `Storage` are the only retryable ones; storage
/// failures are collapsed into a generic message once the retry budget is spent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Quantity was zero/negative for a movement, or negative for a count.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// An OUT movement (or an edit) would take more than is on hand.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// Reversing a movement would leave the balance negative.
    #[error("reversal would leave stock at {balance}")]
    WouldUnderflow { balance: i64 },

    /// The opname record has already been reconciled into the ledger.
    #[error("opname already adjusted")]
    AlreadyAdjusted,

    /// Adjusted opname records are part of the ledger history.
    #[error("cannot delete an adjusted opname")]
    CannotDeleteAdjusted,

    /// Unknown product, transaction or opname.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A concurrent writer changed the product between read and commit.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Malformed input that is not a quantity problem.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage failure after retries were exhausted.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::ConcurrentModification(_) | LedgerError::Storage(_)
        )
    }

    /// Stable machine-readable code, used by the HTTP layer and in logs.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidQuantity(_) => "invalid_quantity",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::WouldUnderflow { .. } => "would_underflow",
            LedgerError::AlreadyAdjusted => "already_adjusted",
            LedgerError::CannotDeleteAdjusted => "cannot_delete_adjusted",
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::ConcurrentModification(_) => "concurrent_modification",
            LedgerError::Validation(_) => "validation_error",
            LedgerError::Storage(_) => "storage_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(LedgerError::ConcurrentModification("x".into()).is_retryable());
        assert!(LedgerError::Storage("down".into()).is_retryable());
        assert!(!LedgerError::InvalidQuantity(0).is_retryable());
        assert!(
            !LedgerError::InsufficientStock {
                requested: 5,
                available: 2
            }
            .is_retryable()
        );
        assert!(!LedgerError::AlreadyAdjusted.is_retryable());
    }

    #[test]
    fn not_found_message_names_the_entity() {
        let err = LedgerError::not_found(EntityKind::Transaction, 17u64);
        assert_eq!(err.to_string(), "transaction not found: 17");
        assert_eq!(err.code(), "not_found");
    }
}
