//! Bounded retry loop shared by every mutating operation.

use stockledger_core::LedgerError;

use crate::config::LedgerConfig;
use crate::store::StoreError;

/// Failure of a single attempt: either a final ledger verdict or a store error
/// that may be worth another attempt.
#[derive(Debug)]
pub(crate) enum AttemptError {
    Ledger(LedgerError),
    Store(StoreError),
}

impl From<LedgerError> for AttemptError {
    fn from(value: LedgerError) -> Self {
        AttemptError::Ledger(value)
    }
}

impl From<StoreError> for AttemptError {
    fn from(value: StoreError) -> Self {
        AttemptError::Store(value)
    }
}

pub(crate) type AttemptResult<T> = Result<T, AttemptError>;

/// Run `attempt` until it succeeds, fails with a ledger error, or exhausts the
/// budget for its class of store failure.
///
/// Every attempt must re-read what it decides on: a retry after a conflict is
/// a fresh decision, not a replay of the old one.
pub(crate) fn retrying<T>(
    config: &LedgerConfig,
    operation: &'static str,
    mut attempt: impl FnMut() -> AttemptResult<T>,
) -> Result<T, LedgerError> {
    let mut conflicts = 0u32;
    let mut outages = 0u32;

    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(AttemptError::Ledger(err)) => return Err(err),
            Err(AttemptError::Store(StoreError::Conflict(msg))) => {
                if conflicts >= config.conflict_retries {
                    tracing::warn!(operation, attempts = conflicts + 1, %msg, "giving up after conflicts");
                    return Err(LedgerError::ConcurrentModification(msg));
                }
                conflicts += 1;
                tracing::debug!(operation, attempt = conflicts, %msg, "conflict; re-reading and retrying");
            }
            Err(AttemptError::Store(StoreError::Unavailable(msg))) => {
                if outages >= config.storage_retries {
                    tracing::error!(operation, attempts = outages + 1, %msg, "store unavailable");
                    return Err(LedgerError::Storage(msg));
                }
                outages += 1;
                tracing::warn!(operation, attempt = outages, %msg, "store unavailable; retrying");
            }
            Err(AttemptError::Store(other)) => return Err(other.into()),
        }
    }
}
