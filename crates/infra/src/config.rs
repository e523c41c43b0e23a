//! Ledger tuning knobs.

use serde::{Deserialize, Serialize};

/// Retry budget for mutating operations.
///
/// Domain errors are never retried; these only bound how often a mutation is
/// re-decided after a transient store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Re-reads after a lost optimistic-concurrency race before surfacing
    /// `ConcurrentModification`.
    pub conflict_retries: u32,
    /// Re-attempts after `StoreError::Unavailable` before surfacing `Storage`.
    pub storage_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 1,
            storage_retries: 0,
        }
    }
}
