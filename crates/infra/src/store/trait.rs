use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockledger_core::{
    EntityKind, ExpectedVersion, LedgerError, OpnameId, ProductId, TransactionId,
};
use stockledger_ledger::{NewOpname, NewTransaction, Product, StockOpname, StockTransaction};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer error.
///
/// These are infrastructure failures as opposed to ledger rules. `Conflict`
/// and `Unavailable` are transient; callers may re-read and retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The row changed since it was read (version or status mismatch).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A unique business key is already taken.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The mutation itself is malformed (e.g. a negative balance).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Backend is unavailable (connection loss, poisoned lock, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => LedgerError::ConcurrentModification(msg),
            StoreError::NotFound { kind, id } => LedgerError::NotFound { kind, id },
            StoreError::Duplicate(msg) => LedgerError::Validation(msg),
            StoreError::Rejected(msg) => LedgerError::Storage(msg),
            StoreError::Unavailable(msg) => LedgerError::Storage(msg),
        }
    }
}

/// Product row and its full history, observed atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub product: Product,
    /// Replay order: `occurred_at`, then id.
    pub transactions: Vec<StockTransaction>,
}

/// The one ledger row a mutation touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    Append(NewTransaction),
    Rewrite(StockTransaction),
    Delete(TransactionId),
}

/// A balance write plus the ledger change that justifies it.
///
/// Applied as one unit: the balance, the row and (optionally) the opname
/// status are never observed out of step with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMutation {
    pub product_id: ProductId,
    pub expected_version: ExpectedVersion,
    pub new_balance: i64,
    pub change: LedgerChange,
    /// Flip this opname NotAdjusted -> Adjusted in the same unit.
    pub settles_opname: Option<OpnameId>,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub product: Product,
    /// Appended, rewritten or removed row.
    pub transaction: StockTransaction,
}

/// Durable ledger storage.
///
/// Implementations must:
/// - serialize commits per product and let different products proceed independently
/// - reject a commit whose `expected_version` no longer matches (`Conflict`)
/// - assign transaction and opname ids from monotonically increasing sequences
/// - return transactions in replay order
pub trait LedgerStore: Send + Sync {
    /// Insert a catalog product, optionally with its opening-stock row.
    ///
    /// The product's balance must already reflect `opening`.
    fn insert_product(
        &self,
        product: Product,
        opening: Option<NewTransaction>,
    ) -> StoreResult<(Product, Option<StockTransaction>)>;

    fn get_product(&self, product_id: ProductId) -> StoreResult<Option<Product>>;

    fn find_product_by_code(&self, code: &str) -> StoreResult<Option<Product>>;

    /// All products, ordered by code.
    fn list_products(&self) -> StoreResult<Vec<Product>>;

    fn load_ledger(&self, product_id: ProductId) -> StoreResult<Option<LedgerSnapshot>>;

    fn list_transactions(&self, product_id: ProductId) -> StoreResult<Vec<StockTransaction>>;

    fn get_transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<StockTransaction>>;

    /// Apply a mutation atomically.
    fn commit(&self, mutation: StockMutation) -> StoreResult<CommitOutcome>;

    /// Create an opname record against `system_stock`, provided the product is
    /// still at `expected_version` (so the snapshot is the balance of record).
    fn insert_opname(
        &self,
        opname: NewOpname,
        system_stock: i64,
        expected_version: ExpectedVersion,
        created_at: DateTime<Utc>,
    ) -> StoreResult<StockOpname>;

    fn get_opname(&self, opname_id: OpnameId) -> StoreResult<Option<StockOpname>>;

    /// Opname records of a product, ordered by count date then id.
    fn list_opnames(&self, product_id: ProductId) -> StoreResult<Vec<StockOpname>>;

    /// Remove an opname that is still NotAdjusted (`Conflict` otherwise).
    fn delete_opname(&self, opname_id: OpnameId) -> StoreResult<StockOpname>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn insert_product(
        &self,
        product: Product,
        opening: Option<NewTransaction>,
    ) -> StoreResult<(Product, Option<StockTransaction>)> {
        (**self).insert_product(product, opening)
    }

    fn get_product(&self, product_id: ProductId) -> StoreResult<Option<Product>> {
        (**self).get_product(product_id)
    }

    fn find_product_by_code(&self, code: &str) -> StoreResult<Option<Product>> {
        (**self).find_product_by_code(code)
    }

    fn list_products(&self) -> StoreResult<Vec<Product>> {
        (**self).list_products()
    }

    fn load_ledger(&self, product_id: ProductId) -> StoreResult<Option<LedgerSnapshot>> {
        (**self).load_ledger(product_id)
    }

    fn list_transactions(&self, product_id: ProductId) -> StoreResult<Vec<StockTransaction>> {
        (**self).list_transactions(product_id)
    }

    fn get_transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<StockTransaction>> {
        (**self).get_transaction(transaction_id)
    }

    fn commit(&self, mutation: StockMutation) -> StoreResult<CommitOutcome> {
        (**self).commit(mutation)
    }

    fn insert_opname(
        &self,
        opname: NewOpname,
        system_stock: i64,
        expected_version: ExpectedVersion,
        created_at: DateTime<Utc>,
    ) -> StoreResult<StockOpname> {
        (**self).insert_opname(opname, system_stock, expected_version, created_at)
    }

    fn get_opname(&self, opname_id: OpnameId) -> StoreResult<Option<StockOpname>> {
        (**self).get_opname(opname_id)
    }

    fn list_opnames(&self, product_id: ProductId) -> StoreResult<Vec<StockOpname>> {
        (**self).list_opnames(product_id)
    }

    fn delete_opname(&self, opname_id: OpnameId) -> StoreResult<StockOpname> {
        (**self).delete_opname(opname_id)
    }
}
