use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use stockledger_core::{
    AggregateRoot, EntityKind, ExpectedVersion, OpnameId, ProductId, TransactionId,
};
use stockledger_ledger::{
    NewOpname, NewTransaction, Product, StockOpname, StockTransaction,
};

use super::r#trait::{
    CommitOutcome, LedgerChange, LedgerSnapshot, LedgerStore, StockMutation, StoreError,
    StoreResult,
};

/// Everything the store knows about one product, guarded by one mutex.
#[derive(Debug)]
struct ProductLedger {
    product: Product,
    /// Kept in replay order.
    transactions: Vec<StockTransaction>,
    opnames: BTreeMap<OpnameId, StockOpname>,
}

impl ProductLedger {
    fn position(&self, transaction_id: TransactionId) -> Option<usize> {
        self.transactions.iter().position(|t| t.id == transaction_id)
    }

    fn insert_ordered(&mut self, tx: StockTransaction) {
        let key = tx.ordering_key();
        let idx = self.transactions.partition_point(|t| t.ordering_key() <= key);
        self.transactions.insert(idx, tx);
    }
}

/// In-memory ledger store.
///
/// One mutex per product: commits on the same product serialize, commits on
/// different products never wait for each other. The id indexes are only held
/// for the duration of a lookup or insert.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledgers: RwLock<HashMap<ProductId, Arc<Mutex<ProductLedger>>>>,
    codes: RwLock<HashMap<String, ProductId>>,
    transaction_owner: RwLock<HashMap<TransactionId, ProductId>>,
    opname_owner: RwLock<HashMap<OpnameId, ProductId>>,
    next_transaction: AtomicU64,
    next_opname: AtomicU64,
}

/// What a commit does to the transaction id index.
enum OwnerUpdate {
    Insert,
    Remove,
    Keep,
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self, product_id: ProductId) -> StoreResult<Option<Arc<Mutex<ProductLedger>>>> {
        let ledgers = self.ledgers.read().map_err(|_| poisoned())?;
        Ok(ledgers.get(&product_id).cloned())
    }

    fn require_ledger(&self, product_id: ProductId) -> StoreResult<Arc<Mutex<ProductLedger>>> {
        self.ledger(product_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Product, product_id))
    }

    fn transaction_owner(&self, transaction_id: TransactionId) -> StoreResult<Option<ProductId>> {
        let owners = self.transaction_owner.read().map_err(|_| poisoned())?;
        Ok(owners.get(&transaction_id).copied())
    }

    fn opname_owner(&self, opname_id: OpnameId) -> StoreResult<Option<ProductId>> {
        let owners = self.opname_owner.read().map_err(|_| poisoned())?;
        Ok(owners.get(&opname_id).copied())
    }

    fn next_transaction_id(&self) -> TransactionId {
        TransactionId::new(self.next_transaction.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_opname_id(&self) -> OpnameId {
        OpnameId::new(self.next_opname.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert_product(
        &self,
        product: Product,
        opening: Option<NewTransaction>,
    ) -> StoreResult<(Product, Option<StockTransaction>)> {
        let product_id = product.id_typed();

        let mut codes = self.codes.write().map_err(|_| poisoned())?;
        let mut ledgers = self.ledgers.write().map_err(|_| poisoned())?;
        let mut owners = self.transaction_owner.write().map_err(|_| poisoned())?;

        if codes.contains_key(product.code()) {
            return Err(StoreError::Duplicate(format!(
                "product code '{}' is already registered",
                product.code()
            )));
        }
        if ledgers.contains_key(&product_id) {
            return Err(StoreError::Duplicate(format!("product {product_id} already exists")));
        }

        let mut ledger = ProductLedger {
            product: product.clone(),
            transactions: Vec::new(),
            opnames: BTreeMap::new(),
        };

        let opening = match opening {
            Some(new) if new.product_id != product_id => {
                return Err(StoreError::Rejected(
                    "opening transaction belongs to another product".to_string(),
                ));
            }
            Some(new) => {
                let stored = new.into_stored(self.next_transaction_id());
                owners.insert(stored.id, product_id);
                ledger.insert_ordered(stored.clone());
                Some(stored)
            }
            None => None,
        };

        codes.insert(product.code().to_string(), product_id);
        ledgers.insert(product_id, Arc::new(Mutex::new(ledger)));

        Ok((product, opening))
    }

    fn get_product(&self, product_id: ProductId) -> StoreResult<Option<Product>> {
        match self.ledger(product_id)? {
            Some(ledger) => {
                let guard = ledger.lock().map_err(|_| poisoned())?;
                Ok(Some(guard.product.clone()))
            }
            None => Ok(None),
        }
    }

    fn find_product_by_code(&self, code: &str) -> StoreResult<Option<Product>> {
        let product_id = {
            let codes = self.codes.read().map_err(|_| poisoned())?;
            codes.get(code.trim()).copied()
        };
        match product_id {
            Some(id) => self.get_product(id),
            None => Ok(None),
        }
    }

    fn list_products(&self) -> StoreResult<Vec<Product>> {
        let ledgers: Vec<_> = {
            let map = self.ledgers.read().map_err(|_| poisoned())?;
            map.values().cloned().collect()
        };

        let mut products = Vec::with_capacity(ledgers.len());
        for ledger in ledgers {
            let guard = ledger.lock().map_err(|_| poisoned())?;
            products.push(guard.product.clone());
        }
        products.sort_by(|a, b| a.code().cmp(b.code()));
        Ok(products)
    }

    fn load_ledger(&self, product_id: ProductId) -> StoreResult<Option<LedgerSnapshot>> {
        match self.ledger(product_id)? {
            Some(ledger) => {
                let guard = ledger.lock().map_err(|_| poisoned())?;
                Ok(Some(LedgerSnapshot {
                    product: guard.product.clone(),
                    transactions: guard.transactions.clone(),
                }))
            }
            None => Ok(None),
        }
    }

    fn list_transactions(&self, product_id: ProductId) -> StoreResult<Vec<StockTransaction>> {
        let ledger = self.require_ledger(product_id)?;
        let guard = ledger.lock().map_err(|_| poisoned())?;
        Ok(guard.transactions.clone())
    }

    fn get_transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<StockTransaction>> {
        let Some(product_id) = self.transaction_owner(transaction_id)? else {
            return Ok(None);
        };
        let Some(ledger) = self.ledger(product_id)? else {
            return Ok(None);
        };
        let guard = ledger.lock().map_err(|_| poisoned())?;
        Ok(guard.transactions.iter().find(|t| t.id == transaction_id).cloned())
    }

    fn commit(&self, mutation: StockMutation) -> StoreResult<CommitOutcome> {
        let ledger = self.require_ledger(mutation.product_id)?;
        let mut guard = ledger.lock().map_err(|_| poisoned())?;

        // 1) Checks (nothing is written until all of them pass)
        mutation
            .expected_version
            .check(guard.product.version())
            .map_err(|e| StoreError::Conflict(format!("product {}: {e}", mutation.product_id)))?;

        let mut product = guard.product.clone();
        product
            .set_balance(mutation.new_balance)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;

        // 2) Apply (each arm validates its row before touching anything)
        let (transaction, settled, owner_update) = match mutation.change {
            LedgerChange::Append(new) => {
                if new.product_id != mutation.product_id {
                    return Err(StoreError::Rejected(
                        "transaction belongs to another product".to_string(),
                    ));
                }
                let mut settled = match mutation.settles_opname {
                    Some(opname_id) => Some(
                        guard
                            .opnames
                            .get(&opname_id)
                            .cloned()
                            .ok_or_else(|| StoreError::not_found(EntityKind::Opname, opname_id))?,
                    ),
                    None => None,
                };
                if let Some(opname) = &settled {
                    opname
                        .ensure_can_commit()
                        .map_err(|e| StoreError::Conflict(format!("opname {}: {e}", opname.id)))?;
                }

                let stored = new.into_stored(self.next_transaction_id());
                if let Some(opname) = settled.as_mut() {
                    opname
                        .mark_adjusted(stored.id)
                        .map_err(|e| StoreError::Conflict(format!("opname {}: {e}", opname.id)))?;
                }
                guard.insert_ordered(stored.clone());
                (stored, settled, OwnerUpdate::Insert)
            }
            _ if mutation.settles_opname.is_some() => {
                return Err(StoreError::Rejected(
                    "an opname can only be settled by appending its adjustment".to_string(),
                ));
            }
            LedgerChange::Rewrite(tx) => {
                let pos = guard.position(tx.id).ok_or_else(|| {
                    StoreError::Conflict(format!("transaction {} no longer exists", tx.id))
                })?;
                guard.transactions.remove(pos);
                guard.insert_ordered(tx.clone());
                (tx, None, OwnerUpdate::Keep)
            }
            LedgerChange::Delete(id) => {
                let pos = guard.position(id).ok_or_else(|| {
                    StoreError::Conflict(format!("transaction {id} no longer exists"))
                })?;
                (guard.transactions.remove(pos), None, OwnerUpdate::Remove)
            }
        };

        if let Some(opname) = settled {
            guard.opnames.insert(opname.id, opname);
        }
        guard.product = product.clone();
        drop(guard);

        // 3) Id index, after the product lock is released. The commit has
        // already happened, so a poisoned index is recovered rather than
        // reported as a failed write.
        let owners = || {
            self.transaction_owner
                .write()
                .unwrap_or_else(PoisonError::into_inner)
        };
        match owner_update {
            OwnerUpdate::Insert => {
                owners().insert(transaction.id, mutation.product_id);
            }
            OwnerUpdate::Remove => {
                owners().remove(&transaction.id);
            }
            OwnerUpdate::Keep => {}
        }

        Ok(CommitOutcome {
            product,
            transaction,
        })
    }

    fn insert_opname(
        &self,
        opname: NewOpname,
        system_stock: i64,
        expected_version: ExpectedVersion,
        created_at: DateTime<Utc>,
    ) -> StoreResult<StockOpname> {
        let product_id = opname.product_id;
        let ledger = self.require_ledger(product_id)?;
        let mut guard = ledger.lock().map_err(|_| poisoned())?;

        expected_version
            .check(guard.product.version())
            .map_err(|e| StoreError::Conflict(format!("product {product_id}: {e}")))?;

        let record = StockOpname::open(self.next_opname_id(), opname, system_stock, created_at);
        guard.opnames.insert(record.id, record.clone());
        drop(guard);

        self.opname_owner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id, product_id);
        Ok(record)
    }

    fn get_opname(&self, opname_id: OpnameId) -> StoreResult<Option<StockOpname>> {
        let Some(product_id) = self.opname_owner(opname_id)? else {
            return Ok(None);
        };
        let Some(ledger) = self.ledger(product_id)? else {
            return Ok(None);
        };
        let guard = ledger.lock().map_err(|_| poisoned())?;
        Ok(guard.opnames.get(&opname_id).cloned())
    }

    fn list_opnames(&self, product_id: ProductId) -> StoreResult<Vec<StockOpname>> {
        let ledger = self.require_ledger(product_id)?;
        let guard = ledger.lock().map_err(|_| poisoned())?;
        let mut opnames: Vec<_> = guard.opnames.values().cloned().collect();
        opnames.sort_by_key(|o| (o.count_date, o.id));
        Ok(opnames)
    }

    fn delete_opname(&self, opname_id: OpnameId) -> StoreResult<StockOpname> {
        let product_id = self
            .opname_owner(opname_id)?
            .ok_or_else(|| StoreError::not_found(EntityKind::Opname, opname_id))?;
        let ledger = self.require_ledger(product_id)?;
        let mut guard = ledger.lock().map_err(|_| poisoned())?;

        guard
            .opnames
            .get(&opname_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Opname, opname_id))?
            .ensure_can_delete()
            .map_err(|e| StoreError::Conflict(format!("opname {opname_id}: {e}")))?;

        let removed = guard
            .opnames
            .remove(&opname_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Opname, opname_id))?;
        drop(guard);

        self.opname_owner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&opname_id);
        Ok(removed)
    }
}
