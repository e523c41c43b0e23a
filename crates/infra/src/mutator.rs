//! Stock mutation pipeline.
//!
//! Every change to a product's balance goes through [`StockMutator`]:
//!
//! ```text
//! request
//!   ↓
//! 1. load the product and its full history (one consistent snapshot)
//!   ↓
//! 2. build the candidate history (append / rewrite / remove one row)
//!   ↓
//! 3. fold it with the replay engine and validate the resulting balance
//!   ↓
//! 4. commit balance + row as one unit, conditional on the snapshot version
//!   ↓
//! 5. publish an audit event (after commit, best-effort)
//! ```
//!
//! The balance written in step 4 is always the full-history fold, so the
//! stored `current_stock` and the replayed closing balance cannot drift apart,
//! including when an ADJUST row sits after a retroactively edited movement.

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use stockledger_core::{
    AggregateRoot, EntityKind, ExpectedVersion, LedgerError, LedgerResult, ProductId,
    TransactionId,
};
use stockledger_events::{Event, EventBus};
use stockledger_ledger::{
    closing_balance, LedgerEvent, MovementMetadata, NewProduct, NewTransaction, Product,
    StockOpname, StockTransaction, TransactionKind,
};

use crate::config::LedgerConfig;
use crate::retry::{retrying, AttemptResult};
use crate::store::{CommitOutcome, LedgerChange, LedgerSnapshot, LedgerStore, StockMutation};

/// Note on the IN row created for a product registered with stock on hand.
pub const OPENING_STOCK_NOTE: &str = "Opening stock";

/// Stand-in id for a row that is being planned but not yet stored. Sorts after
/// every real id, which is where the store will put it.
const PROVISIONAL_ID: TransactionId = TransactionId::new(u64::MAX);

/// What a successful movement write reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub new_balance: i64,
}

impl MovementReceipt {
    fn from_outcome(outcome: &CommitOutcome) -> Self {
        Self {
            transaction_id: outcome.transaction.id,
            product_id: outcome.product.id_typed(),
            new_balance: outcome.product.current_stock(),
        }
    }
}

/// The single writer of product balances and ledger rows.
#[derive(Debug)]
pub struct StockMutator<S, B> {
    store: S,
    bus: B,
    config: LedgerConfig,
}

impl<S, B> StockMutator<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self::with_config(store, bus, LedgerConfig::default())
    }

    pub fn with_config(store: S, bus: B, config: LedgerConfig) -> Self {
        Self { store, bus, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

impl<S, B> StockMutator<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEvent>,
{
    /// Register a catalog product with the ledger.
    ///
    /// A non-zero `opening_stock` is written as an IN row in the same unit as
    /// the product, so the balance is explained by history from the start.
    #[instrument(skip(self, new), fields(code = %new.code))]
    pub fn register_product(&self, new: NewProduct) -> LedgerResult<Product> {
        new.validate()?;

        let (product, opening) = retrying(&self.config, "register_product", || {
            let mut product = Product::register(ProductId::new(), &new);
            let opening = if new.opening_stock > 0 {
                product.set_balance(new.opening_stock)?;
                Some(NewTransaction::new(
                    product.id_typed(),
                    TransactionKind::In,
                    new.opening_stock,
                    MovementMetadata::note(OPENING_STOCK_NOTE),
                    Utc::now(),
                ))
            } else {
                None
            };
            Ok(self.store.insert_product(product, opening)?)
        })?;

        if let Some(tx) = opening {
            self.publish(LedgerEvent::MovementRecorded {
                product_id: product.id_typed(),
                transaction_id: tx.id,
                kind: tx.kind,
                quantity: tx.quantity,
                balance_after: product.current_stock(),
                occurred_at: Utc::now(),
            });
        }

        tracing::info!(product_id = %product.id_typed(), balance = product.current_stock(), "product registered");
        Ok(product)
    }

    /// Append one movement and move the balance accordingly.
    ///
    /// IN adds, OUT removes (never below zero), ADJUST sets the balance to
    /// `quantity`.
    #[instrument(skip(self, metadata), fields(%product_id, %kind, quantity))]
    pub fn apply_movement(
        &self,
        product_id: ProductId,
        kind: TransactionKind,
        quantity: i64,
        metadata: MovementMetadata,
    ) -> LedgerResult<MovementReceipt> {
        kind.validate_quantity(quantity)?;

        let outcome = retrying(&self.config, "apply_movement", || {
            let snapshot = self.snapshot(product_id)?;
            let new = NewTransaction::new(product_id, kind, quantity, metadata.clone(), Utc::now());
            let mutation = plan_append(&snapshot, new)?;
            Ok(self.store.commit(mutation)?)
        })?;

        let receipt = MovementReceipt::from_outcome(&outcome);
        self.publish(LedgerEvent::MovementRecorded {
            product_id,
            transaction_id: receipt.transaction_id,
            kind,
            quantity,
            balance_after: receipt.new_balance,
            occurred_at: Utc::now(),
        });
        tracing::info!(transaction_id = %receipt.transaction_id, balance = receipt.new_balance, "movement recorded");
        Ok(receipt)
    }

    /// Rewrite a movement in place: undo its effect, validate and apply the
    /// new one, all in one unit.
    ///
    /// `metadata.occurred_at` and `metadata.responsible` fall back to the
    /// existing row when unset.
    #[instrument(skip(self, metadata), fields(%transaction_id, %new_kind, new_quantity))]
    pub fn reverse_and_reapply(
        &self,
        transaction_id: TransactionId,
        new_kind: TransactionKind,
        new_quantity: i64,
        metadata: MovementMetadata,
    ) -> LedgerResult<MovementReceipt> {
        ensure_movement_kind(new_kind)?;
        new_kind.validate_quantity(new_quantity)?;

        self.rewrite(transaction_id, |existing| {
            existing.rewritten(new_kind, new_quantity, metadata.clone())
        })
    }

    /// Change a movement's quantity (and optionally its note), keeping its kind.
    #[instrument(skip(self, note), fields(%transaction_id, new_quantity))]
    pub fn edit_movement(
        &self,
        transaction_id: TransactionId,
        new_quantity: i64,
        note: Option<String>,
    ) -> LedgerResult<MovementReceipt> {
        if new_quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(new_quantity));
        }

        self.rewrite(transaction_id, |existing| {
            let metadata = MovementMetadata::note(
                note.clone().unwrap_or_else(|| existing.note.clone()),
            );
            existing.rewritten(existing.kind, new_quantity, metadata)
        })
    }

    /// Remove a movement and undo its effect on the balance.
    #[instrument(skip(self), fields(%transaction_id))]
    pub fn delete_movement(&self, transaction_id: TransactionId) -> LedgerResult<MovementReceipt> {
        let outcome = retrying(&self.config, "delete_movement", || {
            let existing = self.existing_transaction(transaction_id)?;
            ensure_movement_row(&existing)?;
            let snapshot = self.snapshot(existing.product_id)?;

            let remaining: Vec<StockTransaction> = snapshot
                .transactions
                .iter()
                .filter(|t| t.id != transaction_id)
                .cloned()
                .collect();
            if remaining.len() == snapshot.transactions.len() {
                return Err(LedgerError::not_found(EntityKind::Transaction, transaction_id).into());
            }

            let new_balance = closing_balance(&remaining)?;
            if new_balance < 0 {
                return Err(LedgerError::WouldUnderflow { balance: new_balance }.into());
            }

            Ok(self.store.commit(StockMutation {
                product_id: snapshot.product.id_typed(),
                expected_version: ExpectedVersion::Exact(snapshot.product.version()),
                new_balance,
                change: LedgerChange::Delete(transaction_id),
                settles_opname: None,
            })?)
        })?;

        let receipt = MovementReceipt::from_outcome(&outcome);
        self.publish(LedgerEvent::MovementDeleted {
            product_id: receipt.product_id,
            transaction_id,
            kind: outcome.transaction.kind,
            quantity: outcome.transaction.quantity,
            balance_after: receipt.new_balance,
            occurred_at: Utc::now(),
        });
        tracing::info!(balance = receipt.new_balance, "movement deleted");
        Ok(receipt)
    }

    /// One attempt at reconciling an opname: append ADJUST(physical_stock) and
    /// flip the record to Adjusted in the same commit.
    pub(crate) fn settle_opname_once(&self, opname: &StockOpname) -> AttemptResult<CommitOutcome> {
        opname.ensure_can_commit()?;
        let snapshot = self.snapshot(opname.product_id)?;

        let metadata =
            MovementMetadata::note(opname.adjustment_note()).with_responsible(opname.petugas.clone());
        let adjust = NewTransaction::new(
            opname.product_id,
            TransactionKind::Adjust,
            opname.physical_stock,
            metadata,
            Utc::now(),
        )
        .from_opname(opname.id);

        let mut mutation = plan_append(&snapshot, adjust)?;
        mutation.settles_opname = Some(opname.id);
        Ok(self.store.commit(mutation)?)
    }

    /// Best-effort audit publication. The ledger change is already committed;
    /// a failing sink is logged and otherwise ignored.
    pub(crate) fn publish(&self, event: LedgerEvent) {
        let event_type = event.event_type();
        if let Err(err) = self.bus.publish(event) {
            tracing::warn!(event_type, error = ?err, "failed to publish ledger event");
        }
    }

    fn rewrite(
        &self,
        transaction_id: TransactionId,
        decide: impl Fn(&StockTransaction) -> StockTransaction,
    ) -> LedgerResult<MovementReceipt> {
        let (outcome, previous) = retrying(&self.config, "rewrite_movement", || {
            let existing = self.existing_transaction(transaction_id)?;
            ensure_movement_row(&existing)?;
            let snapshot = self.snapshot(existing.product_id)?;

            let previous = snapshot
                .transactions
                .iter()
                .find(|t| t.id == transaction_id)
                .cloned()
                .ok_or_else(|| LedgerError::not_found(EntityKind::Transaction, transaction_id))?;
            let replacement = decide(&previous);

            let mut candidate: Vec<StockTransaction> = snapshot
                .transactions
                .iter()
                .filter(|t| t.id != transaction_id)
                .cloned()
                .collect();
            let available = closing_balance(&candidate)?;
            candidate.push(replacement.clone());
            let new_balance = closing_balance(&candidate)?;

            if new_balance < 0 {
                let err = match replacement.kind {
                    TransactionKind::Out => LedgerError::InsufficientStock {
                        requested: replacement.quantity,
                        available,
                    },
                    _ => LedgerError::WouldUnderflow { balance: new_balance },
                };
                return Err(err.into());
            }

            let outcome = self.store.commit(StockMutation {
                product_id: snapshot.product.id_typed(),
                expected_version: ExpectedVersion::Exact(snapshot.product.version()),
                new_balance,
                change: LedgerChange::Rewrite(replacement),
                settles_opname: None,
            })?;
            Ok((outcome, previous))
        })?;

        let receipt = MovementReceipt::from_outcome(&outcome);
        self.publish(LedgerEvent::MovementEdited {
            product_id: receipt.product_id,
            transaction_id,
            old_kind: previous.kind,
            old_quantity: previous.quantity,
            new_kind: outcome.transaction.kind,
            new_quantity: outcome.transaction.quantity,
            balance_after: receipt.new_balance,
            occurred_at: Utc::now(),
        });
        tracing::info!(balance = receipt.new_balance, "movement rewritten");
        Ok(receipt)
    }

    fn existing_transaction(&self, transaction_id: TransactionId) -> AttemptResult<StockTransaction> {
        Ok(self
            .store
            .get_transaction(transaction_id)?
            .ok_or_else(|| LedgerError::not_found(EntityKind::Transaction, transaction_id))?)
    }

    fn snapshot(&self, product_id: ProductId) -> AttemptResult<LedgerSnapshot> {
        let snapshot = self
            .store
            .load_ledger(product_id)?
            .ok_or_else(|| LedgerError::not_found(EntityKind::Product, product_id))?;

        let replayed = closing_balance(&snapshot.transactions)?;
        if replayed != snapshot.product.current_stock() {
            tracing::warn!(
                %product_id,
                stored = snapshot.product.current_stock(),
                replayed,
                "stored balance differs from replayed history; next write realigns it"
            );
        }
        Ok(snapshot)
    }
}

/// Decide the mutation that appends `new` to the snapshot's history.
fn plan_append(snapshot: &LedgerSnapshot, new: NewTransaction) -> LedgerResult<StockMutation> {
    let available = snapshot.product.current_stock();
    if new.kind == TransactionKind::Out && new.quantity > available {
        return Err(LedgerError::InsufficientStock {
            requested: new.quantity,
            available,
        });
    }

    let mut candidate = snapshot.transactions.clone();
    candidate.push(new.clone().into_stored(PROVISIONAL_ID));
    let new_balance = closing_balance(&candidate)?;
    if new_balance < 0 {
        return Err(LedgerError::InsufficientStock {
            requested: new.quantity,
            available,
        });
    }

    Ok(StockMutation {
        product_id: snapshot.product.id_typed(),
        expected_version: ExpectedVersion::Exact(snapshot.product.version()),
        new_balance,
        change: LedgerChange::Append(new),
        settles_opname: None,
    })
}

fn ensure_movement_kind(kind: TransactionKind) -> LedgerResult<()> {
    if kind == TransactionKind::Adjust {
        return Err(LedgerError::validation(
            "a movement cannot be turned into an ADJUST; record a stock opname instead",
        ));
    }
    Ok(())
}

fn ensure_movement_row(tx: &StockTransaction) -> LedgerResult<()> {
    if tx.kind == TransactionKind::Adjust {
        return Err(LedgerError::validation(format!(
            "transaction {} is an ADJUST and can only change through its stock opname",
            tx.id
        )));
    }
    Ok(())
}
