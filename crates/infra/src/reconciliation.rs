//! Stock opname (physical count) workflow.
//!
//! A record is opened against the balance of record, and is later reconciled
//! into the ledger exactly once as an ADJUST row carrying the physical count.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use stockledger_core::{
    AggregateRoot, EntityKind, ExpectedVersion, LedgerError, LedgerResult, OpnameId, ProductId,
};
use stockledger_events::EventBus;
use stockledger_ledger::{LedgerEvent, NewOpname, OpnameStatus, StockOpname};

use crate::mutator::{MovementReceipt, StockMutator};
use crate::retry::{retrying, AttemptResult};
use crate::store::LedgerStore;

/// Result of opening an opname record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpnameOutcome {
    pub opname: StockOpname,
    /// Set when the record was reconciled right away.
    pub new_balance: Option<i64>,
}

pub struct OpnameWorkflow<S, B> {
    mutator: Arc<StockMutator<S, B>>,
}

impl<S, B> OpnameWorkflow<S, B> {
    pub fn new(mutator: Arc<StockMutator<S, B>>) -> Self {
        Self { mutator }
    }
}

impl<S, B> OpnameWorkflow<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEvent>,
{
    /// Open a record, snapshotting the current balance as `system_stock`.
    ///
    /// With `apply_now` the record is reconciled immediately. If that fails
    /// the record stays NotAdjusted and the error is returned.
    #[instrument(skip(self, new), fields(product_id = %new.product_id, physical = new.physical_stock))]
    pub fn create(&self, new: NewOpname, apply_now: bool) -> LedgerResult<OpnameOutcome> {
        new.validate()?;
        let store = self.mutator.store();

        let opname = retrying(self.mutator.config(), "create_opname", || {
            let product = store
                .get_product(new.product_id)?
                .ok_or_else(|| LedgerError::not_found(EntityKind::Product, new.product_id))?;
            Ok(store.insert_opname(
                new.clone(),
                product.current_stock(),
                ExpectedVersion::Exact(product.version()),
                Utc::now(),
            )?)
        })?;

        self.mutator.publish(LedgerEvent::OpnameRecorded {
            product_id: opname.product_id,
            opname_id: opname.id,
            system_stock: opname.system_stock,
            physical_stock: opname.physical_stock,
            difference: opname.difference,
            occurred_at: Utc::now(),
        });
        tracing::info!(opname_id = %opname.id, difference = opname.difference, "opname recorded");

        if !apply_now {
            return Ok(OpnameOutcome {
                opname,
                new_balance: None,
            });
        }

        let receipt = self.commit(opname.id)?;
        Ok(OpnameOutcome {
            opname: self.get(opname.id)?,
            new_balance: Some(receipt.new_balance),
        })
    }

    /// Reconcile a record into the ledger.
    ///
    /// A second call finds the record Adjusted and returns `AlreadyAdjusted`
    /// without touching the balance.
    #[instrument(skip(self), fields(%opname_id))]
    pub fn commit(&self, opname_id: OpnameId) -> LedgerResult<MovementReceipt> {
        let outcome = retrying(self.mutator.config(), "commit_opname", || {
            let opname = self.require(opname_id)?;
            self.mutator.settle_opname_once(&opname)
        })?;

        let receipt = MovementReceipt {
            transaction_id: outcome.transaction.id,
            product_id: outcome.product.id_typed(),
            new_balance: outcome.product.current_stock(),
        };
        self.mutator.publish(LedgerEvent::OpnameAdjusted {
            product_id: receipt.product_id,
            opname_id,
            transaction_id: receipt.transaction_id,
            balance_after: receipt.new_balance,
            occurred_at: Utc::now(),
        });
        tracing::info!(transaction_id = %receipt.transaction_id, balance = receipt.new_balance, "opname adjusted");
        Ok(receipt)
    }

    /// Delete a record that has not been reconciled yet.
    #[instrument(skip(self), fields(%opname_id))]
    pub fn delete(&self, opname_id: OpnameId) -> LedgerResult<StockOpname> {
        let store = self.mutator.store();
        let removed = retrying(self.mutator.config(), "delete_opname", || {
            let opname = self.require(opname_id)?;
            opname.ensure_can_delete()?;
            Ok(store.delete_opname(opname_id)?)
        })?;

        self.mutator.publish(LedgerEvent::OpnameDeleted {
            product_id: removed.product_id,
            opname_id,
            occurred_at: Utc::now(),
        });
        tracing::info!("opname deleted");
        Ok(removed)
    }

    pub fn get(&self, opname_id: OpnameId) -> LedgerResult<StockOpname> {
        self.mutator
            .store()
            .get_opname(opname_id)?
            .ok_or_else(|| LedgerError::not_found(EntityKind::Opname, opname_id))
    }

    /// Records of one product by count date, optionally only those in `status`.
    pub fn list_by_product(
        &self,
        product_id: ProductId,
        status: Option<OpnameStatus>,
    ) -> LedgerResult<Vec<StockOpname>> {
        let mut opnames = self.mutator.store().list_opnames(product_id)?;
        if let Some(status) = status {
            opnames.retain(|o| o.status == status);
        }
        Ok(opnames)
    }

    fn require(&self, opname_id: OpnameId) -> AttemptResult<StockOpname> {
        Ok(self
            .mutator
            .store()
            .get_opname(opname_id)?
            .ok_or_else(|| LedgerError::not_found(EntityKind::Opname, opname_id))?)
    }
}
