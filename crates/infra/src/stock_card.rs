//! Read side: stock cards and balance verification.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::instrument;

use stockledger_core::{EntityKind, LedgerError, LedgerResult, ProductId};
use stockledger_ledger::{closing_balance, stock_card, DateWindow, Product, StockCard};

use crate::store::{LedgerSnapshot, LedgerStore};

/// A stock card together with the product it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStockCard {
    pub product: Product,
    pub card: StockCard,
}

/// Stored balance compared with a full replay of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    pub product_id: ProductId,
    pub stored: i64,
    pub replayed: i64,
    pub consistent: bool,
}

/// Query facade over the ledger store. Never writes.
#[derive(Debug, Clone)]
pub struct StockCardService<S> {
    store: S,
}

impl<S> StockCardService<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Opening balance and running rows for `[from, to]`, both inclusive.
    #[instrument(skip(self), fields(%product_id, %from, %to))]
    pub fn stock_card(
        &self,
        product_id: ProductId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<ProductStockCard> {
        let window = DateWindow::new(from, to)?;
        let snapshot = self.snapshot(product_id)?;
        let card = stock_card(&snapshot.transactions, &window)?;
        tracing::debug!(rows = card.rows.len(), opening = card.opening_balance, "stock card built");

        Ok(ProductStockCard {
            product: snapshot.product,
            card,
        })
    }

    /// Whether `current_stock` equals the closing balance of the full history.
    #[instrument(skip(self), fields(%product_id))]
    pub fn verify_balance(&self, product_id: ProductId) -> LedgerResult<BalanceCheck> {
        let snapshot = self.snapshot(product_id)?;
        let stored = snapshot.product.current_stock();
        let replayed = closing_balance(&snapshot.transactions)?;

        let check = BalanceCheck {
            product_id,
            stored,
            replayed,
            consistent: stored == replayed,
        };
        if !check.consistent {
            tracing::warn!(stored, replayed, "balance drift detected");
        }
        Ok(check)
    }

    pub fn get_product(&self, product_id: ProductId) -> LedgerResult<Product> {
        self.store
            .get_product(product_id)?
            .ok_or_else(|| LedgerError::not_found(EntityKind::Product, product_id))
    }

    /// Product registered under the business key `code`, if any.
    pub fn find_product_by_code(&self, code: &str) -> LedgerResult<Option<Product>> {
        Ok(self.store.find_product_by_code(code)?)
    }

    pub fn list_products(&self) -> LedgerResult<Vec<Product>> {
        Ok(self.store.list_products()?)
    }

    fn snapshot(&self, product_id: ProductId) -> LedgerResult<LedgerSnapshot> {
        self.store
            .load_ledger(product_id)?
            .ok_or_else(|| LedgerError::not_found(EntityKind::Product, product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use stockledger_events::InMemoryEventBus;
    use stockledger_ledger::{LedgerEvent, MovementMetadata, NewProduct, TransactionKind};

    use crate::mutator::StockMutator;
    use crate::store::InMemoryLedgerStore;

    fn setup() -> (
        StockMutator<Arc<InMemoryLedgerStore>, InMemoryEventBus<LedgerEvent>>,
        StockCardService<Arc<InMemoryLedgerStore>>,
    ) {
        let store = Arc::new(InMemoryLedgerStore::new());
        (
            StockMutator::new(Arc::clone(&store), InMemoryEventBus::new()),
            StockCardService::new(store),
        )
    }

    fn register(mutator: &StockMutator<Arc<InMemoryLedgerStore>, InMemoryEventBus<LedgerEvent>>) -> ProductId {
        mutator
            .register_product(NewProduct {
                code: "GULA-1".to_string(),
                name: "Gula pasir".to_string(),
                unit: "kg".to_string(),
                min_stock: 0,
                opening_stock: 0,
            })
            .unwrap()
            .id_typed()
    }

    #[test]
    fn adjacent_windows_chain() {
        let (mutator, cards) = setup();
        let pid = register(&mutator);
        let now = Utc::now();

        for (days_ago, kind, qty) in [
            (6, TransactionKind::In, 40),
            (4, TransactionKind::Out, 15),
            (3, TransactionKind::Adjust, 22),
            (1, TransactionKind::Out, 2),
        ] {
            let at = now - Duration::days(days_ago);
            mutator
                .apply_movement(pid, kind, qty, MovementMetadata::default().at(at))
                .unwrap();
        }

        let today = now.date_naive();
        let split = today - Duration::days(4);
        let first = cards.stock_card(pid, today - Duration::days(10), split).unwrap();
        let second = cards
            .stock_card(pid, split + Duration::days(1), today)
            .unwrap();

        assert_eq!(first.card.closing_balance, 25);
        assert_eq!(second.card.opening_balance, 25);
        assert_eq!(second.card.closing_balance, 20);
        assert_eq!(second.product.current_stock(), 20);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let (mutator, cards) = setup();
        let pid = register(&mutator);
        let today = Utc::now().date_naive();

        assert!(matches!(
            cards.stock_card(pid, today, today - Duration::days(1)),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn unknown_product_has_no_card() {
        let (_, cards) = setup();
        let today = Utc::now().date_naive();
        assert!(matches!(
            cards.stock_card(ProductId::new(), today, today),
            Err(LedgerError::NotFound { kind: EntityKind::Product, .. })
        ));
    }

    #[test]
    fn products_are_found_by_code() {
        let (mutator, cards) = setup();
        let pid = register(&mutator);

        let found = cards.find_product_by_code(" GULA-1 ").unwrap().unwrap();
        assert_eq!(found.id_typed(), pid);
        assert_eq!(cards.find_product_by_code("GARAM-1").unwrap(), None);
    }

    #[test]
    fn balance_check_agrees_after_writes() {
        let (mutator, cards) = setup();
        let pid = register(&mutator);
        mutator
            .apply_movement(pid, TransactionKind::In, 7, MovementMetadata::default())
            .unwrap();

        let check = cards.verify_balance(pid).unwrap();
        assert!(check.consistent);
        assert_eq!(check.stored, 7);
        assert_eq!(check.replayed, 7);
    }
}
