use std::sync::Arc;
use std::thread;

use stockledger_events::{Event, EventBus, InMemoryEventBus};
use stockledger_infra::{
    InMemoryLedgerStore, LedgerConfig, OpnameWorkflow, StockCardService, StockMutator,
};
use stockledger_ledger::LedgerEvent;

pub type Store = Arc<InMemoryLedgerStore>;
pub type AuditBus = Arc<InMemoryEventBus<LedgerEvent>>;
pub type Mutator = StockMutator<Store, AuditBus>;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub mutator: Arc<Mutator>,
    pub opnames: OpnameWorkflow<Store, AuditBus>,
    pub cards: StockCardService<Store>,
}

/// In-memory wiring: one store shared by the write path and the read side.
pub fn build_services(config: LedgerConfig) -> AppServices {
    let store: Store = Arc::new(InMemoryLedgerStore::new());
    let bus: AuditBus = Arc::new(InMemoryEventBus::new());
    let mutator = Arc::new(StockMutator::with_config(
        Arc::clone(&store),
        Arc::clone(&bus),
        config,
    ));

    spawn_audit_log(&bus);

    AppServices {
        opnames: OpnameWorkflow::new(Arc::clone(&mutator)),
        cards: StockCardService::new(store),
        mutator,
    }
}

/// Mirror every committed ledger change into the log.
///
/// Subscribes before returning so no event published afterwards is missed.
/// The thread ends once the bus (owned by the mutator) is dropped.
fn spawn_audit_log(bus: &AuditBus) {
    let sub = bus.subscribe();
    thread::spawn(move || {
        while let Ok(event) = sub.recv() {
            match serde_json::to_string(&event) {
                Ok(payload) => tracing::info!(
                    target: "stockledger::audit",
                    event_type = event.event_type(),
                    product_id = %event.product_id(),
                    %payload,
                    "ledger event"
                ),
                Err(err) => tracing::warn!(error = %err, "failed to encode ledger event"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use stockledger_ledger::NewProduct;

    #[test]
    fn audit_log_listens_to_the_mutator_bus() {
        let services = build_services(LedgerConfig::default());
        services
            .mutator
            .register_product(NewProduct {
                code: "KOPI-1".to_string(),
                name: "Kopi bubuk".to_string(),
                unit: "pack".to_string(),
                min_stock: 2,
                opening_stock: 6,
            })
            .unwrap();

        let bus = services.mutator.bus();
        assert_eq!(bus.published_count(), 1);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
