//! Integration tests for the full ledger pipeline.
//!
//! Tests: Mutator / OpnameWorkflow → LedgerStore → EventBus, read back through
//! StockCardService.
//!
//! Verifies:
//! - The stock card reproduces the balances the mutator committed
//! - Stored balance always equals the replayed closing balance
//! - Concurrent writers on one product never overdraw it
//! - An opname is reconciled exactly once

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, NaiveDate, Utc};
    use proptest::prelude::*;

    use stockledger_core::{LedgerError, ProductId, TransactionId};
    use stockledger_events::{Event, EventBus, InMemoryEventBus};
    use stockledger_ledger::{
        closing_balance, LedgerEvent, MovementMetadata, NewOpname, NewProduct, OpnameStatus,
        TransactionKind,
    };

    use crate::config::LedgerConfig;
    use crate::mutator::StockMutator;
    use crate::reconciliation::OpnameWorkflow;
    use crate::stock_card::StockCardService;
    use crate::store::{InMemoryLedgerStore, LedgerStore};

    type Store = Arc<InMemoryLedgerStore>;
    type Bus = Arc<InMemoryEventBus<LedgerEvent>>;

    struct Ledger {
        mutator: Arc<StockMutator<Store, Bus>>,
        opnames: OpnameWorkflow<Store, Bus>,
        cards: StockCardService<Store>,
        bus: Bus,
    }

    fn setup_with(config: LedgerConfig) -> Ledger {
        let store: Store = Arc::new(InMemoryLedgerStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let mutator = Arc::new(StockMutator::with_config(
            Arc::clone(&store),
            Arc::clone(&bus),
            config,
        ));
        Ledger {
            opnames: OpnameWorkflow::new(Arc::clone(&mutator)),
            cards: StockCardService::new(store),
            mutator,
            bus,
        }
    }

    fn setup() -> Ledger {
        setup_with(LedgerConfig::default())
    }

    fn register(ledger: &Ledger, code: &str, opening_stock: i64) -> ProductId {
        ledger
            .mutator
            .register_product(NewProduct {
                code: code.to_string(),
                name: format!("Item {code}"),
                unit: "pcs".to_string(),
                min_stock: 3,
                opening_stock,
            })
            .unwrap()
            .id_typed()
    }

    fn assert_balanced(ledger: &Ledger, product_id: ProductId) {
        let check = ledger.cards.verify_balance(product_id).unwrap();
        assert!(
            check.consistent,
            "stored {} != replayed {}",
            check.stored, check.replayed
        );
    }

    #[test]
    fn movements_and_opname_show_up_on_the_stock_card() {
        let ledger = setup();
        let pid = register(&ledger, "SKU-100", 0);
        let now = Utc::now();

        ledger
            .mutator
            .apply_movement(
                pid,
                TransactionKind::In,
                10,
                MovementMetadata::note("initial delivery").at(now - Duration::days(3)),
            )
            .unwrap();
        let r = ledger
            .mutator
            .apply_movement(
                pid,
                TransactionKind::In,
                5,
                MovementMetadata::note("restock").at(now - Duration::minutes(2)),
            )
            .unwrap();
        assert_eq!(r.new_balance, 15);
        let r = ledger
            .mutator
            .apply_movement(
                pid,
                TransactionKind::Out,
                3,
                MovementMetadata::note("order #12").at(now - Duration::minutes(1)),
            )
            .unwrap();
        assert_eq!(r.new_balance, 12);

        let outcome = ledger
            .opnames
            .create(
                NewOpname {
                    product_id: pid,
                    count_date: now.date_naive(),
                    physical_stock: 20,
                    petugas: "Rina".to_string(),
                    note: String::new(),
                },
                true,
            )
            .unwrap();
        assert_eq!(outcome.opname.difference, 8);
        assert_eq!(outcome.opname.status, OpnameStatus::Adjusted);
        assert_eq!(outcome.new_balance, Some(20));

        let from = (now - Duration::days(1)).date_naive();
        let card = ledger
            .cards
            .stock_card(pid, from, now.date_naive())
            .unwrap()
            .card;

        assert_eq!(card.opening_balance, 10);
        let rows: Vec<(i64, i64, i64)> = card
            .rows
            .iter()
            .map(|r| (r.qty_in, r.qty_out, r.balance))
            .collect();
        assert_eq!(rows, vec![(5, 0, 15), (0, 3, 12), (8, 0, 20)]);
        assert_eq!(card.rows[2].kind, TransactionKind::Adjust);
        assert_eq!(card.closing_balance, 20);
        assert_eq!(card.total_in, 13);
        assert_eq!(card.total_out, 3);

        assert_balanced(&ledger, pid);
    }

    #[test]
    fn audit_trail_follows_the_scenario() {
        let ledger = setup();
        let sub = ledger.bus.subscribe();
        let pid = register(&ledger, "SKU-101", 10);

        let out = ledger
            .mutator
            .apply_movement(pid, TransactionKind::Out, 3, MovementMetadata::default())
            .unwrap();
        ledger.mutator.edit_movement(out.transaction_id, 4, None).unwrap();
        let opname = ledger
            .opnames
            .create(
                NewOpname {
                    product_id: pid,
                    count_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                    physical_stock: 6,
                    petugas: "Dewi".to_string(),
                    note: "gudang belakang".to_string(),
                },
                false,
            )
            .unwrap()
            .opname;
        ledger.opnames.commit(opname.id).unwrap();

        let events = sub.drain();
        let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                "ledger.movement.recorded",
                "ledger.movement.recorded",
                "ledger.movement.edited",
                "ledger.opname.recorded",
                "ledger.opname.adjusted",
            ]
        );
        assert!(events.iter().all(|e| e.product_id() == pid));
        match events.last() {
            Some(LedgerEvent::OpnameAdjusted { balance_after, .. }) => assert_eq!(*balance_after, 6),
            other => panic!("unexpected last event: {other:?}"),
        }
    }

    #[test]
    fn concurrent_outs_never_overdraw() {
        let ledger = Arc::new(setup());
        let pid = register(&ledger, "SKU-200", 100);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    let mut ok: i64 = 0;
                    for _ in 0..20 {
                        match ledger.mutator.apply_movement(
                            pid,
                            TransactionKind::Out,
                            1,
                            MovementMetadata::default(),
                        ) {
                            Ok(_) => ok += 1,
                            Err(LedgerError::InsufficientStock { .. })
                            | Err(LedgerError::ConcurrentModification(_)) => {}
                            Err(other) => panic!("unexpected error: {other:?}"),
                        }
                    }
                    ok
                })
            })
            .collect();

        let succeeded: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let product = ledger.cards.get_product(pid).unwrap();

        assert!(product.current_stock() >= 0);
        assert_eq!(product.current_stock(), 100 - succeeded);
        let outs = ledger
            .mutator
            .store()
            .list_transactions(pid)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TransactionKind::Out)
            .count();
        assert_eq!(outs as i64, succeeded);
        assert_balanced(&ledger, pid);
    }

    #[test]
    fn with_enough_retries_every_concurrent_out_lands() {
        let ledger = Arc::new(setup_with(LedgerConfig {
            conflict_retries: 10_000,
            storage_retries: 0,
        }));
        let busy = register(&ledger, "SKU-300", 100);
        let quiet = register(&ledger, "SKU-301", 100);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let pid = if i % 2 == 0 { busy } else { quiet };
                thread::spawn(move || {
                    for _ in 0..25 {
                        ledger
                            .mutator
                            .apply_movement(pid, TransactionKind::Out, 2, MovementMetadata::default())
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(ledger.cards.get_product(busy).unwrap().current_stock(), 0);
        assert_eq!(ledger.cards.get_product(quiet).unwrap().current_stock(), 0);
        assert_balanced(&ledger, busy);
        assert_balanced(&ledger, quiet);
    }

    #[test]
    fn racing_commits_apply_one_adjustment() {
        let ledger = Arc::new(setup());
        let pid = register(&ledger, "SKU-400", 12);
        let opname = ledger
            .opnames
            .create(
                NewOpname {
                    product_id: pid,
                    count_date: Utc::now().date_naive(),
                    physical_stock: 7,
                    petugas: "Yusuf".to_string(),
                    note: String::new(),
                },
                false,
            )
            .unwrap()
            .opname
            .id;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.opnames.commit(opname))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == LedgerError::AlreadyAdjusted));

        let adjusts = ledger
            .mutator
            .store()
            .list_transactions(pid)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TransactionKind::Adjust)
            .count();
        assert_eq!(adjusts, 1);
        assert_eq!(ledger.cards.get_product(pid).unwrap().current_stock(), 7);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Receive { qty: i64, days_ago: i64 },
        Issue { qty: i64 },
        Edit { pick: usize, qty: i64 },
        Delete { pick: usize },
        Count { physical: i64, apply_now: bool },
        CommitPending,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..50, 0i64..5).prop_map(|(qty, days_ago)| Op::Receive { qty, days_ago }),
            (1i64..40).prop_map(|qty| Op::Issue { qty }),
            (any::<usize>(), 1i64..40).prop_map(|(pick, qty)| Op::Edit { pick, qty }),
            any::<usize>().prop_map(|pick| Op::Delete { pick }),
            (0i64..60, any::<bool>()).prop_map(|(physical, apply_now)| Op::Count { physical, apply_now }),
            Just(Op::CommitPending),
        ]
    }

    fn pick_movement(ledger: &Ledger, pid: ProductId, pick: usize) -> Option<TransactionId> {
        let movements: Vec<_> = ledger
            .mutator
            .store()
            .list_transactions(pid)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind != TransactionKind::Adjust)
            .collect();
        if movements.is_empty() {
            None
        } else {
            Some(movements[pick % movements.len()].id)
        }
    }

    fn is_domain_rejection(err: &LedgerError) -> bool {
        matches!(
            err,
            LedgerError::InsufficientStock { .. }
                | LedgerError::WouldUnderflow { .. }
                | LedgerError::AlreadyAdjusted
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn stored_balance_always_equals_replay(ops in prop::collection::vec(arb_op(), 1..40)) {
            let ledger = setup();
            let pid = register(&ledger, "SKU-P", 20);
            let now = Utc::now();

            for op in ops {
                let result = match op {
                    Op::Receive { qty, days_ago } => ledger
                        .mutator
                        .apply_movement(
                            pid,
                            TransactionKind::In,
                            qty,
                            MovementMetadata::default().at(now - Duration::days(days_ago)),
                        )
                        .map(|_| ()),
                    Op::Issue { qty } => ledger
                        .mutator
                        .apply_movement(pid, TransactionKind::Out, qty, MovementMetadata::default())
                        .map(|_| ()),
                    Op::Edit { pick, qty } => match pick_movement(&ledger, pid, pick) {
                        Some(id) => ledger.mutator.edit_movement(id, qty, None).map(|_| ()),
                        None => Ok(()),
                    },
                    Op::Delete { pick } => match pick_movement(&ledger, pid, pick) {
                        Some(id) => ledger.mutator.delete_movement(id).map(|_| ()),
                        None => Ok(()),
                    },
                    Op::Count { physical, apply_now } => ledger
                        .opnames
                        .create(
                            NewOpname {
                                product_id: pid,
                                count_date: now.date_naive(),
                                physical_stock: physical,
                                petugas: "QA".to_string(),
                                note: String::new(),
                            },
                            apply_now,
                        )
                        .map(|_| ()),
                    Op::CommitPending => {
                        let pending = ledger
                            .opnames
                            .list_by_product(pid, Some(OpnameStatus::NotAdjusted))
                            .unwrap();
                        match pending.first() {
                            Some(o) => ledger.opnames.commit(o.id).map(|_| ()),
                            None => Ok(()),
                        }
                    }
                };

                if let Err(err) = result {
                    prop_assert!(is_domain_rejection(&err), "unexpected error {err:?}");
                }

                let product = ledger.cards.get_product(pid).unwrap();
                let history = ledger.mutator.store().list_transactions(pid).unwrap();
                prop_assert!(product.current_stock() >= 0);
                prop_assert_eq!(product.current_stock(), closing_balance(&history).unwrap());
            }
        }
    }
}
