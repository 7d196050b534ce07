//! Property-based tests for the ledger invariants
//!
//! These use proptest to check the properties that must hold for every
//! reachable state: quantities never go negative, the lifecycle graph
//! admits only its own edges, and approval succeeds exactly when the
//! fabric ledger can cover the requested quantity.

use std::sync::Arc;

use proptest::prelude::*;

use fabric_supply::catalog::CatalogService;
use fabric_supply::ledger::LedgerStore;
use fabric_supply::model::{FabricDraft, FinishedGoodsProduct, Party, Role, TimeStamp};
use fabric_supply::request::RequestStatus;
use fabric_supply::sales::SalesEngine;
use fabric_supply::service::{ApprovalOutcome, RequestService};
use fabric_supply::utils::{new_uuid_to_bech32, round2};

use tempfile::tempdir; // Use for test db cleanup.

// PROPERTY TEST STRATEGIES

/// Strategy for a length quantity with two decimal places, in metres.
fn metres_strategy(min_cm: u32, max_cm: u32) -> impl Strategy<Value = f64> {
    (min_cm..=max_cm).prop_map(|cm| f64::from(cm) / 100.0)
}

/// Strategy to generate any lifecycle status.
fn status_strategy() -> impl Strategy<Value = RequestStatus> {
    prop_oneof![
        Just(RequestStatus::Pending),
        Just(RequestStatus::WaitingVerification),
        Just(RequestStatus::Approved),
        Just(RequestStatus::Shipped),
        Just(RequestStatus::Rejected),
        Just(RequestStatus::Cancelled),
        Just(RequestStatus::Completed),
    ]
}

fn open_store(dir: &tempfile::TempDir) -> (Arc<sled::Db>, LedgerStore) {
    let db = Arc::new(sled::open(dir.path().join("prop.db")).unwrap());
    db.clear().unwrap();
    let store = LedgerStore::open(&db).unwrap();
    (db, store)
}

// PROPERTY TESTS

proptest! {
    /// Property: the transition table admits exactly the edges of the
    /// lifecycle graph, nothing else. The legal edges are written out by
    /// hand here, so a drifting `can_transition_to` fails immediately.
    #[test]
    fn prop_only_graph_edges_are_legal(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        use RequestStatus::*;
        let legal = [
            (Pending, WaitingVerification),
            (Pending, Approved),
            (Pending, Rejected),
            (WaitingVerification, Approved),
            (WaitingVerification, Rejected),
            (Approved, Shipped),
            (Approved, Cancelled),
            (Shipped, Completed),
        ];

        prop_assert_eq!(from.can_transition_to(to), legal.contains(&(from, to)));
    }

    /// Property: terminal states admit no outgoing transition at all.
    #[test]
    fn prop_terminal_states_are_stable(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: approval succeeds exactly when fabric stock covers the
    /// requested quantity, and in either case the fabric balance stays
    /// non-negative and accounts for precisely one debit or none.
    #[test]
    fn prop_approval_succeeds_iff_stock_suffices(
        stock in metres_strategy(0, 20_000),
        quantity in metres_strategy(1, 20_000),
    ) {
        let dir = tempdir().unwrap();
        let (_db, store) = open_store(&dir);
        let catalog = CatalogService::new(store.clone());
        let requests = RequestService::new(store.clone());

        let supplier = Party::new(
            new_uuid_to_bech32("sup_").unwrap(),
            "Mitra Tekstil",
            Role::Supplier,
        );
        let producer = Party::new(
            new_uuid_to_bech32("umkm_").unwrap(),
            "Rumah Hijab Anisa",
            Role::Producer,
        );
        let fabric = catalog
            .add_fabric(
                &supplier,
                FabricDraft {
                    name: "Voal Premium".into(),
                    kind: "Voal".into(),
                    color: "Dusty Rose".into(),
                    price_per_unit: 28_000,
                    stock,
                },
            )
            .unwrap();

        let (request, _) = requests
            .submit_request(&producer, &fabric.id, quantity, None)
            .unwrap();
        let outcome = requests.approve_request(&supplier, &request.id).unwrap();

        let balance = store.get_fabric(&fabric.id).unwrap().unwrap().stock;
        prop_assert!(balance >= 0.0);

        if stock >= quantity {
            prop_assert!(
                matches!(outcome, ApprovalOutcome::Approved { .. }),
                "expected ApprovalOutcome::Approved"
            );
            prop_assert_eq!(balance, round2(stock - quantity));
        } else {
            prop_assert!(
                matches!(outcome, ApprovalOutcome::Disrupted { .. }),
                "expected ApprovalOutcome::Disrupted"
            );
            prop_assert_eq!(balance, stock);
            let stored = store.get_request(&request.id).unwrap().unwrap();
            prop_assert_eq!(stored.status, RequestStatus::Pending);
        }
    }

    /// Property: under any sequence of sale attempts the SKU count never
    /// goes negative, and the final count equals the initial stock minus
    /// everything the successful sales took.
    #[test]
    fn prop_sales_never_oversell(
        initial in 0u32..40,
        attempts in prop::collection::vec(1u32..15, 1..8),
    ) {
        let dir = tempdir().unwrap();
        let (_db, store) = open_store(&dir);
        let sales = SalesEngine::new(store.clone());

        let producer = Party::new(
            new_uuid_to_bech32("umkm_").unwrap(),
            "Rumah Hijab Anisa",
            Role::Producer,
        );
        let sku = FinishedGoodsProduct {
            id: new_uuid_to_bech32("sku_").unwrap(),
            producer_id: producer.id.clone(),
            name: "Hijab Segi Empat".into(),
            color: "Dusty Rose".into(),
            stock: initial,
            threshold: 0,
            fabric_id: new_uuid_to_bech32("fab_").unwrap(),
        };
        store.insert_product(&sku).unwrap();

        let sale_date = TimeStamp::new_with(2024, 6, 1, 0, 0, 0);
        let mut sold = 0u32;
        let mut records = 0usize;
        for qty in attempts {
            let result = sales.record_sale(&producer, &sku.id, qty, "JNE-000", sale_date.clone());
            if result.is_ok() {
                sold += qty;
                records += 1;
            }
            let current = store.get_product(&sku.id).unwrap().unwrap().stock;
            prop_assert_eq!(current, initial - sold);
        }

        prop_assert_eq!(store.sales().unwrap().len(), records);
        prop_assert!(sold <= initial);
    }
}
