//! Checkout behavior against both storage backends.

use std::sync::Arc;

use proptest::prelude::*;

use vmuseum::core::{ArtifactId, Cart, CoreError, Money, Problem, UserId};
use vmuseum::store::{MemoryStore, SqliteStore, Store, StoreExt};
use vmuseum::{CheckoutConfig, CheckoutEngine, CheckoutError};
use vmuseum_testkit::{cart_of, checkout_scenario, init_tracing, seed_catalog, CheckoutScenario};

const CUSTOMER: Option<UserId> = Some(UserId(7));

fn engine<S: Store>(store: S) -> CheckoutEngine<S> {
    CheckoutEngine::new(Arc::new(store), CheckoutConfig::default())
}

async fn stock(engine: &CheckoutEngine<impl Store>, id: ArtifactId) -> u32 {
    engine.store().stock_of(id).await.unwrap().unwrap()
}

async fn ledger_len(engine: &CheckoutEngine<impl Store>) -> usize {
    engine.store().recent_purchases(usize::MAX).await.unwrap().len()
}

// ─────────────────────────────────────────────────────────────────────────
// Worked examples
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_three_of_five_at_ten() {
    init_tracing();
    let engine = engine(SqliteStore::open_memory().unwrap());
    let ids = seed_catalog(engine.store(), &[("Bronze Vase", 1000, 5)]).await;
    let mut cart = cart_of(&[(ids[0], 3)]);

    let receipt = engine.checkout(CUSTOMER, &mut cart).await.unwrap();

    assert!(cart.is_empty());
    assert_eq!(stock(&engine, ids[0]).await, 2);
    assert_eq!(receipt.purchases.len(), 1);
    let record = &receipt.purchases[0];
    assert_eq!(record.artifact_id, ids[0]);
    assert_eq!(record.quantity.get(), 3);
    assert_eq!(record.total_amount.to_string(), "30.00");
    assert_eq!(record.customer_id, UserId(7));

    let stored = engine.store().purchases_by_customer(UserId(7)).await.unwrap();
    assert_eq!(stored, receipt.purchases);
}

#[tokio::test]
async fn test_ten_of_five_fails() {
    init_tracing();
    let engine = engine(SqliteStore::open_memory().unwrap());
    let ids = seed_catalog(engine.store(), &[("Bronze Vase", 1000, 5)]).await;
    let mut cart = cart_of(&[(ids[0], 10)]);
    let before = cart.clone();

    let err = engine.checkout(CUSTOMER, &mut cart).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("5 left"), "{message}");
    assert!(message.contains("10 requested"), "{message}");
    assert_eq!(cart, before);
    assert_eq!(stock(&engine, ids[0]).await, 5);
    assert_eq!(ledger_len(&engine).await, 0);
}

#[tokio::test]
async fn test_exact_stock_succeeds() {
    let engine = engine(MemoryStore::new());
    let ids = seed_catalog(engine.store(), &[("Mask", 4999, 4)]).await;
    let mut cart = cart_of(&[(ids[0], 4)]);

    let receipt = engine.checkout(CUSTOMER, &mut cart).await.unwrap();

    assert_eq!(stock(&engine, ids[0]).await, 0);
    assert_eq!(receipt.total, Money::from_cents(19996).unwrap());
}

#[tokio::test]
async fn test_empty_cart_twice() {
    let engine = engine(MemoryStore::new());
    let ids = seed_catalog(engine.store(), &[("Mask", 100, 1)]).await;
    let mut cart = cart_of(&[(ids[0], 1)]);

    engine.checkout(CUSTOMER, &mut cart).await.unwrap();
    let err = engine.checkout(CUSTOMER, &mut cart).await.unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert_eq!(ledger_len(&engine).await, 1);
}

#[tokio::test]
async fn test_all_problems_reported() {
    let engine = engine(SqliteStore::open_memory().unwrap());
    let ids = seed_catalog(
        engine.store(),
        &[("Vase", 1000, 5), ("Mask", 500, 1), ("Bust", 700, 9)],
    )
    .await;
    let missing = ArtifactId(9_999);
    let mut cart = cart_of(&[(ids[0], 6), (ids[1], 2), (ids[2], 1), (missing, 1)]);

    let err = engine.checkout(CUSTOMER, &mut cart).await.unwrap_err();

    let problems = err.problems();
    assert_eq!(problems.len(), 3);
    assert!(problems.contains(&Problem::Missing { artifact_id: missing }));
    assert_eq!(
        err.to_string(),
        "checkout failed: \"Vase\" has only 5 left, 6 requested. \
         \"Mask\" has only 1 left, 2 requested. \
         Artifact ID 9999 no longer exists."
    );
    // The satisfiable line was not bought either.
    assert_eq!(stock(&engine, ids[2]).await, 9);
    assert_eq!(cart.len(), 4);
}

#[tokio::test]
async fn test_removed_artifact_is_missing() {
    let engine = engine(MemoryStore::new());
    let ids = seed_catalog(engine.store(), &[("Vase", 1000, 5)]).await;
    let mut cart = cart_of(&[(ids[0], 1)]);
    engine.store().remove_artifact(ids[0]).await.unwrap();

    let err = engine.checkout(CUSTOMER, &mut cart).await.unwrap_err();

    assert_eq!(err.to_string(), format!("checkout failed: Artifact ID {} no longer exists.", ids[0]));
}

#[tokio::test]
async fn test_half_cent_rounds_up() {
    let engine = engine(SqliteStore::open_memory().unwrap());
    let price: Money = "0.125".parse().unwrap();
    let artifact = engine
        .store()
        .insert_artifact(&vmuseum::core::NewArtifact::new("Coin", price, 10))
        .await
        .unwrap();
    let mut cart = cart_of(&[(artifact.artifact_id, 3)]);

    let receipt = engine.checkout(CUSTOMER, &mut cart).await.unwrap();

    // 0.13 after normalization, times 3.
    assert_eq!(receipt.total.to_string(), "0.39");
}

#[tokio::test]
async fn test_line_total_past_cent_range_fails() {
    init_tracing();
    let engine = engine(SqliteStore::open_memory().unwrap());
    let ids = seed_catalog(engine.store(), &[("Crown Jewels", 9_000_000_000_000, 5_000_000)]).await;
    let mut cart = cart_of(&[(ids[0], 4_000_000)]);

    let err = engine.checkout(CUSTOMER, &mut cart).await.unwrap_err();

    assert!(matches!(err, CheckoutError::Pricing(CoreError::AmountOutOfRange(_))), "{err}");
    assert!(!err.is_retryable());
    assert_eq!(cart.len(), 1);
    assert_eq!(stock(&engine, ids[0]).await, 5_000_000);
    assert_eq!(ledger_len(&engine).await, 0);
}

#[tokio::test]
async fn test_receipt_total_past_cent_range_rolls_back() {
    let engine = engine(MemoryStore::new());
    let half = 5_000_000_000_000_000_000;
    let ids = seed_catalog(engine.store(), &[("Left Wing", half, 1), ("Right Wing", half, 1)]).await;
    let mut cart = cart_of(&[(ids[0], 1), (ids[1], 1)]);

    let err = engine.checkout(CUSTOMER, &mut cart).await.unwrap_err();

    assert!(matches!(err, CheckoutError::Pricing(CoreError::AmountOutOfRange(_))), "{err}");
    assert_eq!(stock(&engine, ids[0]).await, 1);
    assert_eq!(stock(&engine, ids[1]).await, 1);
    assert_eq!(ledger_len(&engine).await, 0);
}

#[tokio::test]
async fn test_lines_recorded_in_cart_order() {
    let engine = engine(MemoryStore::new());
    let ids = seed_catalog(engine.store(), &[("A", 100, 5), ("B", 200, 5), ("C", 300, 5)]).await;
    let mut cart = cart_of(&[(ids[2], 1), (ids[0], 2), (ids[1], 3)]);

    let receipt = engine.checkout(CUSTOMER, &mut cart).await.unwrap();

    let order: Vec<ArtifactId> = receipt.purchases.iter().map(|p| p.artifact_id).collect();
    assert_eq!(order, vec![ids[0], ids[1], ids[2]]);
    assert_eq!(receipt.total, Money::from_cents(100 * 2 + 200 * 3 + 300).unwrap());
}

// ─────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────

fn run_scenario<S: Store>(store: S, scenario: &CheckoutScenario) -> Result<(), TestCaseError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let engine = engine(store);
        let items: Vec<(String, i64, u32)> = scenario
            .catalog
            .iter()
            .enumerate()
            .map(|(i, &(cents, stock))| (format!("Artifact {i}"), cents, stock))
            .collect();
        let borrowed: Vec<(&str, i64, u32)> =
            items.iter().map(|(t, c, s)| (t.as_str(), *c, *s)).collect();
        let ids = seed_catalog(engine.store(), &borrowed).await;

        let missing = ArtifactId(1_000_000);
        let mut cart = Cart::new();
        for &(index, qty) in &scenario.cart {
            cart.add(ids.get(index).copied().unwrap_or(missing), i64::from(qty));
        }
        let before = cart.clone();

        let mut stocks_before = Vec::new();
        for &id in &ids {
            stocks_before.push(stock(&engine, id).await);
        }

        let result = engine.checkout(CUSTOMER, &mut cart).await;

        if scenario.fulfillable() {
            let receipt = result.map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(cart.is_empty());
            prop_assert_eq!(receipt.purchases.len(), before.len());
            for (i, &id) in ids.iter().enumerate() {
                let bought = before.quantity_of(id).map_or(0, |q| q.get());
                prop_assert_eq!(stock(&engine, id).await, stocks_before[i] - bought);
            }
        } else {
            let is_validation = matches!(result, Err(CheckoutError::Validation(_)));
            prop_assert!(is_validation);
            prop_assert_eq!(&cart, &before);
            prop_assert_eq!(ledger_len(&engine).await, 0);
            for (i, &id) in ids.iter().enumerate() {
                prop_assert_eq!(stock(&engine, id).await, stocks_before[i]);
            }
        }
        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn checkout_is_all_or_nothing_memory(scenario in checkout_scenario(5)) {
        run_scenario(MemoryStore::new(), &scenario)?;
    }

    #[test]
    fn checkout_is_all_or_nothing_sqlite(scenario in checkout_scenario(5)) {
        run_scenario(SqliteStore::open_memory().unwrap(), &scenario)?;
    }
}
