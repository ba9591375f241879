//! The checkout engine: turns a cart into purchases without overselling.
//!
//! A checkout is a single storage transaction:
//!
//! 1. Lock and read the rows for every artifact in the cart.
//! 2. Validate each entry against the locked snapshot, collecting every
//!    problem.
//! 3. If nothing is wrong, decrement stock and append one purchase record per
//!    entry, in cart order.
//!
//! Any problem, storage error, or failed commit rolls the whole transaction
//! back. The cart is cleared only after a successful commit.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vmuseum_core::{
    validate_stock, ArtifactId, Cart, CartEntry, CoreError, Money, NewPurchase, PaymentMethod,
    PurchaseRecord, UserId,
};
use vmuseum_store::{Store, StoreTx};

use crate::config::CheckoutConfig;
use crate::error::CheckoutError;

/// The outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub customer_id: UserId,
    /// One record per cart entry, in cart order.
    pub purchases: Vec<PurchaseRecord>,
    /// Sum of the line totals.
    pub total: Money,
}

impl Receipt {
    /// Number of units bought across all lines.
    pub fn units(&self) -> u64 {
        self.purchases
            .iter()
            .map(|p| u64::from(p.quantity.get()))
            .sum()
    }
}

/// Executes checkouts against a [`Store`].
///
/// The engine holds no per-customer state; the cart is passed in by the
/// caller and written back by it afterwards.
pub struct CheckoutEngine<S: Store> {
    store: Arc<S>,
    config: CheckoutConfig,
}

impl<S: Store> Clone for CheckoutEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> CheckoutEngine<S> {
    /// Create an engine over a shared store.
    pub fn new(store: Arc<S>, config: CheckoutConfig) -> Self {
        Self { store, config }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Purchase everything in `cart` for `customer`.
    ///
    /// On success the cart is emptied and the receipt lists one purchase per
    /// entry. On failure the cart is untouched and no stock or ledger change
    /// is visible. An empty cart or a missing customer is rejected before any
    /// transaction is opened.
    pub async fn checkout(
        &self,
        customer: Option<UserId>,
        cart: &mut Cart,
    ) -> Result<Receipt, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let Some(customer_id) = customer else {
            tracing::error!("checkout attempted without a customer id in session");
            return Err(CheckoutError::MissingSession);
        };

        let entries = cart.snapshot();
        let payment_method = self.config.payment_method;

        let result = self
            .store
            .with_transaction(move |tx| purchase_all(tx, customer_id, &entries, payment_method))
            .await;

        match result {
            Ok(receipt) => {
                cart.clear();
                tracing::info!(
                    customer = %customer_id,
                    lines = receipt.purchases.len(),
                    total = %receipt.total,
                    "checkout committed"
                );
                Ok(receipt)
            }
            Err(CheckoutError::Validation(problems)) => {
                tracing::warn!(
                    customer = %customer_id,
                    problems = problems.len(),
                    "checkout rejected: {}",
                    vmuseum_core::describe(&problems)
                );
                Err(CheckoutError::Validation(problems))
            }
            Err(err) => {
                tracing::warn!(customer = %customer_id, error = %err, "checkout failed");
                Err(err)
            }
        }
    }
}

/// The transaction body. Returning `Err` rolls everything back.
fn purchase_all(
    tx: &mut dyn StoreTx,
    customer_id: UserId,
    entries: &[CartEntry],
    payment_method: PaymentMethod,
) -> Result<Receipt, CheckoutError> {
    let ids: BTreeSet<ArtifactId> = entries.iter().map(|e| e.artifact_id).collect();

    let snapshot: HashMap<_, _> = tx
        .lock_and_fetch(&ids)?
        .into_iter()
        .map(|row| (row.artifact_id, row))
        .collect();

    let problems = validate_stock(entries, &snapshot);
    if !problems.is_empty() {
        return Err(CheckoutError::Validation(problems));
    }

    let mut purchases = Vec::with_capacity(entries.len());
    let mut total = Money::ZERO;

    for entry in entries {
        // Presence was established by validation.
        let Some(row) = snapshot.get(&entry.artifact_id) else {
            continue;
        };
        let line_total = Money::line_total(row.price, entry.quantity)?;

        tx.decrement_stock(entry.artifact_id, entry.quantity)?;
        let record = tx.record(&NewPurchase {
            customer_id,
            artifact_id: entry.artifact_id,
            quantity: entry.quantity,
            total_amount: line_total,
            payment_method,
        })?;

        total = total
            .checked_add(line_total)
            .ok_or_else(|| CoreError::AmountOutOfRange(format!("{total} + {line_total}")))?;
        purchases.push(record);
    }

    Ok(Receipt {
        customer_id,
        purchases,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmuseum_core::{NewArtifact, Problem, Quantity};
    use vmuseum_store::{MemoryStore, StoreError, StoreExt};

    async fn engine_with(stock: u32, price_cents: i64) -> (CheckoutEngine<MemoryStore>, ArtifactId) {
        let store = MemoryStore::new();
        let artifact = store
            .insert_artifact(&NewArtifact::new(
                "Vase",
                Money::from_cents(price_cents).unwrap(),
                stock,
            ))
            .await
            .unwrap();
        (
            CheckoutEngine::new(Arc::new(store), CheckoutConfig::default()),
            artifact.artifact_id,
        )
    }

    #[tokio::test]
    async fn test_checkout_success() {
        let (engine, id) = engine_with(5, 1000).await;
        let mut cart = Cart::new();
        cart.add(id, 3);

        let receipt = engine.checkout(Some(UserId(1)), &mut cart).await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(receipt.total, Money::from_cents(3000).unwrap());
        assert_eq!(receipt.units(), 3);
        assert_eq!(receipt.purchases[0].payment_method, PaymentMethod::Card);
        assert_eq!(engine.store().stock_of(id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let (engine, _) = engine_with(5, 1000).await;
        let mut cart = Cart::new();

        let err = engine.checkout(Some(UserId(1)), &mut cart).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(engine.store().purchase_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_keeps_cart() {
        let (engine, id) = engine_with(5, 1000).await;
        let mut cart = Cart::new();
        cart.add(id, 1);

        let err = engine.checkout(None, &mut cart).await.unwrap_err();
        assert!(matches!(err, CheckoutError::MissingSession));
        assert_eq!(cart.quantity_of(id), Quantity::new(1));
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let (engine, id) = engine_with(5, 1000).await;
        let mut cart = Cart::new();
        cart.add(id, 10);

        let err = engine.checkout(Some(UserId(1)), &mut cart).await.unwrap_err();
        assert_eq!(
            err.problems(),
            &[Problem::InsufficientStock {
                artifact_id: id,
                title: "Vase".into(),
                available: 5,
                requested: Quantity::new(10).unwrap(),
            }]
        );
        assert_eq!(cart.len(), 1);
        assert_eq!(engine.store().stock_of(id).await.unwrap(), Some(5));
        assert_eq!(engine.store().purchase_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_cart() {
        let (engine, id) = engine_with(5, 1000).await;
        engine.store().inject_commit_failure();
        let mut cart = Cart::new();
        cart.add(id, 2);

        let err = engine.checkout(Some(UserId(1)), &mut cart).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Storage(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert_eq!(cart.len(), 1);
        assert_eq!(engine.store().stock_of(id).await.unwrap(), Some(5));
    }
}
