//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use vmuseum_core::{
    Artifact, ArtifactId, ArtifactStock, NewArtifact, NewPurchase, PurchaseId, PurchaseRecord,
    Quantity, UserId,
};

use crate::error::{Result, StoreError};
use crate::now_millis;
use crate::traits::{ArtifactQuery, InventoryRepository, PurchaseLedger, RemoveOutcome, Store, StoreTx};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Transactions hold a
/// store-wide lock for their whole duration, so they run one at a time.
/// Clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
    fail_next_commit: Arc<AtomicBool>,
}

#[derive(Default)]
struct MemoryStoreInner {
    artifacts: BTreeMap<ArtifactId, Artifact>,
    purchases: Vec<PurchaseRecord>,
    last_artifact_id: i64,
    last_purchase_id: i64,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner::default())),
            fail_next_commit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make the next transaction commit fail with [`StoreError::Unavailable`].
    ///
    /// The failed transaction's writes are discarded.
    pub fn inject_commit_failure(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of purchase records in the ledger.
    pub fn purchase_count(&self) -> usize {
        lock(&self.inner).purchases.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// Writes are staged and applied in one step that runs no caller code, so a
// poisoned lock never guards half-applied state.
fn lock(inner: &Mutex<MemoryStoreInner>) -> MutexGuard<'_, MemoryStoreInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transaction handle: reads through to the store, buffers writes.
struct MemoryTx<'a> {
    base: &'a MemoryStoreInner,
    stock: BTreeMap<ArtifactId, u32>,
    purchases: Vec<PurchaseRecord>,
    last_purchase_id: i64,
}

impl MemoryTx<'_> {
    fn current_stock(&self, id: ArtifactId) -> Option<u32> {
        self.stock
            .get(&id)
            .copied()
            .or_else(|| self.base.artifacts.get(&id).map(|a| a.stock))
    }
}

impl InventoryRepository for MemoryTx<'_> {
    fn lock_and_fetch(&mut self, ids: &BTreeSet<ArtifactId>) -> Result<Vec<ArtifactStock>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.base.artifacts.get(id))
            .map(|artifact| {
                let mut row = artifact.to_stock();
                row.stock = self.current_stock(artifact.artifact_id).unwrap_or(row.stock);
                row
            })
            .collect())
    }

    fn decrement_stock(&mut self, artifact_id: ArtifactId, qty: Quantity) -> Result<()> {
        let current = self
            .current_stock(artifact_id)
            .ok_or(StoreError::NotFound(artifact_id))?;
        let remaining = current.checked_sub(qty.get()).ok_or_else(|| {
            StoreError::Constraint(format!(
                "stock of artifact {} would go negative ({} - {})",
                artifact_id, current, qty
            ))
        })?;
        self.stock.insert(artifact_id, remaining);
        Ok(())
    }
}

impl PurchaseLedger for MemoryTx<'_> {
    fn record(&mut self, purchase: &NewPurchase) -> Result<PurchaseRecord> {
        if !self.base.artifacts.contains_key(&purchase.artifact_id) {
            return Err(StoreError::Constraint(format!(
                "purchase references unknown artifact {}",
                purchase.artifact_id
            )));
        }
        self.last_purchase_id += 1;
        let record = PurchaseRecord::from_new(PurchaseId(self.last_purchase_id), purchase, now_millis());
        self.purchases.push(record.clone());
        Ok(record)
    }
}

fn newest_first_artifacts(artifacts: &mut [Artifact]) {
    artifacts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.artifact_id.cmp(&a.artifact_id))
    });
}

fn newest_first_purchases(purchases: &mut [PurchaseRecord]) {
    purchases.sort_by(|a, b| {
        b.purchased_at
            .cmp(&a.purchased_at)
            .then(b.purchase_id.cmp(&a.purchase_id))
    });
}

#[async_trait]
impl Store for MemoryStore {
    async fn with_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let fail_commit = Arc::clone(&self.fail_next_commit);

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&inner);
            tracing::debug!("transaction opened");

            let mut tx = MemoryTx {
                base: &guard,
                stock: BTreeMap::new(),
                purchases: Vec::new(),
                last_purchase_id: guard.last_purchase_id,
            };

            let value = match f(&mut tx) {
                Ok(value) => value,
                Err(err) => {
                    tracing::debug!("transaction rolled back");
                    return Err(err);
                }
            };

            let MemoryTx {
                stock,
                purchases,
                last_purchase_id,
                ..
            } = tx;

            if fail_commit.swap(false, Ordering::SeqCst) {
                tracing::warn!("commit failed");
                return Err(E::from(StoreError::Unavailable("commit refused".into())));
            }

            for (id, remaining) in stock {
                if let Some(artifact) = guard.artifacts.get_mut(&id) {
                    artifact.stock = remaining;
                }
            }
            guard.purchases.extend(purchases);
            guard.last_purchase_id = last_purchase_id;
            tracing::debug!("transaction committed");

            Ok(value)
        })
        .await
        .map_err(|e| E::from(StoreError::Task(e.to_string())))?
    }

    async fn insert_artifact(&self, artifact: &NewArtifact) -> Result<Artifact> {
        let mut inner = lock(&self.inner);

        inner.last_artifact_id += 1;
        let stored = Artifact {
            artifact_id: ArtifactId(inner.last_artifact_id),
            artist_id: artifact.artist_id,
            museum_id: artifact.museum_id,
            title: artifact.title.clone(),
            description: artifact.description.clone(),
            kind: artifact.kind.clone(),
            price: artifact.price,
            stock: artifact.stock,
            created_at: now_millis(),
        };
        inner.artifacts.insert(stored.artifact_id, stored.clone());

        Ok(stored)
    }

    async fn get_artifact(&self, id: ArtifactId) -> Result<Option<Artifact>> {
        Ok(lock(&self.inner).artifacts.get(&id).cloned())
    }

    async fn fetch_artifacts(&self, ids: &BTreeSet<ArtifactId>) -> Result<Vec<Artifact>> {
        let inner = lock(&self.inner);
        Ok(ids
            .iter()
            .filter_map(|id| inner.artifacts.get(id).cloned())
            .collect())
    }

    async fn list_artifacts(&self, query: &ArtifactQuery) -> Result<Vec<Artifact>> {
        let inner = lock(&self.inner);
        let mut artifacts: Vec<Artifact> = inner
            .artifacts
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        newest_first_artifacts(&mut artifacts);
        Ok(artifacts)
    }

    async fn list_kinds(&self) -> Result<Vec<String>> {
        let inner = lock(&self.inner);
        let kinds: BTreeSet<String> = inner.artifacts.values().map(|a| a.kind.clone()).collect();
        Ok(kinds.into_iter().collect())
    }

    async fn remove_artifact(&self, id: ArtifactId) -> Result<RemoveOutcome> {
        let mut inner = lock(&self.inner);

        if !inner.artifacts.contains_key(&id) {
            return Ok(RemoveOutcome::NotFound);
        }

        if inner.purchases.iter().any(|p| p.artifact_id == id) {
            if let Some(artifact) = inner.artifacts.get_mut(&id) {
                artifact.stock = 0;
            }
            Ok(RemoveOutcome::Archived)
        } else {
            inner.artifacts.remove(&id);
            Ok(RemoveOutcome::Deleted)
        }
    }

    async fn purchases_by_customer(&self, customer_id: UserId) -> Result<Vec<PurchaseRecord>> {
        let inner = lock(&self.inner);
        let mut purchases: Vec<PurchaseRecord> = inner
            .purchases
            .iter()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect();
        newest_first_purchases(&mut purchases);
        Ok(purchases)
    }

    async fn recent_purchases(&self, limit: usize) -> Result<Vec<PurchaseRecord>> {
        let inner = lock(&self.inner);
        let mut purchases = inner.purchases.clone();
        newest_first_purchases(&mut purchases);
        purchases.truncate(limit);
        Ok(purchases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmuseum_core::{Money, PaymentMethod};

    fn purchase(artifact_id: ArtifactId, qty: u32) -> NewPurchase {
        NewPurchase {
            customer_id: UserId(1),
            artifact_id,
            quantity: Quantity::new(qty).unwrap(),
            total_amount: Money::from_cents(100 * i64::from(qty)).unwrap(),
            payment_method: PaymentMethod::Card,
        }
    }

    async fn seeded() -> (MemoryStore, ArtifactId) {
        let store = MemoryStore::new();
        let artifact = store
            .insert_artifact(&NewArtifact::new("Mask", Money::from_cents(100).unwrap(), 3))
            .await
            .unwrap();
        (store, artifact.artifact_id)
    }

    #[tokio::test]
    async fn test_memory_store_commit() {
        let (store, id) = seeded().await;

        store
            .with_transaction(move |tx| {
                tx.decrement_stock(id, Quantity::new(2).unwrap())?;
                tx.record(&purchase(id, 2))
            })
            .await
            .unwrap();

        assert_eq!(store.get_artifact(id).await.unwrap().unwrap().stock, 1);
        assert_eq!(store.purchase_count(), 1);
    }

    #[tokio::test]
    async fn test_reads_see_staged_writes() {
        let (store, id) = seeded().await;

        let seen = store
            .with_transaction(move |tx| {
                tx.decrement_stock(id, Quantity::ONE)?;
                let rows = tx.lock_and_fetch(&BTreeSet::from([id]))?;
                Ok::<_, StoreError>(rows[0].stock)
            })
            .await
            .unwrap();

        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn test_memory_store_rollback() {
        let (store, id) = seeded().await;

        let result: Result<()> = store
            .with_transaction(move |tx| {
                tx.decrement_stock(id, Quantity::ONE)?;
                tx.record(&purchase(id, 1))?;
                tx.decrement_stock(id, Quantity::new(5).unwrap())
            })
            .await;

        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert_eq!(store.get_artifact(id).await.unwrap().unwrap().stock, 3);
        assert_eq!(store.purchase_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_commit_failure_discards_writes() {
        let (store, id) = seeded().await;
        store.inject_commit_failure();

        let result = store
            .with_transaction(move |tx| tx.decrement_stock(id, Quantity::ONE))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.get_artifact(id).await.unwrap().unwrap().stock, 3);

        // One-shot.
        store
            .with_transaction(move |tx| tx.decrement_stock(id, Quantity::ONE))
            .await
            .unwrap();
        assert_eq!(store.get_artifact(id).await.unwrap().unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_remove_archives_purchased() {
        let (store, id) = seeded().await;
        let other = store
            .insert_artifact(&NewArtifact::new("Urn", Money::ZERO, 1))
            .await
            .unwrap();
        store
            .with_transaction(move |tx| tx.record(&purchase(id, 1)))
            .await
            .unwrap();

        assert_eq!(store.remove_artifact(id).await.unwrap(), RemoveOutcome::Archived);
        assert_eq!(store.remove_artifact(other.artifact_id).await.unwrap(), RemoveOutcome::Deleted);
        assert_eq!(store.remove_artifact(other.artifact_id).await.unwrap(), RemoveOutcome::NotFound);
        assert_eq!(store.get_artifact(id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_record_unknown_artifact_rejected() {
        let store = MemoryStore::new();
        let result = store
            .with_transaction(|tx| tx.record(&purchase(ArtifactId(5), 1)))
            .await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }
}
