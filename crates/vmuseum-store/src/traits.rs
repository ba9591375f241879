//! Store traits: the abstract interface for inventory and purchase persistence.
//!
//! Mutations of stock and the purchase ledger only happen inside
//! [`Store::with_transaction`], through a [`StoreTx`] handle. Everything else
//! on [`Store`] is catalog management or snapshot reads.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vmuseum_core::{
    Artifact, ArtifactId, ArtifactStock, NewArtifact, NewPurchase, PurchaseRecord, Quantity, UserId,
};

use crate::error::{Result, StoreError};

/// Stock access inside a transaction.
pub trait InventoryRepository {
    /// Read and lock the rows for `ids`.
    ///
    /// Locks are held until the transaction ends, so concurrent checkouts over
    /// overlapping ids serialize here. Ids with no row are simply absent from
    /// the result.
    fn lock_and_fetch(&mut self, ids: &BTreeSet<ArtifactId>) -> Result<Vec<ArtifactStock>>;

    /// Subtract `qty` from an artifact's stock.
    ///
    /// Must only be called after a `lock_and_fetch` covering `artifact_id`
    /// showed at least `qty` units. A decrement below zero is a
    /// [`StoreError::Constraint`].
    fn decrement_stock(&mut self, artifact_id: ArtifactId, qty: Quantity) -> Result<()>;
}

/// Append-only purchase ledger inside a transaction.
pub trait PurchaseLedger {
    /// Append one purchase line item.
    fn record(&mut self, purchase: &NewPurchase) -> Result<PurchaseRecord>;
}

/// Everything a transaction handle offers.
pub trait StoreTx: InventoryRepository + PurchaseLedger {}

impl<T: InventoryRepository + PurchaseLedger + ?Sized> StoreTx for T {}

/// Filter for catalog listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactQuery {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    /// Exact type label.
    pub kind: Option<String>,
    /// Only artifacts uploaded by this artist.
    pub artist_id: Option<UserId>,
    /// Only artifacts with stock > 0.
    pub in_stock_only: bool,
}

impl ArtifactQuery {
    /// All artifacts.
    pub fn all() -> Self {
        Self::default()
    }

    /// Artifacts a customer can currently buy.
    pub fn available() -> Self {
        Self {
            in_stock_only: true,
            ..Self::default()
        }
    }

    /// Artifacts owned by an artist.
    pub fn by_artist(artist_id: UserId) -> Self {
        Self {
            artist_id: Some(artist_id),
            ..Self::default()
        }
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Whether an artifact passes this filter.
    pub fn matches(&self, artifact: &Artifact) -> bool {
        if self.in_stock_only && !artifact.in_stock() {
            return false;
        }
        if let Some(artist) = self.artist_id {
            if artifact.artist_id != Some(artist) {
                return false;
            }
        }
        if let Some(kind) = self.kind.as_deref().filter(|k| !k.is_empty()) {
            if artifact.kind != kind {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !artifact.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Result of removing an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The row was deleted.
    Deleted,
    /// Purchases reference it, so its stock was set to zero instead.
    Archived,
    /// No such artifact.
    NotFound,
}

/// The Store trait: async interface for marketplace persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Run `f` inside one transaction.
    ///
    /// Commits only when `f` returns `Ok`. On `Err`, or if `f` panics, the
    /// transaction is rolled back and none of its writes are observable. A
    /// failed commit is reported as a [`StoreError`] converted into `E`.
    async fn with_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static;

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new artifact.
    async fn insert_artifact(&self, artifact: &NewArtifact) -> Result<Artifact>;

    /// Get an artifact by id.
    async fn get_artifact(&self, id: ArtifactId) -> Result<Option<Artifact>>;

    /// Non-locking read of several artifacts. Missing ids are absent.
    ///
    /// The result is a snapshot for display; it must not be used to decide
    /// whether a purchase can go through.
    async fn fetch_artifacts(&self, ids: &BTreeSet<ArtifactId>) -> Result<Vec<Artifact>>;

    /// List artifacts matching `query`, newest first.
    async fn list_artifacts(&self, query: &ArtifactQuery) -> Result<Vec<Artifact>>;

    /// Distinct type labels, sorted.
    async fn list_kinds(&self) -> Result<Vec<String>>;

    /// Delete an artifact, or archive it if purchases reference it.
    async fn remove_artifact(&self, id: ArtifactId) -> Result<RemoveOutcome>;

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger reads
    // ─────────────────────────────────────────────────────────────────────────

    /// A customer's purchases, newest first.
    async fn purchases_by_customer(&self, customer_id: UserId) -> Result<Vec<PurchaseRecord>>;

    /// The most recent purchases across all customers, newest first.
    async fn recent_purchases(&self, limit: usize) -> Result<Vec<PurchaseRecord>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Insert several artifacts, returning them in input order.
    fn insert_artifacts(
        &self,
        artifacts: &[NewArtifact],
    ) -> impl std::future::Future<Output = Result<Vec<Artifact>>> + Send;

    /// Stock of an artifact, if it exists.
    fn stock_of(&self, id: ArtifactId) -> impl std::future::Future<Output = Result<Option<u32>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn insert_artifacts(&self, artifacts: &[NewArtifact]) -> Result<Vec<Artifact>> {
        let mut inserted = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            inserted.push(self.insert_artifact(artifact).await?);
        }
        Ok(inserted)
    }

    async fn stock_of(&self, id: ArtifactId) -> Result<Option<u32>> {
        Ok(self.get_artifact(id).await?.map(|a| a.stock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vmuseum_core::Money;

    fn artifact(title: &str, kind: &str, stock: u32, artist: Option<i64>) -> Artifact {
        Artifact {
            artifact_id: ArtifactId(1),
            artist_id: artist.map(UserId),
            museum_id: None,
            title: title.to_string(),
            description: String::new(),
            kind: kind.to_string(),
            price: Money::ZERO,
            stock,
            created_at: 0,
        }
    }

    #[test]
    fn test_query_matches() {
        let a = artifact("Golden Death Mask", "Mask", 2, Some(5));

        assert!(ArtifactQuery::all().matches(&a));
        assert!(ArtifactQuery::available().search("death").matches(&a));
        assert!(ArtifactQuery::available().kind("Mask").matches(&a));
        assert!(!ArtifactQuery::available().kind("Vase").matches(&a));
        assert!(ArtifactQuery::by_artist(UserId(5)).matches(&a));
        assert!(!ArtifactQuery::by_artist(UserId(6)).matches(&a));
    }

    #[test]
    fn test_query_stock_and_blank_filters() {
        let sold_out = artifact("Urn", "Vase", 0, None);

        assert!(!ArtifactQuery::available().matches(&sold_out));
        assert!(ArtifactQuery::all().search("  ").kind("").matches(&sold_out));
    }

    proptest! {
        #[test]
        fn available_matches_iff_in_stock(stock in 0u32..5, title in "[a-zA-Z ]{0,12}") {
            let a = artifact(&title, "Other", stock, None);
            prop_assert!(ArtifactQuery::all().matches(&a));
            prop_assert_eq!(ArtifactQuery::available().matches(&a), stock > 0);
        }

        #[test]
        fn search_is_case_insensitive(title in "[a-z]{1,12}") {
            let a = artifact(&title, "Other", 1, None);
            prop_assert!(ArtifactQuery::all().search(title.to_uppercase()).matches(&a));
        }
    }
}
