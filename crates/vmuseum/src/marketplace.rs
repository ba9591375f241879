//! The Marketplace: role-checked entry points for the request layer.
//!
//! Each method takes the caller's [`Session`] and enforces the role the
//! operation needs before touching the store. Carts are explicit values the
//! caller loads from and saves to its session storage.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vmuseum_core::{
    Artifact, ArtifactId, Cart, CoreError, Money, NewArtifact, PurchaseRecord, Quantity, Role,
    Session, UserId,
};
use vmuseum_store::{ArtifactQuery, RemoveOutcome, Store};

use crate::checkout::{CheckoutEngine, Receipt};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};

/// Catalog filter as submitted by a browse form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFilter {
    /// Case-insensitive title substring. Blank means no filter.
    pub search: String,
    /// Exact type label. Blank means no filter.
    pub kind: String,
}

impl CatalogFilter {
    fn apply(&self, query: ArtifactQuery) -> ArtifactQuery {
        query.search(self.search.trim()).kind(self.kind.trim())
    }
}

/// One priced line of a cart view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub artifact_id: ArtifactId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: Quantity,
    pub subtotal: Money,
}

/// A cart priced from a non-locking catalog read.
///
/// For display only: stock may change before checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Money,
}

/// The marketplace facade.
pub struct Marketplace<S: Store> {
    store: Arc<S>,
    engine: CheckoutEngine<S>,
    config: MarketConfig,
}

impl<S: Store> Marketplace<S> {
    /// Create a marketplace over `store`.
    pub fn new(store: S, config: MarketConfig) -> Self {
        let store = Arc::new(store);
        let engine = CheckoutEngine::new(Arc::clone(&store), config.checkout.clone());
        Self {
            store,
            engine,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the checkout engine.
    pub fn engine(&self) -> &CheckoutEngine<S> {
        &self.engine
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cart
    // ─────────────────────────────────────────────────────────────────────────

    /// Add units of an artifact to the cart. Quantities below 1 count as 1.
    pub fn add_to_cart(
        &self,
        session: &Session,
        cart: &mut Cart,
        artifact_id: ArtifactId,
        raw_qty: i64,
    ) -> Result<()> {
        require_role(session, Role::Customer)?;
        cart.add(artifact_id, raw_qty);
        Ok(())
    }

    /// Apply `qty_<id>` form fields to the cart.
    pub fn update_cart<I, K, V>(&self, session: &Session, cart: &mut Cart, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        require_role(session, Role::Customer)?;
        cart.update_form(fields);
        Ok(())
    }

    /// Price the cart for display. Entries no longer in the catalog are skipped.
    pub async fn view_cart(&self, session: &Session, cart: &Cart) -> Result<CartView> {
        require_role(session, Role::Customer)?;
        if cart.is_empty() {
            return Ok(CartView::default());
        }

        let ids: BTreeSet<ArtifactId> = cart.artifact_ids().collect();
        let artifacts = self.store.fetch_artifacts(&ids).await?;

        let mut view = CartView::default();
        for entry in cart.snapshot() {
            let Some(artifact) = artifacts.iter().find(|a| a.artifact_id == entry.artifact_id) else {
                continue;
            };
            let subtotal = Money::line_total(artifact.price, entry.quantity)?;
            view.total = view
                .total
                .checked_add(subtotal)
                .ok_or_else(|| CoreError::AmountOutOfRange(format!("{} + {subtotal}", view.total)))?;
            view.lines.push(CartLine {
                artifact_id: entry.artifact_id,
                title: artifact.title.clone(),
                unit_price: artifact.price,
                quantity: entry.quantity,
                subtotal,
            });
        }

        Ok(view)
    }

    /// Purchase the cart. See [`CheckoutEngine::checkout`].
    pub async fn checkout(&self, session: &Session, cart: &mut Cart) -> Result<Receipt> {
        require_role(session, Role::Customer)?;
        Ok(self.engine.checkout(session.user_id, cart).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    /// In-stock artifacts matching `filter`, newest first.
    pub async fn browse(&self, filter: &CatalogFilter) -> Result<Vec<Artifact>> {
        let query = filter.apply(ArtifactQuery::available());
        Ok(self.store.list_artifacts(&query).await?)
    }

    /// Distinct artifact type labels.
    pub async fn kinds(&self) -> Result<Vec<String>> {
        Ok(self.store.list_kinds().await?)
    }

    /// The calling artist's own artifacts matching `filter`, newest first.
    pub async fn artist_artifacts(
        &self,
        session: &Session,
        filter: &CatalogFilter,
    ) -> Result<Vec<Artifact>> {
        let artist_id = require_user(session, Role::Artist)?;
        let query = filter.apply(ArtifactQuery::by_artist(artist_id));
        Ok(self.store.list_artifacts(&query).await?)
    }

    /// Every artifact, newest first. Admin only.
    pub async fn all_artifacts(&self, session: &Session) -> Result<Vec<Artifact>> {
        require_role(session, Role::Admin)?;
        Ok(self.store.list_artifacts(&ArtifactQuery::all()).await?)
    }

    /// Upload an artifact owned by the calling artist.
    pub async fn create_artifact(&self, session: &Session, artifact: NewArtifact) -> Result<Artifact> {
        let artist_id = require_user(session, Role::Artist)?;

        let title = artifact.title.trim().to_string();
        if title.is_empty() {
            return Err(MarketError::Invalid("title must not be empty".into()));
        }

        let artifact = NewArtifact {
            title,
            description: artifact.description.trim().to_string(),
            ..artifact
        }
        .artist(artist_id);

        let stored = self.store.insert_artifact(&artifact).await?;
        tracing::info!(artifact = %stored.artifact_id, artist = %artist_id, "artifact uploaded");
        Ok(stored)
    }

    /// Remove an artifact.
    ///
    /// Admins may remove any artifact, artists only their own. An artifact
    /// with purchases is archived (stock set to zero) rather than deleted.
    pub async fn remove_artifact(&self, session: &Session, id: ArtifactId) -> Result<RemoveOutcome> {
        match session.role {
            Some(Role::Admin) => {}
            Some(Role::Artist) => {
                let artist_id = require_user(session, Role::Artist)?;
                let artifact = self
                    .store
                    .get_artifact(id)
                    .await?
                    .ok_or(MarketError::ArtifactNotFound(id))?;
                if artifact.artist_id != Some(artist_id) {
                    tracing::warn!(artifact = %id, artist = %artist_id, "removal by non-owner refused");
                    return Err(MarketError::NotOwner(id));
                }
            }
            actual => {
                return Err(MarketError::Unauthorized {
                    required: Role::Artist,
                    actual,
                })
            }
        }

        match self.store.remove_artifact(id).await? {
            RemoveOutcome::NotFound => Err(MarketError::ArtifactNotFound(id)),
            outcome => {
                tracing::info!(artifact = %id, ?outcome, "artifact removed");
                Ok(outcome)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger
    // ─────────────────────────────────────────────────────────────────────────

    /// Most recent purchases across all customers. Admin only.
    pub async fn transactions(&self, session: &Session) -> Result<Vec<PurchaseRecord>> {
        require_role(session, Role::Admin)?;
        Ok(self
            .store
            .recent_purchases(self.config.transactions_limit)
            .await?)
    }

    /// The calling customer's purchases, newest first.
    pub async fn purchase_history(&self, session: &Session) -> Result<Vec<PurchaseRecord>> {
        let customer_id = require_user(session, Role::Customer)?;
        Ok(self.store.purchases_by_customer(customer_id).await?)
    }
}

fn require_role(session: &Session, required: Role) -> Result<()> {
    if session.has_role(required) {
        Ok(())
    } else {
        Err(MarketError::Unauthorized {
            required,
            actual: session.role,
        })
    }
}

fn require_user(session: &Session, required: Role) -> Result<UserId> {
    require_role(session, required)?;
    session.user_id.ok_or(MarketError::Unauthorized {
        required,
        actual: session.role,
    })
}
