//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::time::Duration;

use tempfile::TempDir;

use vmuseum_core::{Artifact, ArtifactId, Cart, Money, NewArtifact, Role, Session, UserId};
use vmuseum_store::{SqliteConfig, SqliteStore, Store, StoreExt};

/// Install a fmt subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// A session for a customer.
pub fn customer(id: i64) -> Session {
    Session::new(UserId(id), Role::Customer)
}

/// A session for an artist.
pub fn artist(id: i64) -> Session {
    Session::new(UserId(id), Role::Artist)
}

/// A session for an admin.
pub fn admin(id: i64) -> Session {
    Session::new(UserId(id), Role::Admin)
}

/// Build a cart from `(artifact, quantity)` pairs.
pub fn cart_of(entries: &[(ArtifactId, i64)]) -> Cart {
    let mut cart = Cart::new();
    for &(id, qty) in entries {
        cart.add(id, qty);
    }
    cart
}

/// A catalog item: title, price in cents, stock.
pub type Item<'a> = (&'a str, i64, u32);

/// Insert artifacts into `store` and return their ids in input order.
pub async fn seed_catalog<S: Store>(store: &S, items: &[Item<'_>]) -> Vec<ArtifactId> {
    let artifacts: Vec<NewArtifact> = items
        .iter()
        .map(|&(title, cents, stock)| {
            NewArtifact::new(title, Money::from_cents(cents).expect("non-negative price"), stock)
        })
        .collect();

    store
        .insert_artifacts(&artifacts)
        .await
        .expect("seed catalog")
        .into_iter()
        .map(|a: Artifact| a.artifact_id)
        .collect()
}

/// A SQLite database file in a temporary directory.
///
/// The directory, and the database with it, is removed on drop.
pub struct TempDb {
    pub store: SqliteStore,
    _dir: TempDir,
}

impl TempDb {
    /// Open a fresh database with default settings.
    pub fn new() -> Self {
        Self::with_busy_timeout(Duration::from_secs(5))
    }

    /// Open a fresh database with the given lock wait.
    pub fn with_busy_timeout(timeout: Duration) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = SqliteConfig::file(dir.path().join("museum.db")).busy_timeout(timeout);
        let store = SqliteStore::open_with(config).expect("open sqlite store");
        Self { store, _dir: dir }
    }
}

impl Default for TempDb {
    fn default() -> Self {
        Self::new()
    }
}
