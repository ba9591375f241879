//! # Virtual Museum Store
//!
//! Storage abstraction for the marketplace. Provides a trait-based interface
//! for artifact stock and the purchase ledger, with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! Stock is only ever changed inside [`Store::with_transaction`]. The closure
//! passed to it receives a [`StoreTx`] handle combining the
//! [`InventoryRepository`] (locking reads, stock decrements) and the
//! [`PurchaseLedger`] (append-only purchase records). The transaction commits
//! when the closure returns `Ok` and rolls back otherwise.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`ArtifactQuery`] - Catalog listing filter
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::BTreeSet;
//! use vmuseum_core::{ArtifactId, Quantity};
//! use vmuseum_store::{SqliteStore, Store, StoreError};
//!
//! async fn example() -> Result<(), StoreError> {
//!     let store = SqliteStore::open("museum.db")?;
//!
//!     let ids: BTreeSet<ArtifactId> = [ArtifactId(42)].into_iter().collect();
//!     store
//!         .with_transaction(move |tx| {
//!             let rows = tx.lock_and_fetch(&ids)?;
//!             if let Some(row) = rows.first() {
//!                 if row.stock > 0 {
//!                     tx.decrement_stock(row.artifact_id, Quantity::ONE)?;
//!                 }
//!             }
//!             Ok::<_, StoreError>(())
//!         })
//!         .await
//! }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use config::SqliteConfig;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    ArtifactQuery, InventoryRepository, PurchaseLedger, RemoveOutcome, Store, StoreExt, StoreTx,
};

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
