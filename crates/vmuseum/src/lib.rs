//! # Virtual Museum Marketplace
//!
//! Cart checkout for a virtual museum shop, with inventory decremented and
//! purchases recorded in one transaction so concurrent buyers can never
//! oversell an artifact.
//!
//! ## Overview
//!
//! - **Cart**: a per-session artifact -> quantity map, passed in explicitly
//! - **Checkout**: lock the cart's artifacts, validate every line, then
//!   decrement stock and append purchase records, or change nothing at all
//! - **Marketplace**: role-checked entry points (customer cart and history,
//!   artist uploads, admin transactions)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vmuseum::{Marketplace, MarketConfig};
//! use vmuseum::core::{ArtifactId, Cart, Role, Session, UserId};
//! use vmuseum::store::SqliteStore;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let store = SqliteStore::open("museum.db")?;
//!     let market = Marketplace::new(store, MarketConfig::default());
//!
//!     let session = Session::new(UserId(7), Role::Customer);
//!     let mut cart = Cart::new();
//!     market.add_to_cart(&session, &mut cart, ArtifactId(42), 3)?;
//!
//!     let receipt = market.checkout(&session, &mut cart).await?;
//!     println!("paid {}", receipt.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vmuseum::core` - Cart, money, artifacts, sessions, validation
//! - `vmuseum::store` - Storage traits, SQLite and in-memory backends

pub mod checkout;
pub mod config;
pub mod error;
pub mod marketplace;

// Re-export component crates
pub use vmuseum_core as core;
pub use vmuseum_store as store;

pub use checkout::{CheckoutEngine, Receipt};
pub use config::{CheckoutConfig, MarketConfig};
pub use error::{CheckoutError, MarketError, Result};
pub use marketplace::{CartLine, CartView, CatalogFilter, Marketplace};

// Re-export commonly used core types
pub use vmuseum_core::{
    Artifact, ArtifactId, Cart, Money, PaymentMethod, Problem, PurchaseRecord, Quantity, Role,
    Session, UserId,
};
