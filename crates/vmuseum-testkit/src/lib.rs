//! # Virtual Museum Testkit
//!
//! Testing utilities for the virtual museum marketplace.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: sessions, carts, seeded catalogs, and temporary SQLite files
//! - **Generators**: Proptest strategies for carts and checkout scenarios
//!
//! ## Test Fixtures
//!
//! ```rust
//! use vmuseum_store::MemoryStore;
//! use vmuseum_testkit::fixtures::{cart_of, seed_catalog};
//!
//! # async fn example() {
//! let store = MemoryStore::new();
//! let ids = seed_catalog(&store, &[("Vase", 1000, 5)]).await;
//! let cart = cart_of(&[(ids[0], 3)]);
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vmuseum_testkit::generators::checkout_scenario;
//!
//! proptest! {
//!     #[test]
//!     fn never_oversells(scenario in checkout_scenario(5)) {
//!         // seed scenario.catalog, check out scenario.cart, compare stock
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{admin, artist, cart_of, customer, init_tracing, seed_catalog, TempDb};
pub use generators::{checkout_scenario, CheckoutScenario};
