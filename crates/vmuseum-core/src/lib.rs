//! # Virtual Museum Core
//!
//! Pure types for the virtual museum marketplace: carts, money, artifacts,
//! purchases, sessions, and stock validation.
//!
//! This crate contains no I/O and no storage. Everything here is plain data
//! and computation over it.
//!
//! ## Key Types
//!
//! - [`Cart`] - Per-session mapping of artifact to requested quantity
//! - [`Money`] - Fixed-point amount rounded half-up to cents
//! - [`ArtifactStock`] - Price and stock of an artifact as read under lock
//! - [`PurchaseRecord`] - Immutable purchase line item
//! - [`Problem`] - Why a cart entry cannot be fulfilled

pub mod artifact;
pub mod cart;
pub mod error;
pub mod money;
pub mod session;
pub mod types;
pub mod validation;

pub use artifact::{Artifact, ArtifactStock, NewArtifact, NewPurchase, PaymentMethod, PurchaseRecord};
pub use cart::{Cart, CartEntry};
pub use error::{CoreError, Result};
pub use money::Money;
pub use session::{Role, Session};
pub use types::{ArtifactId, MuseumId, PurchaseId, Quantity, UserId};
pub use validation::{describe, validate_stock, Problem};
