//! Proptest generators for property-based testing.

use proptest::prelude::*;

use vmuseum_core::{ArtifactId, Money, Quantity};

/// Generate an artifact id.
pub fn artifact_id() -> impl Strategy<Value = ArtifactId> {
    (1i64..=1_000).prop_map(ArtifactId)
}

/// Generate a positive quantity.
pub fn quantity(max: u32) -> impl Strategy<Value = Quantity> {
    (1..=max.max(1)).prop_map(|n| Quantity::new(n).unwrap_or(Quantity::ONE))
}

/// Generate a price up to 10 000.00.
pub fn price() -> impl Strategy<Value = Money> {
    (0i64..=1_000_000).prop_map(|cents| Money::from_cents(cents).unwrap_or(Money::ZERO))
}

/// Generate raw user quantity input, including zero and negatives.
pub fn raw_quantity() -> impl Strategy<Value = i64> {
    prop_oneof![-5i64..=0, 1i64..=20, Just(i64::MAX), Just(i64::MIN)]
}

/// A catalog plus a cart over it.
///
/// `cart` holds `(catalog index, quantity)` pairs; an index at or past
/// `stocks.len()` refers to an artifact that does not exist.
#[derive(Debug, Clone)]
pub struct CheckoutScenario {
    /// `(price in cents, stock)` per catalog artifact.
    pub catalog: Vec<(i64, u32)>,
    pub cart: Vec<(usize, u32)>,
}

impl CheckoutScenario {
    /// Whether every cart line fits its artifact's stock.
    ///
    /// Lines for the same artifact are merged first, as a cart does.
    pub fn fulfillable(&self) -> bool {
        let mut wanted = vec![0u64; self.catalog.len()];
        for &(index, qty) in &self.cart {
            match wanted.get_mut(index) {
                Some(w) => *w += u64::from(qty),
                None => return false,
            }
        }
        wanted
            .iter()
            .zip(&self.catalog)
            .all(|(w, &(_, stock))| *w <= u64::from(stock))
    }
}

/// Generate a checkout scenario with up to `max_items` catalog entries.
pub fn checkout_scenario(max_items: usize) -> impl Strategy<Value = CheckoutScenario> {
    prop::collection::vec((0i64..=50_000, 0u32..=6), 1..=max_items.max(1)).prop_flat_map(
        |catalog| {
            // One slot past the end stands for a missing artifact.
            let slots = catalog.len() + 1;
            let cart = prop::collection::vec((0..slots, 1u32..=6), 1..=slots);
            (Just(catalog), cart).prop_map(|(catalog, cart)| CheckoutScenario { catalog, cart })
        },
    )
}
