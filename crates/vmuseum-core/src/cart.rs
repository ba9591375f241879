//! The shopping cart: a per-session mapping of artifact to requested quantity.
//!
//! A [`Cart`] is a plain value. The calling layer loads it from session
//! storage, hands it to the checkout engine, and writes it back afterwards.
//! Entries with a quantity of zero or less are never stored.

use std::collections::BTreeMap;
use std::num::IntErrorKind;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ArtifactId, Quantity};

/// Prefix of form fields that carry cart quantities (`qty_<artifact_id>`).
pub const QTY_FIELD_PREFIX: &str = "qty_";

/// One line of a cart snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub artifact_id: ArtifactId,
    pub quantity: Quantity,
}

/// Artifact -> quantity mapping with unique keys.
///
/// Iteration order is ascending artifact id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    entries: BTreeMap<ArtifactId, Quantity>,
}

impl Cart {
    /// Create an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add units of an artifact.
    ///
    /// `raw_qty` is coerced to at least 1 and added to any existing quantity.
    pub fn add(&mut self, artifact_id: ArtifactId, raw_qty: i64) {
        let qty = Quantity::from_raw(raw_qty).unwrap_or(Quantity::ONE);
        self.entries
            .entry(artifact_id)
            .and_modify(|q| *q = q.saturating_add(qty))
            .or_insert(qty);
    }

    /// Set quantities from raw user input.
    ///
    /// Unparsable quantities are ignored; quantities `<= 0` remove the entry.
    /// Integers too large for `i64` still count by their sign.
    pub fn update<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (ArtifactId, S)>,
        S: AsRef<str>,
    {
        for (artifact_id, raw) in entries {
            let parsed = match raw.as_ref().trim().parse::<i64>() {
                Ok(n) => n,
                Err(e) => match e.kind() {
                    IntErrorKind::PosOverflow => i64::MAX,
                    IntErrorKind::NegOverflow => i64::MIN,
                    _ => continue,
                },
            };
            match Quantity::from_raw(parsed) {
                Some(qty) => {
                    self.entries.insert(artifact_id, qty);
                }
                None => {
                    self.entries.remove(&artifact_id);
                }
            }
        }
    }

    /// Apply submitted form fields.
    ///
    /// Only `qty_<artifact_id>` fields are considered; others, and fields
    /// whose id does not parse, are skipped.
    pub fn update_form<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let parsed: Vec<(ArtifactId, V)> = fields
            .into_iter()
            .filter_map(|(key, value)| {
                let id = key
                    .as_ref()
                    .strip_prefix(QTY_FIELD_PREFIX)?
                    .parse::<ArtifactId>()
                    .ok()?;
                Some((id, value))
            })
            .collect();
        self.update(parsed);
    }

    /// Remove an artifact from the cart.
    pub fn remove(&mut self, artifact_id: ArtifactId) -> Option<Quantity> {
        self.entries.remove(&artifact_id)
    }

    /// Quantity currently requested for an artifact.
    pub fn quantity_of(&self, artifact_id: ArtifactId) -> Option<Quantity> {
        self.entries.get(&artifact_id).copied()
    }

    /// Immutable copy of the current entries.
    pub fn snapshot(&self) -> Vec<CartEntry> {
        self.entries
            .iter()
            .map(|(&artifact_id, &quantity)| CartEntry { artifact_id, quantity })
            .collect()
    }

    /// Artifact ids in the cart.
    pub fn artifact_ids(&self) -> impl Iterator<Item = ArtifactId> + '_ {
        self.entries.keys().copied()
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode the session representation (`{"<artifact_id>": qty, ...}`).
    ///
    /// Entries with a quantity `<= 0` are dropped.
    pub fn from_session_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<ArtifactId, i64> = serde_json::from_str(json)?;
        Ok(raw
            .into_iter()
            .filter_map(|(id, qty)| Quantity::from_raw(qty).map(|q| (id, q)))
            .collect())
    }

    /// Encode to the session representation.
    pub fn to_session_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}

impl FromIterator<(ArtifactId, Quantity)> for Cart {
    fn from_iter<T: IntoIterator<Item = (ArtifactId, Quantity)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
