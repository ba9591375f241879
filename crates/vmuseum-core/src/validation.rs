//! Stock validation: checking a cart snapshot against locked inventory rows.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactStock;
use crate::cart::CartEntry;
use crate::types::{ArtifactId, Quantity};

/// A single reason a cart cannot be purchased as requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Problem {
    /// The artifact was removed from the catalog.
    Missing { artifact_id: ArtifactId },

    /// Fewer units remain than were requested.
    InsufficientStock {
        artifact_id: ArtifactId,
        title: String,
        available: u32,
        requested: Quantity,
    },
}

impl Problem {
    /// The artifact this problem concerns.
    pub fn artifact_id(&self) -> ArtifactId {
        match self {
            Problem::Missing { artifact_id } | Problem::InsufficientStock { artifact_id, .. } => {
                *artifact_id
            }
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing { artifact_id } => {
                write!(f, "Artifact ID {} no longer exists.", artifact_id)
            }
            Problem::InsufficientStock {
                title,
                available,
                requested,
                ..
            } => write!(f, "\"{}\" has only {} left, {} requested.", title, available, requested),
        }
    }
}

/// Validate every cart entry against a snapshot of locked rows.
///
/// All problems are collected; an empty result means every entry can be
/// fulfilled. Requesting exactly the remaining stock is allowed.
pub fn validate_stock(
    entries: &[CartEntry],
    snapshot: &HashMap<ArtifactId, ArtifactStock>,
) -> Vec<Problem> {
    entries
        .iter()
        .filter_map(|entry| match snapshot.get(&entry.artifact_id) {
            None => Some(Problem::Missing {
                artifact_id: entry.artifact_id,
            }),
            Some(row) if entry.quantity.get() > row.stock => Some(Problem::InsufficientStock {
                artifact_id: entry.artifact_id,
                title: row.title.clone(),
                available: row.stock,
                requested: entry.quantity,
            }),
            Some(_) => None,
        })
        .collect()
}

/// Join problem descriptions into one message.
pub fn describe(problems: &[Problem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
