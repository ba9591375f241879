//! Artifacts and purchase records.
//!
//! [`ArtifactStock`] is the row shape checkout reads under lock; [`Artifact`]
//! is the full catalog record. [`PurchaseRecord`] is immutable once written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Money;
use crate::types::{ArtifactId, MuseumId, PurchaseId, Quantity, UserId};

/// Stock and price of one artifact, as seen inside a checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStock {
    pub artifact_id: ArtifactId,
    pub title: String,
    pub price: Money,
    pub stock: u32,
}

/// A catalog artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: ArtifactId,
    /// The artist who uploaded it, if any.
    pub artist_id: Option<UserId>,
    /// The museum it belongs to, if any.
    pub museum_id: Option<MuseumId>,
    pub title: String,
    pub description: String,
    /// Free-form type label ("Painting", "Sculpture", ...).
    pub kind: String,
    pub price: Money,
    pub stock: u32,
    /// Creation time (Unix ms).
    pub created_at: i64,
}

impl Artifact {
    /// Whether any units remain.
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Project to the stock view used by checkout.
    pub fn to_stock(&self) -> ArtifactStock {
        ArtifactStock {
            artifact_id: self.artifact_id,
            title: self.title.clone(),
            price: self.price,
            stock: self.stock,
        }
    }
}

/// Input for creating a catalog artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArtifact {
    pub artist_id: Option<UserId>,
    #[serde(default)]
    pub museum_id: Option<MuseumId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub price: Money,
    pub stock: u32,
}

fn default_kind() -> String {
    "Other".to_string()
}

impl NewArtifact {
    /// Create with the default kind and an empty description.
    pub fn new(title: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            artist_id: None,
            museum_id: None,
            title: title.into(),
            description: String::new(),
            kind: default_kind(),
            price,
            stock,
        }
    }

    /// Set the owning artist.
    pub fn artist(mut self, artist_id: UserId) -> Self {
        self.artist_id = Some(artist_id);
        self
    }

    /// Place it under a museum.
    pub fn museum(mut self, museum_id: MuseumId) -> Self {
        self.museum_id = Some(museum_id);
        self
    }

    /// Set the type label.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// How a purchase was paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    Card,
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    /// Stored label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::BankTransfer => "BankTransfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Card" => Ok(PaymentMethod::Card),
            "Cash" => Ok(PaymentMethod::Cash),
            "BankTransfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(CoreError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

/// A purchase line item about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchase {
    pub customer_id: UserId,
    pub artifact_id: ArtifactId,
    pub quantity: Quantity,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
}

/// A recorded purchase line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub purchase_id: PurchaseId,
    pub customer_id: UserId,
    pub artifact_id: ArtifactId,
    pub quantity: Quantity,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    /// When the purchase was recorded (Unix ms).
    pub purchased_at: i64,
}

impl PurchaseRecord {
    /// Materialize a pending purchase with its ledger id and timestamp.
    pub fn from_new(purchase_id: PurchaseId, new: &NewPurchase, purchased_at: i64) -> Self {
        Self {
            purchase_id,
            customer_id: new.customer_id,
            artifact_id: new.artifact_id,
            quantity: new.quantity,
            total_amount: new.total_amount,
            payment_method: new.payment_method,
            purchased_at,
        }
    }
}
