//! Strong type definitions for the marketplace.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use crate::error::CoreError;

/// Identifier of an artifact row.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub i64);

impl ArtifactId {
    /// Create a new ArtifactId.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactId({})", self.0)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ArtifactId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for ArtifactId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Identifier of a user (customer, artist or admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a museum an artifact is exhibited under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MuseumId(pub i64);

impl fmt::Display for MuseumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a purchase line item, assigned by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(pub i64);

impl fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive unit count.
///
/// Zero and negative quantities are unrepresentable, so a cart can never
/// hold an entry that would be dropped on checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// One unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity, returning `None` for zero.
    pub const fn new(n: u32) -> Option<Self> {
        match NonZeroU32::new(n) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Interpret a raw signed count; anything `<= 0` yields `None`.
    ///
    /// Values above `u32::MAX` saturate.
    pub fn from_raw(n: i64) -> Option<Self> {
        if n <= 0 {
            return None;
        }
        Self::new(u32::try_from(n).unwrap_or(u32::MAX))
    }

    /// Get the raw count.
    pub const fn get(&self) -> u32 {
        self.0.get()
    }

    /// Add two quantities, saturating at `u32::MAX`.
    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Self(self.0.saturating_add(other.get()))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = CoreError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        Self::new(n).ok_or(CoreError::ZeroQuantity)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_non_positive() {
        assert!(Quantity::new(0).is_none());
        assert!(Quantity::from_raw(0).is_none());
        assert!(Quantity::from_raw(-3).is_none());
        assert_eq!(Quantity::from_raw(7).map(|q| q.get()), Some(7));
    }

    #[test]
    fn test_quantity_saturates() {
        let big = Quantity::from_raw(i64::MAX).unwrap();
        assert_eq!(big.get(), u32::MAX);
        assert_eq!(big.saturating_add(Quantity::ONE).get(), u32::MAX);
    }

    #[test]
    fn test_artifact_id_parse() {
        assert_eq!(" 42 ".parse::<ArtifactId>().unwrap(), ArtifactId(42));
        assert!("abc".parse::<ArtifactId>().is_err());
    }

    #[test]
    fn test_quantity_try_from_zero() {
        assert!(matches!(Quantity::try_from(0u32), Err(CoreError::ZeroQuantity)));
        assert_eq!(Quantity::try_from(4u32).unwrap().get(), 4);
    }

    #[test]
    fn test_quantity_serde_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().get(), 3);
    }
}
