//! Marketplace configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use vmuseum_core::PaymentMethod;
use vmuseum_store::{SqliteConfig, SqliteStore};

/// Environment variable overriding the payment method recorded on purchases.
pub const ENV_PAYMENT_METHOD: &str = "VMUSEUM_PAYMENT_METHOD";
/// Environment variable for the admin transaction listing size.
pub const ENV_TRANSACTIONS_LIMIT: &str = "VMUSEUM_TRANSACTIONS_LIMIT";

/// Configuration for the checkout engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Payment method written on every purchase record.
    pub payment_method: PaymentMethod,
}

/// Configuration for a [`Marketplace`](crate::Marketplace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub store: SqliteConfig,
    pub checkout: CheckoutConfig,
    /// Maximum rows returned by the admin transaction listing.
    pub transactions_limit: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            store: SqliteConfig::default(),
            checkout: CheckoutConfig::default(),
            transactions_limit: 100,
        }
    }
}

impl MarketConfig {
    /// Load from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            store: SqliteConfig::from_lookup(&lookup).context("invalid store configuration")?,
            ..Self::default()
        };

        if let Some(raw) = lookup(ENV_PAYMENT_METHOD) {
            config.checkout.payment_method = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {}", ENV_PAYMENT_METHOD))?;
        }

        if let Some(raw) = lookup(ENV_TRANSACTIONS_LIMIT) {
            config.transactions_limit = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a non-negative integer", ENV_TRANSACTIONS_LIMIT))?;
        }

        Ok(config)
    }

    /// Open the configured SQLite store.
    pub fn open_store(&self) -> anyhow::Result<SqliteStore> {
        let store = SqliteStore::open_with(self.store.clone()).with_context(|| match &self.store.path {
            Some(path) => format!("failed to open database at {}", path.display()),
            None => "failed to open in-memory database".to_string(),
        })?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MarketConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, MarketConfig::default());
        assert_eq!(config.checkout.payment_method, PaymentMethod::Card);
    }

    #[test]
    fn test_overrides() {
        let config = MarketConfig::from_lookup(|key| match key {
            ENV_PAYMENT_METHOD => Some("Cash".into()),
            ENV_TRANSACTIONS_LIMIT => Some("20".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.checkout.payment_method, PaymentMethod::Cash);
        assert_eq!(config.transactions_limit, 20);
    }

    #[test]
    fn test_invalid_payment_method() {
        let err = MarketConfig::from_lookup(|key| {
            (key == ENV_PAYMENT_METHOD).then(|| "Barter".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_PAYMENT_METHOD));
    }

    #[test]
    fn test_open_store_in_memory() {
        assert!(MarketConfig::default().open_store().is_ok());
    }
}
