//! SQLite backend configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Environment variable naming the database file.
pub const ENV_DB_PATH: &str = "VMUSEUM_DB_PATH";
/// Environment variable for the lock wait, in milliseconds.
pub const ENV_BUSY_TIMEOUT_MS: &str = "VMUSEUM_BUSY_TIMEOUT_MS";
/// Environment variable toggling write-ahead logging (`1`/`true`/`0`/`false`).
pub const ENV_WAL: &str = "VMUSEUM_WAL";

/// Configuration for [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file. `None` means a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long a transaction waits for the write lock before failing.
    pub busy_timeout_ms: u64,
    /// Use write-ahead logging (file databases only).
    pub wal: bool,
    /// Idle connections kept open for reuse.
    pub max_idle_connections: usize,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
            wal: true,
            max_idle_connections: 8,
        }
    }
}

impl SqliteConfig {
    /// Configuration for a database file with default settings.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Override the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn busy_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = raw.trim().parse().map_err(|_| {
                StoreError::Config(format!("{} must be an integer, got {:?}", ENV_BUSY_TIMEOUT_MS, raw))
            })?;
        }

        if let Some(raw) = lookup(ENV_WAL) {
            config.wal = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(StoreError::Config(format!(
                        "{} must be a boolean, got {:?}",
                        ENV_WAL, raw
                    )))
                }
            };
        }

        Ok(config)
    }
}
