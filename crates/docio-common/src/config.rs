//! Configuration types for DocIO
//!
//! This module defines configuration structures used across components.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for DocIO
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record store configuration
    pub record_store: RecordStoreConfig,
    /// Backoff used to absorb conditional-create races
    pub backoff: BackoffConfig,
    /// Retry & quarantine coordinator configuration
    pub retry: RetryConfig,
    /// Periodic sweeper configuration
    pub sweeper: SweeperConfig,
}

/// Record store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordStoreConfig {
    /// Path of the redb database file
    pub path: PathBuf,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/docio/records.redb"),
        }
    }
}

/// Bounded exponential backoff for expected races
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Initial delay in milliseconds; doubles each retry
    pub initial_delay_ms: u64,
}

impl BackoffConfig {
    /// Initial delay as a [`Duration`]
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
        }
    }
}

/// Retry & quarantine coordinator configuration
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retry ceiling: units at or past this count are quarantined
    pub max_retry_attempts: u32,
    /// Messages drained from a queue per sweep invocation
    pub batch_size: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            batch_size: 10,
        }
    }
}

/// Periodic sweeper configuration
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Seconds between retry sweeps
    pub interval_secs: u64,
    /// Run the background record/object reconcile sweep as well.
    /// Off by default: read-time resolution already self-heals records,
    /// so the sweep is an operational choice, not a requirement.
    pub reconcile_sweep: bool,
    /// Records examined per reconcile sweep
    pub reconcile_batch: usize,
}

impl SweeperConfig {
    /// Sweep interval as a [`Duration`]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            reconcile_sweep: false,
            reconcile_batch: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backoff.max_attempts, 3);
        assert_eq!(config.backoff.initial_delay_ms, 500);
        assert_eq!(config.retry.max_retry_attempts, 3);
        assert_eq!(config.retry.batch_size, 10);
        assert!(!config.sweeper.reconcile_sweep);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"retry":{"batch_size":5}}"#).unwrap();
        assert_eq!(config.retry.batch_size, 5);
        assert_eq!(config.retry.max_retry_attempts, 3);
    }
}
