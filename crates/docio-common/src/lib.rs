//! DocIO Common - Shared types and utilities
//!
//! This crate provides common types, error definitions, configuration and
//! retry/backoff helpers used across all DocIO components.

pub mod cache;
pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use cache::ReadThroughCache;
pub use config::{BackoffConfig, Config, RecordStoreConfig, RetryConfig, SweeperConfig};
pub use error::{Error, Result};
pub use retry::retry_with_backoff;
pub use types::*;
