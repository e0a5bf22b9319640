//! Error types for DocIO
//!
//! This module defines the common error types used throughout the system.
//! Expected business outcomes (not-found, already-archived, ...) are plain
//! enum variants so callers can branch on them without string matching;
//! infrastructure failures carry the underlying cause.

use thiserror::Error;

/// Common result type for DocIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for DocIO
#[derive(Debug, Error)]
pub enum Error {
    // Expected business outcomes
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("object not found in storage: {bucket}/{key}")]
    ObjectMissing { bucket: String, key: String },

    #[error("document already archived: tier {tier}")]
    AlreadyArchived { tier: String },

    #[error("document is not archived, no restore needed")]
    NotArchived,

    #[error("restore already in progress")]
    RestoreAlreadyInProgress,

    #[error("document is archived and has not been restored")]
    NotRestored { tier: String },

    #[error("restore is in progress, try again later")]
    RestoreInProgress,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    // Infrastructure failures
    #[error("record store error: {0}")]
    Store(String),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a record store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an object store error
    pub fn object_store(msg: impl Into<String>) -> Self {
        Self::ObjectStore(msg.into())
    }

    /// Create a queue error
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Expected business outcomes are surfaced to the immediate caller and
    /// never routed through the retry coordinator.
    #[must_use]
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            Self::DocumentNotFound(_)
                | Self::ObjectMissing { .. }
                | Self::AlreadyArchived { .. }
                | Self::NotArchived
                | Self::RestoreAlreadyInProgress
                | Self::NotRestored { .. }
                | Self::RestoreInProgress
                | Self::InvalidParameter(_)
        )
    }

    /// Check if this is a transient infrastructure failure worth queueing
    /// for a later retry sweep.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::ObjectStore(_) | Self::Queue(_) | Self::Dispatch(_) | Self::Io(_)
        )
    }

    /// HTTP status code for callers that map outcomes onto an API surface
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidParameter(_) => 400,

            Self::NotRestored { .. } => 403,

            Self::DocumentNotFound(_) | Self::ObjectMissing { .. } => 404,

            Self::AlreadyArchived { .. } | Self::NotArchived | Self::RestoreAlreadyInProgress => {
                409
            }

            // The restore was accepted earlier and is still running
            Self::RestoreInProgress => 202,

            Self::Store(_)
            | Self::ObjectStore(_)
            | Self::Queue(_)
            | Self::Dispatch(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Internal(_) => 500,
        }
    }
}
