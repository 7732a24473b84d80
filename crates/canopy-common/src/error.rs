//! Common error types used throughout canopy.
//!
//! This module provides a unified error type covering the enrichment
//! pipeline's failure taxonomy: stage failures, provider failures, storage
//! failures, configuration problems and cooperative cancellation.

use crate::types::PipelineStage;

/// Common error type for canopy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Work stopped because cancellation was requested.
    #[error("cancelled")]
    Cancelled,

    /// A pipeline stage failed for one catalog entry.
    #[error("{stage} failed: {message}")]
    Stage {
        stage: PipelineStage,
        message: String,
    },

    /// An external provider returned an error.
    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A storage (filesystem) operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A run was started while another one is still active.
    #[error("An enrichment run is already in progress")]
    AlreadyRunning,

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Stage error.
    pub fn stage<S: Into<String>>(stage: PipelineStage, msg: S) -> Self {
        Self::Stage {
            stage,
            message: msg.into(),
        }
    }

    /// Create a new Provider error.
    pub fn provider<P: Into<String>, S: Into<String>>(provider: P, msg: S) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns `true` when this error originates from cancellation rather
    /// than a genuine failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::stage(PipelineStage::Saving, "disk full");
        assert_eq!(err.to_string(), "saving failed: disk full");

        let err = Error::provider("gbif", "HTTP 502");
        assert_eq!(err.to_string(), "Provider 'gbif' error: HTTP 502");

        let err = Error::database("locked");
        assert_eq!(err.to_string(), "Database error: locked");

        let err = Error::config("max_per_item must be > 0");
        assert_eq!(
            err.to_string(),
            "Configuration error: max_per_item must be > 0"
        );

        assert_eq!(Error::Cancelled.to_string(), "cancelled");
        assert_eq!(
            Error::AlreadyRunning.to_string(),
            "An enrichment run is already in progress"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::internal("bug").is_cancelled());
        assert!(!Error::stage(PipelineStage::Filling, "cancelled").is_cancelled());
    }
}
