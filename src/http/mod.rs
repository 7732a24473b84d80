//! HTTP plumbing shared by every network-facing component.
//!
//! All outbound requests go through [`RetryingClient`], which bounds each
//! attempt with its own timeout and retries server errors and transport
//! failures with capped exponential backoff.

mod retry;

pub use retry::{RetryPolicy, RetryingClient};

use std::time::Duration;

use thiserror::Error;

/// Failure of an HTTP exchange after the retry policy has been applied.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The underlying client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request could not be built (bad URL, body serialization).
    #[error("Invalid request: {0}")]
    InvalidRequest(#[source] reqwest::Error),

    /// The request body is a stream and cannot be replayed for a retry.
    #[error("Request to {url} cannot be retried (streaming body)")]
    Unclonable { url: String },

    /// The last attempt did not finish within the per-attempt timeout.
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The last attempt failed before a response was received.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A response arrived but its status is not a success.
    #[error("Request to {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

impl HttpError {
    /// Returns `true` when no response was ever received.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }
}

/// Turn a non-2xx response into [`HttpError::Status`].
pub fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(HttpError::Status {
            url: response.url().to_string(),
            status,
        })
    }
}
