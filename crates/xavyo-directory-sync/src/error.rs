//! Error types for directory reconciliation.
//!
//! Every failure carries a transient/terminal classification consumed by
//! [`RetryPolicy`](crate::retry::RetryPolicy).

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors produced by directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Caller input violates a precondition. No remote call was made.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced resource does not exist on the remote service.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The remote service asked us to slow down.
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The remote service could not be reached (connect or read timeout).
    #[error("remote service unreachable: {0}")]
    Unreachable(String),

    /// Non-success HTTP status not covered by a more specific variant.
    #[error("remote returned HTTP {status}: {detail}")]
    RemoteStatus { status: u16, detail: String },

    /// Web API envelope reported `ok: false`.
    #[error("web API method {method} failed: {error}")]
    Api { method: String, error: String },

    /// Response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// Retry budget spent on a transient failure.
    #[error("gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<DirectoryError>,
    },

    /// Overall deadline for an operation (all attempts and backoff) expired.
    #[error("operation deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Client or configuration could not be built.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DirectoryError {
    /// Whether the failure means "try again later".
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Unreachable(_) => true,
            Self::RemoteStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this is a rate-limit signal.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether the referenced resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::Unreachable(err.to_string())
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else if let Some(status) = err.status() {
            Self::RemoteStatus {
                status: status.as_u16(),
                detail: err.to_string(),
            }
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("invalid JSON: {err}"))
    }
}

/// Convert a `NotFound` failure into an absent value.
pub(crate) fn absent_on_not_found<T>(result: DirectoryResult<T>) -> DirectoryResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
