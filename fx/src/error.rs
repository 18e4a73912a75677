//! FX error types.

use somrate_common::ValidationError;
use somrate_store::StoreError;
use thiserror::Error;

/// Errors that can occur while fetching, caching or resolving rates.
#[derive(Debug, Error)]
pub enum FxError {
    /// Connection failure or timeout talking to one endpoint.
    #[error("Network error from {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    /// Endpoint answered, but not with a usable rate.
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    /// Every endpoint failed; carries the last failure.
    #[error("Live rate unavailable after {attempts} attempt(s): {last}")]
    Fetch { attempts: usize, last: Box<FxError> },

    /// No rate endpoints configured.
    #[error("No rate endpoints configured")]
    NoEndpoints,

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Admin password did not match.
    #[error("Invalid admin password")]
    InvalidPassword,

    /// Rejected input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Settings store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl FxError {
    /// Failures that only affect one endpoint; the next one is tried.
    pub fn is_endpoint_failure(&self) -> bool {
        matches!(
            self,
            FxError::Network { .. } | FxError::MalformedResponse { .. }
        )
    }

    /// The innermost failure behind a [`FxError::Fetch`], or `self`.
    pub fn root_cause(&self) -> &FxError {
        match self {
            FxError::Fetch { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
