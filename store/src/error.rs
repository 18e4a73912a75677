//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing file is not a JSON object of settings.
    #[error("Store file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Values could not be encoded.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
