//! Error types shared across the data-access layer.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the remote collaborators (document tree, object store).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The remote call failed (network, permission, quota).
    #[error("remote call failed: {0}")]
    Remote(String),

    /// The remote call exceeded the configured deadline. Retryable.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced by the data-access components.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The referenced card, series, group, or index bucket does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// A batched operation completed for some keys and failed for others.
    /// The failed keys are listed so the caller can retry just those.
    #[error("partially completed, failed: {}", .failed.join(", "))]
    Partial { failed: Vec<String> },
}
