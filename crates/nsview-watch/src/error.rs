//! Error types for cluster access and watching.

use thiserror::Error;

/// Result type alias for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors that can occur while talking to the cluster.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The Kubernetes API call failed.
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    /// A namespace argument was empty or otherwise unusable.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    /// A pod name argument was empty or otherwise unusable.
    #[error("invalid pod name: {0}")]
    InvalidPodName(String),

    /// A resource could not be converted to the generic representation.
    #[error("resource conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),
}
