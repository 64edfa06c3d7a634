//! Error types for snapshot construction.

use thiserror::Error;

/// Result type alias for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while building a snapshot.
///
/// Every variant is transient from the caller's point of view: the next
/// pass rebuilds the snapshot from scratch.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to list vpods: {0}")]
    ListVPods(String),

    #[error("failed to list pods: {0}")]
    ListPods(String),

    #[error("invalid pod name: {0}")]
    InvalidPodName(String),

    #[error("pod {pod} does not belong to statefulset {statefulset}")]
    ForeignPod { pod: String, statefulset: String },
}
