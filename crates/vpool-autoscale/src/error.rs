//! Autoscaler error types.

use thiserror::Error;
use vpool_state::VPodKey;

/// Errors that fail one autoscale pass.
#[derive(Debug, Error)]
pub enum AutoscaleError {
    #[error("state error: {0}")]
    State(#[from] vpool_state::StateError),

    #[error("scale subresource: {0:#}")]
    Scale(anyhow::Error),

    /// `evicted` placements were already gone when this one failed.
    #[error("evicting {vpod} from {pod} failed after {evicted} evictions: {reason:#}")]
    Evict {
        vpod: VPodKey,
        pod: String,
        evicted: usize,
        reason: anyhow::Error,
    },
}

pub type AutoscaleResult<T> = Result<T, AutoscaleError>;
