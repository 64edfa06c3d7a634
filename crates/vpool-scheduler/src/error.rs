//! Scheduler error types.

use thiserror::Error;

/// Errors that abort a scheduling pass.
///
/// Plugin failures never show up here: they only exclude the candidate
/// they were evaluating.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("state error: {0}")]
    State(#[from] vpool_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
