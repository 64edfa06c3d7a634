//! Ordinal-based priorities.

use vpool_state::{LOWEST_ORDINAL_PRIORITY, REMOVE_WITH_HIGHEST_ORDINAL_PRIORITY, State, VPodKey};

use crate::framework::{MAX_SCORE, ScorePlugin};
use crate::status::Status;

/// Prefers the lowest ordinal, which packs replicas onto the first pods.
pub struct LowestOrdinalPriority;

impl ScorePlugin for LowestOrdinalPriority {
    fn name(&self) -> &'static str {
        LOWEST_ORDINAL_PRIORITY
    }

    fn score(
        &self,
        _args: Option<&str>,
        _state: &State,
        _vpod: &VPodKey,
        ordinal: i32,
    ) -> (u64, Status) {
        (MAX_SCORE - ordinal.max(0) as u64, Status::success())
    }
}

/// Deschedule priority: take replicas off the highest ordinal first so
/// trailing pods drain.
pub struct RemoveWithHighestOrdinalPriority;

impl ScorePlugin for RemoveWithHighestOrdinalPriority {
    fn name(&self) -> &'static str {
        REMOVE_WITH_HIGHEST_ORDINAL_PRIORITY
    }

    fn score(
        &self,
        _args: Option<&str>,
        _state: &State,
        _vpod: &VPodKey,
        ordinal: i32,
    ) -> (u64, Status) {
        (ordinal.max(0) as u64, Status::success())
    }
}
