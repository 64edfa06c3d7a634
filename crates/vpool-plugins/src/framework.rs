//! Filter and score extension points.
//!
//! Plugins are pure functions of the snapshot they are handed: they never
//! mutate it and never call out to collaborators.

use vpool_state::{State, VPodKey};

use crate::status::Status;

/// Highest possible score.
pub const MAX_SCORE: u64 = u64::MAX;

/// Score of one candidate pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PodScore {
    pub ordinal: i32,
    pub score: u64,
}

/// Accepts or rejects a candidate pod for one virtual replica of a VPod.
pub trait FilterPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Success` keeps the pod; any other status excludes it.
    fn filter(&self, args: Option<&str>, state: &State, vpod: &VPodKey, ordinal: i32) -> Status;

    /// Check an argument blob ahead of time (config load).
    fn validate_args(&self, _args: Option<&str>) -> Status {
        Status::success()
    }
}

/// Ranks candidate pods that survived filtering. Higher is better.
pub trait ScorePlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(
        &self,
        args: Option<&str>,
        state: &State,
        vpod: &VPodKey,
        ordinal: i32,
    ) -> (u64, Status);

    /// Invoked once after every candidate has been scored. May rescale the
    /// whole list.
    fn normalize_score(
        &self,
        _args: Option<&str>,
        _state: &State,
        _vpod: &VPodKey,
        _scores: &mut [PodScore],
    ) -> Status {
        Status::success()
    }

    fn validate_args(&self, _args: Option<&str>) -> Status {
        Status::success()
    }
}
