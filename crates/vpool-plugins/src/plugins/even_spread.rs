//! Even pod spread — a filter that bounds per-pod skew and a priority that
//! favors balanced pods.

use tracing::{debug, trace};
use vpool_state::{EVEN_POD_SPREAD, REMOVE_WITH_EVEN_POD_SPREAD_PRIORITY, State, VPodKey};

use crate::args::{SpreadArgs, decode_args};
use crate::framework::{FilterPlugin, MAX_SCORE, ScorePlugin};
use crate::status::Status;

pub const ERR_REASON_UNEVEN_SPREAD: &str = "pod will cause an uneven spread";

/// Rejects a pod when one more replica there would put it more than
/// `MaxSkew` replicas ahead of another schedulable pod.
///
/// Other pods that are full and hold none of this VPod's replicas cannot
/// absorb the difference, so they are ignored.
pub struct EvenPodSpread;

impl FilterPlugin for EvenPodSpread {
    fn name(&self) -> &'static str {
        EVEN_POD_SPREAD
    }

    fn filter(&self, args: Option<&str>, state: &State, vpod: &VPodKey, ordinal: i32) -> Status {
        let args: SpreadArgs = match decode_args(args) {
            Ok(args) => args,
            Err(status) => return status,
        };

        let current = state.replicas_on(vpod, ordinal);
        for &other in &state.schedulable_pods {
            if other == ordinal {
                continue;
            }
            let other_reps = state.replicas_on(vpod, other);
            if other_reps == 0 && state.free(other) <= 0 {
                continue;
            }
            let skew = (current + 1) - other_reps;
            if skew > args.max_skew {
                debug!(%vpod, ordinal, other, skew, max_skew = args.max_skew, "uneven spread");
                return Status::unschedulable(ERR_REASON_UNEVEN_SPREAD);
            }
        }
        Status::success()
    }

    fn validate_args(&self, args: Option<&str>) -> Status {
        decode_args::<SpreadArgs>(args).err().unwrap_or_else(Status::success)
    }
}

/// Scores how evenly a VPod stays spread if the candidate pod keeps its
/// replicas.
///
/// For candidate P holding `current` replicas, every other existing pod Q
/// contributes `|(current - 1) - reps(Q)|`; the final score is
/// `MAX_SCORE - Σ`, so lower accumulated skew wins. Note the asymmetry: only
/// the candidate is adjusted by one, the other pods are compared raw.
pub struct RemoveWithEvenPodSpreadPriority;

impl ScorePlugin for RemoveWithEvenPodSpreadPriority {
    fn name(&self) -> &'static str {
        REMOVE_WITH_EVEN_POD_SPREAD_PRIORITY
    }

    fn score(
        &self,
        args: Option<&str>,
        state: &State,
        vpod: &VPodKey,
        ordinal: i32,
    ) -> (u64, Status) {
        let args: SpreadArgs = match decode_args(args) {
            Ok(args) => args,
            Err(status) => return (0, status),
        };

        // No pods hold replicas: nothing to compare against.
        if state.last_ordinal < 0 {
            return (0, Status::success());
        }

        let current = state.replicas_on(vpod, ordinal);
        let mut total: u64 = 0;
        for other in 0..=state.last_ordinal {
            if other == ordinal {
                continue;
            }
            let other_reps = state.replicas_on(vpod, other);
            let skew = ((current - 1) - other_reps).unsigned_abs();
            trace!(%vpod, ordinal, current, other, other_reps, skew, "pod skew");
            if skew as i32 > args.max_skew {
                debug!(%vpod, ordinal, other, skew, "pod will cause an uneven spread");
            }
            total += u64::from(skew);
        }

        (MAX_SCORE - total, Status::success())
    }

    fn validate_args(&self, args: Option<&str>) -> Status {
        decode_args::<SpreadArgs>(args).err().unwrap_or_else(Status::success)
    }
}
