//! Failure-domain spread priorities.
//!
//! Both plugins score the raw skew a new replica would add to the
//! candidate's domain, then invert the whole list in `normalize_score` so
//! that the least skewed candidate ends up with the highest score.

use tracing::debug;
use vpool_state::{AVAILABILITY_NODE_PRIORITY, AVAILABILITY_ZONE_PRIORITY, State, VPodKey};

use crate::args::{SpreadArgs, decode_args};
use crate::framework::{MAX_SCORE, PodScore, ScorePlugin};
use crate::status::Status;

/// Which failure domain a priority balances.
#[derive(Debug, Clone, Copy)]
enum Domain {
    Zone,
    Node,
}

/// Σ over every other domain of `|(reps(candidate domain) + 1) - reps(other)|`.
fn domain_skew(
    domain: Domain,
    args: Option<&str>,
    state: &State,
    vpod: &VPodKey,
    ordinal: i32,
) -> (u64, Status) {
    let args: SpreadArgs = match decode_args(args) {
        Ok(args) => args,
        Err(status) => return (0, status),
    };

    let (own, domains) = match domain {
        Domain::Zone => (state.zone_of(ordinal), state.zones()),
        Domain::Node => (state.node_of(ordinal), state.nodes()),
    };
    let Some(own) = own else {
        return (0, Status::error("pod has no failure domain"));
    };
    let reps = |name: &str| match domain {
        Domain::Zone => state.zone_replicas(vpod, name),
        Domain::Node => state.node_replicas(vpod, name),
    };

    let current = reps(own);
    let mut total: u64 = 0;
    for other in domains.iter().filter(|d| **d != own) {
        let skew = ((current + 1) - reps(other)).unsigned_abs();
        if skew as i32 > args.max_skew {
            debug!(%vpod, ordinal, ?domain, own, other, skew, "uneven domain spread");
        }
        total += u64::from(skew);
    }
    (total, Status::success())
}

fn invert(scores: &mut [PodScore]) -> Status {
    for s in scores.iter_mut() {
        s.score = MAX_SCORE - s.score;
    }
    Status::success()
}

/// Keeps a VPod's replicas balanced across availability zones.
pub struct AvailabilityZonePriority;

impl ScorePlugin for AvailabilityZonePriority {
    fn name(&self) -> &'static str {
        AVAILABILITY_ZONE_PRIORITY
    }

    fn score(
        &self,
        args: Option<&str>,
        state: &State,
        vpod: &VPodKey,
        ordinal: i32,
    ) -> (u64, Status) {
        domain_skew(Domain::Zone, args, state, vpod, ordinal)
    }

    fn normalize_score(
        &self,
        _args: Option<&str>,
        _state: &State,
        _vpod: &VPodKey,
        scores: &mut [PodScore],
    ) -> Status {
        invert(scores)
    }

    fn validate_args(&self, args: Option<&str>) -> Status {
        decode_args::<SpreadArgs>(args).err().unwrap_or_else(Status::success)
    }
}

/// Keeps a VPod's replicas balanced across nodes.
pub struct AvailabilityNodePriority;

impl ScorePlugin for AvailabilityNodePriority {
    fn name(&self) -> &'static str {
        AVAILABILITY_NODE_PRIORITY
    }

    fn score(
        &self,
        args: Option<&str>,
        state: &State,
        vpod: &VPodKey,
        ordinal: i32,
    ) -> (u64, Status) {
        domain_skew(Domain::Node, args, state, vpod, ordinal)
    }

    fn normalize_score(
        &self,
        _args: Option<&str>,
        _state: &State,
        _vpod: &VPodKey,
        scores: &mut [PodScore],
    ) -> Status {
        invert(scores)
    }

    fn validate_args(&self, args: Option<&str>) -> Status {
        decode_args::<SpreadArgs>(args).err().unwrap_or_else(Status::success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpool_state::PodInfo;

    const ARGS: Option<&str> = Some(r#"{"MaxSkew": 1}"#);

    /// Four pods: zone-a holds 0 and 2, zone-b holds 1 and 3; nodes pair up
    /// as (0, 1) and (2, 3).
    fn four_pods() -> State {
        let mut state = State::new("d", 10);
        for ordinal in 0..4 {
            state.add_pod(&PodInfo {
                ordinal,
                zone: if ordinal % 2 == 0 { "zone-a" } else { "zone-b" }.to_string(),
                node: format!("node-{}", ordinal / 2),
                schedulable: true,
            });
        }
        state
    }

    fn normalized(plugin: &dyn ScorePlugin, state: &State, key: &VPodKey) -> Vec<PodScore> {
        let mut scores: Vec<PodScore> = state
            .schedulable_pods
            .iter()
            .map(|&ordinal| PodScore {
                ordinal,
                score: plugin.score(ARGS, state, key, ordinal).0,
            })
            .collect();
        assert!(plugin.normalize_score(ARGS, state, key, &mut scores).is_success());
        scores
    }

    #[test]
    fn zone_priority_prefers_emptier_zone() {
        let mut state = four_pods();
        let key = VPodKey::new("ns", "a");
        state.adjust(&key, 0, 2);

        let scores = normalized(&AvailabilityZonePriority, &state, &key);
        // zone-a: |3 - 0| = 3, zone-b: |1 - 2| = 1
        assert_eq!(scores[0].score, MAX_SCORE - 3);
        assert_eq!(scores[1].score, MAX_SCORE - 1);
        assert!(scores[1].score > scores[0].score);
        assert_eq!(scores[1].score, scores[3].score);
    }

    #[test]
    fn node_priority_prefers_emptier_node() {
        let mut state = four_pods();
        let key = VPodKey::new("ns", "a");
        state.adjust(&key, 2, 1);

        let scores = normalized(&AvailabilityNodePriority, &state, &key);
        assert!(scores[0].score > scores[2].score);
        assert_eq!(scores[0].score, scores[1].score);
    }

    #[test]
    fn single_zone_has_no_skew() {
        let mut state = State::new("d", 10);
        state.add_pod(&PodInfo {
            ordinal: 0,
            zone: "only".to_string(),
            node: "n".to_string(),
            schedulable: true,
        });
        let key = VPodKey::new("ns", "a");
        let (raw, status) = AvailabilityZonePriority.score(ARGS, &state, &key, 0);
        assert_eq!(raw, 0);
        assert!(status.is_success());
    }

    #[test]
    fn unknown_pod_is_an_error() {
        let state = four_pods();
        let key = VPodKey::new("ns", "a");
        let (_, status) = AvailabilityZonePriority.score(ARGS, &state, &key, 9);
        assert_eq!(status.code(), crate::status::Code::Error);
    }

    #[test]
    fn bad_args_are_unschedulable() {
        let state = four_pods();
        let key = VPodKey::new("ns", "a");
        let (score, status) =
            AvailabilityNodePriority.score(Some(r#"{"maxSkew": 1}"#), &state, &key, 0);
        assert_eq!(score, 0);
        assert_eq!(status.code(), crate::status::Code::Unschedulable);
    }
}
