//! Domain types shared by the scheduler and autoscaler.
//!
//! VPods and their placements are owned by the hosting application; the
//! core only observes them. Pods are identified by ordinal and named
//! `<statefulset>-<ordinal>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Built-in plugin names referenced by policies.
pub const POD_FITS_RESOURCES: &str = "PodFitsResources";
pub const EVEN_POD_SPREAD: &str = "EvenPodSpread";
pub const LOWEST_ORDINAL_PRIORITY: &str = "LowestOrdinalPriority";
pub const AVAILABILITY_ZONE_PRIORITY: &str = "AvailabilityZonePriority";
pub const AVAILABILITY_NODE_PRIORITY: &str = "AvailabilityNodePriority";
pub const REMOVE_WITH_EVEN_POD_SPREAD_PRIORITY: &str = "RemoveWithEvenPodSpreadPriority";
pub const REMOVE_WITH_HIGHEST_ORDINAL_PRIORITY: &str = "RemoveWithHighestOrdinalPriority";

// ── VPods ──────────────────────────────────────────────────────────

/// Namespaced name of a VPod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VPodKey {
    pub namespace: String,
    pub name: String,
}

impl VPodKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for VPodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Virtual replicas of one VPod assigned to one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub pod_name: String,
    pub vreplicas: i32,
}

/// A logical owner of virtual replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VPod {
    pub key: VPodKey,
    /// Desired number of virtual replicas.
    pub vreplicas: i32,
    #[serde(default)]
    pub placements: Vec<Placement>,
}

impl VPod {
    pub fn new(key: VPodKey, vreplicas: i32) -> Self {
        Self {
            key,
            vreplicas,
            placements: Vec::new(),
        }
    }

    /// Total virtual replicas currently placed.
    pub fn placed(&self) -> i32 {
        self.placements.iter().map(|p| p.vreplicas).sum()
    }

    /// Virtual replicas still waiting for a pod.
    pub fn pending(&self) -> i32 {
        (self.vreplicas - self.placed()).max(0)
    }
}

// ── Pods ──────────────────────────────────────────────────────────

/// Pool metadata for one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub ordinal: i32,
    pub zone: String,
    pub node: String,
    /// Cordoned or terminating pods are listed but not schedulable.
    #[serde(default = "default_true")]
    pub schedulable: bool,
}

fn default_true() -> bool {
    true
}

/// Name of the pod with the given ordinal.
pub fn pod_name_from_ordinal(statefulset: &str, ordinal: i32) -> String {
    format!("{statefulset}-{ordinal}")
}

/// Parse the ordinal out of a `<statefulset>-<ordinal>` pod name.
///
/// Names belonging to another StatefulSet are rejected.
pub fn ordinal_from_pod_name(statefulset: &str, pod_name: &str) -> StateResult<i32> {
    let suffix = pod_name
        .strip_prefix(statefulset)
        .and_then(|rest| rest.strip_prefix('-'))
        .ok_or_else(|| StateError::ForeignPod {
            pod: pod_name.to_string(),
            statefulset: statefulset.to_string(),
        })?;
    suffix
        .parse::<i32>()
        .ok()
        .filter(|ordinal| *ordinal >= 0)
        .ok_or_else(|| StateError::InvalidPodName(pod_name.to_string()))
}

// ── Policies ──────────────────────────────────────────────────────

/// How the scheduler ranks pods when no explicit policy is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerStrategy {
    /// Fill the lowest ordinals first (tightest pack).
    #[default]
    MaxFillUp,
    /// Rank pods with the configured `SchedulerPolicy`.
    Policy,
}

/// A named filter plugin with its raw argument blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicatePolicy {
    pub name: String,
    /// JSON text, decoded strictly by the plugin.
    #[serde(default)]
    pub args: Option<String>,
}

/// A named, weighted score plugin with its raw argument blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityPolicy {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: u64,
    #[serde(default)]
    pub args: Option<String>,
}

fn default_weight() -> u64 {
    1
}

/// Ordered filter and score plugins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerPolicy {
    #[serde(default)]
    pub predicates: Vec<PredicatePolicy>,
    #[serde(default)]
    pub priorities: Vec<PriorityPolicy>,
}

impl SchedulerPolicy {
    /// Whether a priority with the given name is configured.
    pub fn has_priority(&self, name: &str) -> bool {
        self.priorities.iter().any(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_name_round_trips_ordinal() {
        let name = pod_name_from_ordinal("kafka-source-dispatcher", 7);
        assert_eq!(name, "kafka-source-dispatcher-7");
        assert_eq!(ordinal_from_pod_name("kafka-source-dispatcher", &name).unwrap(), 7);
    }

    #[test]
    fn malformed_pod_names_are_rejected() {
        for name in ["dispatcher-x", "dispatcher-", "dispatcher--1", "dispatcher-1x"] {
            assert!(
                matches!(
                    ordinal_from_pod_name("dispatcher", name),
                    Err(StateError::InvalidPodName(_))
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn pods_of_other_statefulsets_are_rejected() {
        for name in ["other-set-3", "dispatcher2-3", "dispatch-3"] {
            assert!(
                matches!(
                    ordinal_from_pod_name("dispatcher", name),
                    Err(StateError::ForeignPod { .. })
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn vpod_pending_never_negative() {
        let mut vpod = VPod::new(VPodKey::new("ns", "a"), 3);
        vpod.placements.push(Placement {
            pod_name: "p-0".to_string(),
            vreplicas: 5,
        });
        assert_eq!(vpod.placed(), 5);
        assert_eq!(vpod.pending(), 0);
    }

    #[test]
    fn vpod_key_displays_namespaced() {
        assert_eq!(VPodKey::new("default", "src").to_string(), "default/src");
    }

    #[test]
    fn priority_weight_defaults_to_one() {
        let p: PriorityPolicy =
            serde_json::from_str(r#"{"name":"LowestOrdinalPriority"}"#).unwrap();
        assert_eq!(p.weight, 1);
        assert!(p.args.is_none());
    }

    #[test]
    fn has_priority_matches_by_name() {
        let policy = SchedulerPolicy {
            predicates: vec![],
            priorities: vec![PriorityPolicy {
                name: AVAILABILITY_ZONE_PRIORITY.to_string(),
                weight: 1,
                args: Some(r#"{"MaxSkew": 1}"#.to_string()),
            }],
        };
        assert!(policy.has_priority(AVAILABILITY_ZONE_PRIORITY));
        assert!(!policy.has_priority(AVAILABILITY_NODE_PRIORITY));
    }
}
