//! The cluster-state snapshot.
//!
//! `free_cap` covers ordinals `0..=last_ordinal`, where `last_ordinal` is the
//! highest pod holding at least one virtual replica. Pods above it are empty
//! and report the full `capacity` from [`State::free`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::warn;

use crate::types::*;

/// Point-in-time view of a worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub statefulset_name: String,
    /// Virtual-replica slots per pod.
    pub capacity: i32,
    /// Highest ordinal holding a placement, -1 when the pool is empty.
    pub last_ordinal: i32,
    /// Remaining capacity for ordinals `0..=last_ordinal`.
    pub free_cap: Vec<i32>,
    /// Ordinals of existing, schedulable pods in ascending order.
    pub schedulable_pods: Vec<i32>,
    /// VPod → pod name → placed virtual replicas.
    pub pod_spread: HashMap<VPodKey, HashMap<String, i32>>,
    /// VPod → zone → placed virtual replicas.
    pub zone_spread: HashMap<VPodKey, HashMap<String, i32>>,
    /// VPod → node → placed virtual replicas.
    pub node_spread: HashMap<VPodKey, HashMap<String, i32>>,
    pub pod_zone: BTreeMap<i32, String>,
    pub pod_node: BTreeMap<i32, String>,
    pub num_zones: i32,
    pub num_nodes: i32,
    pub strategy: SchedulerStrategy,
    pub sched_policy: Option<SchedulerPolicy>,
    pub desched_policy: Option<SchedulerPolicy>,
}

impl State {
    /// An empty snapshot for a pool with no pods and no placements.
    pub fn new(statefulset_name: &str, capacity: i32) -> Self {
        Self {
            statefulset_name: statefulset_name.to_string(),
            capacity,
            last_ordinal: -1,
            free_cap: Vec::new(),
            schedulable_pods: Vec::new(),
            pod_spread: HashMap::new(),
            zone_spread: HashMap::new(),
            node_spread: HashMap::new(),
            pod_zone: BTreeMap::new(),
            pod_node: BTreeMap::new(),
            num_zones: 0,
            num_nodes: 0,
            strategy: SchedulerStrategy::default(),
            sched_policy: None,
            desched_policy: None,
        }
    }

    // ── Read accessors ─────────────────────────────────────────────

    /// Free capacity of the pod with the given ordinal.
    pub fn free(&self, ordinal: i32) -> i32 {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| self.free_cap.get(i).copied())
            .unwrap_or(self.capacity)
    }

    /// Total free capacity over ordinals `0..=last_ordinal`.
    pub fn free_capacity(&self) -> i32 {
        self.free_cap.iter().sum()
    }

    /// Total virtual replicas placed across the pool.
    pub fn total_placed(&self) -> i32 {
        self.pod_spread.values().flat_map(|pods| pods.values()).sum()
    }

    pub fn pod_name(&self, ordinal: i32) -> String {
        pod_name_from_ordinal(&self.statefulset_name, ordinal)
    }

    /// Virtual replicas of `vpod` on the pod with the given ordinal.
    pub fn replicas_on(&self, vpod: &VPodKey, ordinal: i32) -> i32 {
        self.pod_spread
            .get(vpod)
            .and_then(|pods| pods.get(&self.pod_name(ordinal)))
            .copied()
            .unwrap_or(0)
    }

    /// Ordinal → virtual replicas of `vpod`, for every pod holding some.
    pub fn placements_of(&self, vpod: &VPodKey) -> BTreeMap<i32, i32> {
        self.pod_spread
            .get(vpod)
            .into_iter()
            .flatten()
            .filter_map(|(pod, n)| {
                ordinal_from_pod_name(&self.statefulset_name, pod)
                    .ok()
                    .map(|ordinal| (ordinal, *n))
            })
            .collect()
    }

    pub fn zone_replicas(&self, vpod: &VPodKey, zone: &str) -> i32 {
        lookup(&self.zone_spread, vpod, zone)
    }

    pub fn node_replicas(&self, vpod: &VPodKey, node: &str) -> i32 {
        lookup(&self.node_spread, vpod, node)
    }

    pub fn zone_of(&self, ordinal: i32) -> Option<&str> {
        self.pod_zone.get(&ordinal).map(String::as_str)
    }

    pub fn node_of(&self, ordinal: i32) -> Option<&str> {
        self.pod_node.get(&ordinal).map(String::as_str)
    }

    /// Distinct zones among existing pods.
    pub fn zones(&self) -> BTreeSet<&str> {
        self.pod_zone.values().map(String::as_str).collect()
    }

    /// Distinct nodes among existing pods.
    pub fn nodes(&self) -> BTreeSet<&str> {
        self.pod_node.values().map(String::as_str).collect()
    }

    // ── Construction and working-copy updates ──────────────────────

    /// Record a pod from pool metadata.
    pub fn add_pod(&mut self, pod: &PodInfo) {
        self.pod_zone.insert(pod.ordinal, pod.zone.clone());
        self.pod_node.insert(pod.ordinal, pod.node.clone());
        if pod.schedulable
            && let Err(pos) = self.schedulable_pods.binary_search(&pod.ordinal)
        {
            self.schedulable_pods.insert(pos, pod.ordinal);
        }
        self.num_zones = self.zones().len() as i32;
        self.num_nodes = self.nodes().len() as i32;
    }

    /// Fold `delta` virtual replicas of `vpod` into the pod at `ordinal`.
    ///
    /// Keeps `free_cap`, every spread map and `last_ordinal` consistent.
    pub fn adjust(&mut self, vpod: &VPodKey, ordinal: i32, delta: i32) {
        if ordinal < 0 || delta == 0 {
            return;
        }
        let idx = ordinal as usize;
        if self.free_cap.len() <= idx {
            self.free_cap.resize(idx + 1, self.capacity);
        }
        self.free_cap[idx] -= delta;
        if self.free_cap[idx] < 0 {
            warn!(
                pod = %self.pod_name(ordinal),
                free = self.free_cap[idx],
                "pod is over capacity"
            );
        }

        let pod_name = self.pod_name(ordinal);
        bump(&mut self.pod_spread, vpod, &pod_name, delta);
        if let Some(zone) = self.pod_zone.get(&ordinal).cloned() {
            bump(&mut self.zone_spread, vpod, &zone, delta);
        }
        if let Some(node) = self.pod_node.get(&ordinal).cloned() {
            bump(&mut self.node_spread, vpod, &node, delta);
        }

        while self
            .free_cap
            .last()
            .is_some_and(|free| *free == self.capacity)
        {
            self.free_cap.pop();
        }
        self.last_ordinal = self.free_cap.len() as i32 - 1;
    }

    /// Take one slot on `ordinal` for `vpod` in a private working copy.
    pub fn reserve(&mut self, vpod: &VPodKey, ordinal: i32) {
        self.adjust(vpod, ordinal, 1);
    }

    /// Give back one slot on `ordinal` held by `vpod` in a private working copy.
    pub fn release(&mut self, vpod: &VPodKey, ordinal: i32) {
        if self.replicas_on(vpod, ordinal) > 0 {
            self.adjust(vpod, ordinal, -1);
        }
    }
}

fn lookup(spread: &HashMap<VPodKey, HashMap<String, i32>>, vpod: &VPodKey, key: &str) -> i32 {
    spread
        .get(vpod)
        .and_then(|m| m.get(key))
        .copied()
        .unwrap_or(0)
}

fn bump(
    spread: &mut HashMap<VPodKey, HashMap<String, i32>>,
    vpod: &VPodKey,
    key: &str,
    delta: i32,
) {
    let per_vpod = spread.entry(vpod.clone()).or_default();
    let count = per_vpod.entry(key.to_string()).or_insert(0);
    *count += delta;
    if *count <= 0 {
        per_vpod.remove(key);
    }
    if per_vpod.is_empty() {
        spread.remove(vpod);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(ordinal: i32, zone: &str, node: &str) -> PodInfo {
        PodInfo {
            ordinal,
            zone: zone.to_string(),
            node: node.to_string(),
            schedulable: true,
        }
    }

    fn three_pod_state() -> State {
        let mut state = State::new("dispatcher", 10);
        state.add_pod(&pod(0, "zone-a", "node-0"));
        state.add_pod(&pod(1, "zone-b", "node-1"));
        state.add_pod(&pod(2, "zone-a", "node-2"));
        state
    }

    fn assert_free_capacity_invariant(state: &State) {
        let expected = state.capacity * (state.last_ordinal + 1) - state.total_placed();
        assert_eq!(state.free_capacity(), expected);
        for free in &state.free_cap {
            assert!((0..=state.capacity).contains(free));
        }
    }

    #[test]
    fn empty_state_has_no_last_ordinal() {
        let state = State::new("dispatcher", 10);
        assert_eq!(state.last_ordinal, -1);
        assert_eq!(state.free_capacity(), 0);
        assert_eq!(state.free(0), 10);
        assert_eq!(state.free(-1), 10);
    }

    #[test]
    fn add_pod_counts_domains() {
        let state = three_pod_state();
        assert_eq!(state.num_zones, 2);
        assert_eq!(state.num_nodes, 3);
        assert_eq!(state.schedulable_pods, vec![0, 1, 2]);
        assert_eq!(state.zone_of(2), Some("zone-a"));
    }

    #[test]
    fn unschedulable_pods_are_not_candidates() {
        let mut state = three_pod_state();
        let mut cordoned = pod(3, "zone-b", "node-3");
        cordoned.schedulable = false;
        state.add_pod(&cordoned);
        assert!(!state.schedulable_pods.contains(&3));
        assert_eq!(state.num_nodes, 4);
    }

    #[test]
    fn adjust_tracks_last_ordinal_and_spread() {
        let mut state = three_pod_state();
        let key = VPodKey::new("ns", "a");

        state.adjust(&key, 2, 4);
        assert_eq!(state.last_ordinal, 2);
        assert_eq!(state.free(2), 6);
        assert_eq!(state.free(0), 10);
        assert_eq!(state.replicas_on(&key, 2), 4);
        assert_eq!(state.zone_replicas(&key, "zone-a"), 4);
        assert_eq!(state.node_replicas(&key, "node-2"), 4);
        assert_free_capacity_invariant(&state);
    }

    #[test]
    fn placements_of_lists_ordinals_with_replicas() {
        let mut state = three_pod_state();
        let key = VPodKey::new("ns", "a");
        state.adjust(&key, 0, 3);
        state.adjust(&key, 2, 1);
        state.adjust(&VPodKey::new("ns", "b"), 1, 5);

        assert_eq!(state.placements_of(&key), BTreeMap::from([(0, 3), (2, 1)]));
        assert!(state.placements_of(&VPodKey::new("ns", "c")).is_empty());
    }

    #[test]
    fn release_shrinks_last_ordinal() {
        let mut state = three_pod_state();
        let key = VPodKey::new("ns", "a");

        state.reserve(&key, 0);
        state.reserve(&key, 2);
        state.release(&key, 2);

        assert_eq!(state.last_ordinal, 0);
        assert_eq!(state.free_cap, vec![9]);
        assert_eq!(state.replicas_on(&key, 2), 0);
        assert_free_capacity_invariant(&state);
    }

    #[test]
    fn release_without_placement_is_noop() {
        let mut state = three_pod_state();
        let key = VPodKey::new("ns", "a");
        state.release(&key, 1);
        assert_eq!(state.last_ordinal, -1);
        assert!(state.pod_spread.is_empty());
    }

    #[test]
    fn invariant_holds_across_many_vpods() {
        let mut state = three_pod_state();
        let a = VPodKey::new("ns", "a");
        let b = VPodKey::new("ns", "b");

        state.adjust(&a, 0, 7);
        state.adjust(&b, 0, 3);
        state.adjust(&b, 1, 5);

        assert_eq!(state.free(0), 0);
        assert_eq!(state.total_placed(), 15);
        assert_free_capacity_invariant(&state);
    }
}
