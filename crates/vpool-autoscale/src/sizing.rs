//! Pure sizing and compaction decisions over a snapshot.

use vpool_state::{AVAILABILITY_NODE_PRIORITY, AVAILABILITY_ZONE_PRIORITY, SchedulerStrategy, State};

/// Pods added per scale-up step.
///
/// HA policies grow the pool one pod per failure domain at a time so the
/// spread stays even: zones win over nodes when both priorities are set.
pub fn scale_up_factor(state: &State) -> i32 {
    let factor = match &state.sched_policy {
        Some(policy) if policy.has_priority(AVAILABILITY_ZONE_PRIORITY) => state.num_zones,
        Some(policy) if policy.has_priority(AVAILABILITY_NODE_PRIORITY) => state.num_nodes,
        _ => 1,
    };
    factor.max(1)
}

/// Replica count the pool should have.
///
/// Starts from the pods that hold placements, adds whole scale-up steps for
/// `pending`, never drops below `last_ordinal`, and only shrinks below
/// `current` when `attempt_scale_down` is set.
pub fn desired_replicas(
    state: &State,
    current: i32,
    pending: i32,
    attempt_scale_down: bool,
    factor: i32,
) -> i32 {
    let factor = factor.max(1);
    let mut desired = state.last_ordinal + 1;

    if pending > 0 {
        let capacity = state.capacity.max(1);
        let pods = (pending + capacity - 1) / capacity;
        desired += (pods + factor - 1) / factor * factor;
    }

    if desired <= state.last_ordinal {
        desired = state.last_ordinal + factor;
    }

    if !attempt_scale_down && desired < current {
        desired = current;
    }
    desired
}

/// Ordinals whose placements can all move onto lower pods, highest first.
///
/// `None` when there is a single pod in use or when the rest of the pool
/// lacks the free capacity to absorb the trailing group.
pub fn compaction_targets(state: &State, factor: i32) -> Option<Vec<i32>> {
    let last = state.last_ordinal;
    if last < 1 {
        return None;
    }

    let group: Vec<i32> = match (state.strategy, &state.sched_policy) {
        (SchedulerStrategy::MaxFillUp, _) => vec![last],
        (SchedulerStrategy::Policy, Some(_)) => (0..factor.max(1))
            .map(|i| last - i)
            .take_while(|o| *o >= 0)
            .collect(),
        (SchedulerStrategy::Policy, None) => return None,
    };

    let group_free: i32 = group.iter().map(|&o| state.free(o)).sum();
    let free_elsewhere = state.free_capacity() - group_free;
    let used_in_group = state.capacity * group.len() as i32 - group_free;

    (free_elsewhere >= used_in_group).then_some(group)
}
