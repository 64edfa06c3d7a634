//! Filter → score → normalize → select, over a private working snapshot.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use vpool_plugins::{PluginRegistry, PodScore, Status};
use vpool_state::*;

/// Result of one scheduling pass for one VPod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleOutcome {
    /// The complete placement list for the VPod, ordered by ordinal.
    pub placements: Vec<Placement>,
    /// Virtual replicas that fit on no existing pod.
    pub pending: i32,
}

/// One configured plugin invocation.
#[derive(Debug, Clone, Copy)]
struct Step<'a> {
    name: &'a str,
    weight: u64,
    args: Option<&'a str>,
}

/// Filters and priorities applied when adding replicas.
fn placement_steps(state: &State) -> (Vec<Step<'_>>, Vec<Step<'_>>) {
    match (&state.strategy, &state.sched_policy) {
        (SchedulerStrategy::Policy, Some(policy)) => steps_of(policy),
        _ => (
            vec![Step {
                name: POD_FITS_RESOURCES,
                weight: 1,
                args: None,
            }],
            vec![Step {
                name: LOWEST_ORDINAL_PRIORITY,
                weight: 1,
                args: None,
            }],
        ),
    }
}

/// Filters and priorities applied when removing replicas.
fn removal_steps(state: &State) -> (Vec<Step<'_>>, Vec<Step<'_>>) {
    match &state.desched_policy {
        Some(policy) => steps_of(policy),
        None => (
            Vec::new(),
            vec![Step {
                name: REMOVE_WITH_HIGHEST_ORDINAL_PRIORITY,
                weight: 1,
                args: None,
            }],
        ),
    }
}

fn steps_of(policy: &SchedulerPolicy) -> (Vec<Step<'_>>, Vec<Step<'_>>) {
    let filters = policy
        .predicates
        .iter()
        .map(|p| Step {
            name: &p.name,
            weight: 1,
            args: p.args.as_deref(),
        })
        .collect();
    let scores = policy
        .priorities
        .iter()
        .map(|p| Step {
            name: &p.name,
            weight: p.weight,
            args: p.args.as_deref(),
        })
        .collect();
    (filters, scores)
}

fn run_filter(
    registry: &PluginRegistry,
    step: &Step<'_>,
    state: &State,
    vpod: &VPodKey,
    ordinal: i32,
) -> Status {
    match registry.filter(step.name) {
        Some(plugin) => plugin.filter(step.args, state, vpod, ordinal),
        None => Status::error(&format!("unknown filter plugin {}", step.name)),
    }
}

/// Run `filters` then `scores` over `candidates`, returning the survivors
/// with their weighted, normalized totals.
///
/// Totals are accumulated in `u128` so that several near-maximal scores
/// never wrap.
fn rank(
    registry: &PluginRegistry,
    state: &State,
    vpod: &VPodKey,
    candidates: &[i32],
    filters: &[Step<'_>],
    scores: &[Step<'_>],
) -> Vec<(i32, u128)> {
    let feasible: Vec<i32> = candidates
        .iter()
        .copied()
        .filter(|&ordinal| {
            filters.iter().all(|step| {
                let status = run_filter(registry, step, state, vpod, ordinal);
                if !status.is_success() {
                    debug!(%vpod, ordinal, plugin = step.name, %status, "pod filtered out");
                }
                status.is_success()
            })
        })
        .collect();

    let mut totals: Vec<Option<u128>> = vec![Some(0); feasible.len()];
    for step in scores {
        let Some(plugin) = registry.score(step.name) else {
            warn!(%vpod, plugin = step.name, "unknown score plugin");
            totals.iter_mut().for_each(|t| *t = None);
            continue;
        };

        let mut list: Vec<PodScore> = Vec::with_capacity(feasible.len());
        for (i, &ordinal) in feasible.iter().enumerate() {
            let (score, status) = plugin.score(step.args, state, vpod, ordinal);
            if !status.is_success() {
                debug!(%vpod, ordinal, plugin = step.name, %status, "pod not scored");
                totals[i] = None;
            }
            list.push(PodScore { ordinal, score });
        }

        let status = plugin.normalize_score(step.args, state, vpod, &mut list);
        if !status.is_success() {
            warn!(%vpod, plugin = step.name, %status, "score normalization failed");
            totals.iter_mut().for_each(|t| *t = None);
            continue;
        }

        for (total, scored) in totals.iter_mut().zip(&list) {
            if let Some(total) = total {
                *total = total.saturating_add(u128::from(scored.score) * u128::from(step.weight));
            }
        }
    }

    feasible
        .into_iter()
        .zip(totals)
        .filter_map(|(ordinal, total)| total.map(|t| (ordinal, t)))
        .collect()
}

/// Best pod for one more replica: highest total, lowest ordinal on ties.
fn select_for_placement(registry: &PluginRegistry, state: &State, vpod: &VPodKey) -> Option<i32> {
    let candidates: Vec<i32> = state
        .schedulable_pods
        .iter()
        .copied()
        .filter(|&ordinal| state.free(ordinal) > 0)
        .collect();
    let (filters, scores) = placement_steps(state);

    let mut best: Option<(i32, u128)> = None;
    for (ordinal, total) in rank(registry, state, vpod, &candidates, &filters, &scores) {
        if best.is_none_or(|(_, b)| total > b) {
            best = Some((ordinal, total));
        }
    }
    best.map(|(ordinal, _)| ordinal)
}

/// Pod to take one replica off: highest total, highest ordinal on ties.
fn select_for_removal(
    registry: &PluginRegistry,
    state: &State,
    vpod: &VPodKey,
    counts: &BTreeMap<i32, i32>,
) -> Option<i32> {
    let candidates: Vec<i32> = counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(ordinal, _)| *ordinal)
        .collect();
    let (filters, scores) = removal_steps(state);

    let mut best: Option<(i32, u128)> = None;
    for (ordinal, total) in rank(registry, state, vpod, &candidates, &filters, &scores) {
        if best.is_none_or(|(_, b)| total >= b) {
            best = Some((ordinal, total));
        }
    }
    // Placements must never exceed the desired count, so fall back to the
    // trailing pod when every candidate was filtered out.
    best.map(|(ordinal, _)| ordinal).or_else(|| candidates.last().copied())
}

/// Converge `vpod`'s placements toward its desired count using `state` as
/// the working snapshot.
///
/// `state` must already include the VPod's current placements; it is
/// updated in place as replicas are reserved or released.
pub fn schedule_vpod(registry: &PluginRegistry, state: &mut State, vpod: &VPod) -> ScheduleOutcome {
    let key = &vpod.key;
    let mut counts: BTreeMap<i32, i32> = BTreeMap::new();
    for placement in &vpod.placements {
        match ordinal_from_pod_name(&state.statefulset_name, &placement.pod_name) {
            Ok(ordinal) => *counts.entry(ordinal).or_insert(0) += placement.vreplicas,
            Err(e) => warn!(vpod = %key, error = %e, "ignoring placement"),
        }
    }
    let placed: i32 = counts.values().sum();
    let mut pending = 0;

    if vpod.vreplicas > placed {
        let missing = vpod.vreplicas - placed;
        for unit in 0..missing {
            match select_for_placement(registry, state, key) {
                Some(ordinal) => {
                    state.reserve(key, ordinal);
                    *counts.entry(ordinal).or_insert(0) += 1;
                    debug!(vpod = %key, ordinal, "virtual replica placed");
                }
                None => {
                    pending = missing - unit;
                    debug!(vpod = %key, pending, "no pod can take more virtual replicas");
                    break;
                }
            }
        }
    } else if placed > vpod.vreplicas {
        for _ in 0..(placed - vpod.vreplicas) {
            let Some(ordinal) = select_for_removal(registry, state, key, &counts) else {
                break;
            };
            state.release(key, ordinal);
            if let Some(n) = counts.get_mut(&ordinal) {
                *n -= 1;
            }
            debug!(vpod = %key, ordinal, "virtual replica removed");
        }
    }

    let placements = counts
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(ordinal, vreplicas)| Placement {
            pod_name: state.pod_name(ordinal),
            vreplicas,
        })
        .collect();

    ScheduleOutcome { placements, pending }
}
