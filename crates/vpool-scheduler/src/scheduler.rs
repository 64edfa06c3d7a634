//! Scheduler — serialized placement passes over fresh snapshots.
//!
//! Placements returned by a pass stay reserved until the VPod lister shows a
//! change for that VPod, so a pass that runs before the caller persisted the
//! previous one still sees those slots as taken.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use vpool_plugins::PluginRegistry;
use vpool_state::{AutoscaleTrigger, Placement, State, StateAccessor, VPod, VPodKey};

use crate::error::SchedulerResult;
use crate::pipeline::{ScheduleOutcome, schedule_vpod};

/// Placements handed out for one VPod, keyed by ordinal.
struct Reservation {
    /// What the lister reported when the placements were handed out.
    listed: BTreeMap<i32, i32>,
    booked: BTreeMap<i32, i32>,
}

type Reservations = HashMap<VPodKey, Reservation>;

/// Places virtual replicas of VPods onto the pool.
pub struct Scheduler {
    accessor: Arc<dyn StateAccessor>,
    registry: Arc<PluginRegistry>,
    /// Receives the pending count whenever a pass leaves replicas unplaced.
    trigger: Option<Arc<dyn AutoscaleTrigger>>,
    /// Placements handed out but not yet visible through the lister. The
    /// lock also serializes passes pool-wide.
    reserved: Mutex<Reservations>,
}

impl Scheduler {
    pub fn new(accessor: Arc<dyn StateAccessor>, registry: Arc<PluginRegistry>) -> Self {
        Self {
            accessor,
            registry,
            trigger: None,
            reserved: Mutex::new(HashMap::new()),
        }
    }

    /// Forward pending counts to `trigger`.
    pub fn with_autoscale_trigger(mut self, trigger: Arc<dyn AutoscaleTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Compute the new placement list for `vpod`.
    ///
    /// `vpod.placements` must be the placements the VPod lister currently
    /// reports. The caller persists the returned placements; the scheduler
    /// itself never writes.
    pub async fn schedule(&self, vpod: &VPod) -> SchedulerResult<ScheduleOutcome> {
        let mut reserved = self.reserved.lock().await;

        let mut state = self.accessor.state(None)?;
        let listed = state.placements_of(&vpod.key);
        fold_reserved(&mut state, &mut reserved);

        let outcome = match reserved.get(&vpod.key) {
            Some(reservation) => {
                let mut request = vpod.clone();
                request.placements = to_placements(&state, &reservation.booked);
                schedule_vpod(&self.registry, &mut state, &request)
            }
            None => schedule_vpod(&self.registry, &mut state, vpod),
        };

        let booked = state.placements_of(&vpod.key);
        if booked == listed {
            reserved.remove(&vpod.key);
        } else {
            reserved.insert(vpod.key.clone(), Reservation { listed, booked });
        }

        if outcome.pending > 0 {
            if let Some(trigger) = &self.trigger {
                trigger.autoscale(outcome.pending);
            }
            info!(
                vpod = %vpod.key,
                vreplicas = vpod.vreplicas,
                pending = outcome.pending,
                "not enough capacity, autoscale requested"
            );
        } else {
            debug!(
                vpod = %vpod.key,
                vreplicas = vpod.vreplicas,
                pods = outcome.placements.len(),
                "vpod scheduled"
            );
        }

        Ok(outcome)
    }
}

/// Overlay reservations on a fresh snapshot. A reservation is dropped once
/// the lister reports anything other than what it reported when the
/// placements were handed out.
fn fold_reserved(state: &mut State, reserved: &mut Reservations) {
    reserved.retain(|key, reservation| {
        let listed = state.placements_of(key);
        if listed != reservation.listed {
            debug!(vpod = %key, "reservation released");
            return false;
        }
        let booked = &reservation.booked;
        let ordinals: BTreeSet<i32> = listed.keys().chain(booked.keys()).copied().collect();
        for ordinal in ordinals {
            let want = booked.get(&ordinal).copied().unwrap_or(0);
            let have = listed.get(&ordinal).copied().unwrap_or(0);
            state.adjust(key, ordinal, want - have);
        }
        true
    });
}

fn to_placements(state: &State, counts: &BTreeMap<i32, i32>) -> Vec<Placement> {
    counts
        .iter()
        .map(|(ordinal, vreplicas)| Placement {
            pod_name: state.pod_name(*ordinal),
            vreplicas: *vreplicas,
        })
        .collect()
}
