//! State accessor — rebuilds a [`State`] from the listers.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::{PodLister, VPodLister};
use crate::error::StateResult;
use crate::state::State;
use crate::types::*;

/// Produces fresh snapshots on demand.
pub trait StateAccessor: Send + Sync {
    /// Build a snapshot. `policy_override` replaces the configured scheduling
    /// policy for this snapshot only.
    fn state(&self, policy_override: Option<&SchedulerPolicy>) -> StateResult<State>;
}

/// The standard accessor: VPod lister + pod lister + pool settings.
#[derive(Clone)]
pub struct StateBuilder {
    statefulset_name: String,
    capacity: i32,
    strategy: SchedulerStrategy,
    sched_policy: Option<SchedulerPolicy>,
    desched_policy: Option<SchedulerPolicy>,
    vpod_lister: Arc<dyn VPodLister>,
    pod_lister: Arc<dyn PodLister>,
}

impl StateBuilder {
    pub fn new(
        statefulset_name: &str,
        capacity: i32,
        vpod_lister: Arc<dyn VPodLister>,
        pod_lister: Arc<dyn PodLister>,
    ) -> Self {
        Self {
            statefulset_name: statefulset_name.to_string(),
            capacity,
            strategy: SchedulerStrategy::MaxFillUp,
            sched_policy: None,
            desched_policy: None,
            vpod_lister,
            pod_lister,
        }
    }

    /// Rank pods with `policy` instead of the max-fill-up default.
    pub fn with_policy(mut self, policy: SchedulerPolicy) -> Self {
        self.strategy = SchedulerStrategy::Policy;
        self.sched_policy = Some(policy);
        self
    }

    /// Rank pods with `policy` when a VPod's placements must shrink.
    pub fn with_deschedule_policy(mut self, policy: SchedulerPolicy) -> Self {
        self.desched_policy = Some(policy);
        self
    }
}

impl StateAccessor for StateBuilder {
    fn state(&self, policy_override: Option<&SchedulerPolicy>) -> StateResult<State> {
        let vpods = self.vpod_lister.list_vpods()?;
        let pods = self.pod_lister.list_pods()?;

        let mut state = State::new(&self.statefulset_name, self.capacity);
        state.strategy = self.strategy;
        state.sched_policy = self.sched_policy.clone();
        state.desched_policy = self.desched_policy.clone();
        if let Some(policy) = policy_override {
            state.strategy = SchedulerStrategy::Policy;
            state.sched_policy = Some(policy.clone());
        }

        for pod in &pods {
            state.add_pod(pod);
        }

        for vpod in &vpods {
            for placement in &vpod.placements {
                let name = &placement.pod_name;
                let ordinal = match ordinal_from_pod_name(&self.statefulset_name, name) {
                    Ok(ordinal) => ordinal,
                    Err(e) => {
                        warn!(vpod = %vpod.key, error = %e, "skipping placement");
                        continue;
                    }
                };
                state.adjust(&vpod.key, ordinal, placement.vreplicas);
            }
        }

        debug!(
            pool = %self.statefulset_name,
            vpods = vpods.len(),
            pods = pods.len(),
            last_ordinal = state.last_ordinal,
            free = state.free_capacity(),
            "state refreshed"
        );

        Ok(state)
    }
}
