//! Wires the scheduler and the autoscaler to a simulated pool.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use vpool_autoscale::Autoscaler;
use vpool_plugins::PluginRegistry;
use vpool_scheduler::Scheduler;
use vpool_state::*;

use crate::config::Config;

/// Scheduling result for one VPod, as printed by `vpoold schedule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VPodReport {
    pub vpod: String,
    pub vreplicas: i32,
    pub placements: Vec<Placement>,
    pub pending: i32,
}

/// The in-memory pool plus the scheduler and autoscaler driving it.
pub struct Daemon {
    cluster: Arc<InMemoryCluster>,
    scheduler: Scheduler,
    autoscaler: Autoscaler,
    reconcile_period: Duration,
}

impl Daemon {
    pub fn new(config: &Config, registry: PluginRegistry) -> anyhow::Result<Self> {
        let zones: Vec<&str> = config.cluster.zones.iter().map(String::as_str).collect();
        let mut cluster = InMemoryCluster::new(config.cluster.replicas, &zones);
        if !config.cluster.nodes.is_empty() {
            let nodes: Vec<&str> = config.cluster.nodes.iter().map(String::as_str).collect();
            cluster = cluster.with_nodes(&nodes);
        }
        for ordinal in &config.cluster.cordoned {
            cluster.cordon(*ordinal);
        }
        let cluster = Arc::new(cluster);
        for vpod in config.vpods() {
            cluster.put_vpod(vpod);
        }

        let mut accessor = StateBuilder::new(
            &config.pool.name,
            config.pool.capacity,
            cluster.clone(),
            cluster.clone(),
        );
        if config.strategy() == SchedulerStrategy::Policy
            && let Some(policy) = &config.policy
        {
            accessor = accessor.with_policy(policy.clone());
        }
        if let Some(policy) = &config.deschedule_policy {
            accessor = accessor.with_deschedule_policy(policy.clone());
        }
        let accessor: Arc<dyn StateAccessor> = Arc::new(accessor);

        let autoscaler = Autoscaler::new(
            config.autoscaler_config()?,
            accessor.clone(),
            cluster.clone(),
            cluster.clone(),
            cluster.clone(),
        );
        let scheduler =
            Scheduler::new(accessor, Arc::new(registry))
                .with_autoscale_trigger(Arc::new(autoscaler.handle()));

        info!(
            pool = %config.pool.name,
            capacity = config.pool.capacity,
            replicas = config.cluster.replicas,
            vpods = config.vpods.len(),
            strategy = ?config.strategy(),
            "daemon initialized"
        );

        Ok(Self {
            cluster,
            scheduler,
            autoscaler,
            reconcile_period: config.reconcile_period()?,
        })
    }

    pub fn cluster(&self) -> &Arc<InMemoryCluster> {
        &self.cluster
    }

    /// Schedule every VPod once and persist the new placements.
    pub async fn schedule_all(&self) -> anyhow::Result<Vec<VPodReport>> {
        reconcile(&self.cluster, &self.scheduler).await
    }

    /// Run the autoscaler loop and a periodic reschedule of every VPod until
    /// `shutdown` changes.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        let Self {
            cluster,
            scheduler,
            autoscaler,
            reconcile_period,
        } = self;

        tokio::join!(
            autoscaler.run(shutdown.clone()),
            reconcile_loop(cluster, scheduler, *reconcile_period, shutdown),
        );
        info!("daemon stopped");
    }
}

async fn reconcile(
    cluster: &InMemoryCluster,
    scheduler: &Scheduler,
) -> anyhow::Result<Vec<VPodReport>> {
    let mut reports = Vec::new();
    for vpod in cluster.vpods() {
        let outcome = scheduler.schedule(&vpod).await?;
        cluster.set_placements(&vpod.key, outcome.placements.clone());
        reports.push(VPodReport {
            vpod: vpod.key.to_string(),
            vreplicas: vpod.vreplicas,
            placements: outcome.placements,
            pending: outcome.pending,
        });
    }
    Ok(reports)
}

async fn reconcile_loop(
    cluster: &InMemoryCluster,
    scheduler: &Scheduler,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        match reconcile(cluster, scheduler).await {
            Ok(reports) => {
                let pending: i32 = reports.iter().map(|r| r.pending).sum();
                info!(vpods = reports.len(), pending, replicas = cluster.replicas(), "reconciled");
            }
            Err(e) => warn!(error = %e, "reconcile failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = shutdown.changed() => break,
        }
    }
}
