//! Autoscaler — resizes the pool and compacts trailing pods.
//!
//! Runs as a single loop woken by a periodic refresh (which may shrink the
//! pool and compact it) or by a pending hint from the scheduler (which may
//! only grow it). Each wake-up runs one pass, retried on transient failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use vpool_state::*;

use crate::error::{AutoscaleError, AutoscaleResult};
use crate::sizing::{compaction_targets, desired_replicas, scale_up_factor};

/// How long a failing pass keeps retrying before waiting for the next
/// stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Autoscaler settings.
#[derive(Debug, Clone)]
pub struct AutoscalerConfig {
    /// Name of the scalable pool (the StatefulSet).
    pub pool: String,
    /// Interval between scale-down-eligible passes.
    pub refresh_period: Duration,
    pub retry: RetryPolicy,
}

impl AutoscalerConfig {
    pub fn new(pool: &str, refresh_period: Duration) -> Self {
        Self {
            pool: pool.to_string(),
            refresh_period,
            retry: RetryPolicy::default(),
        }
    }
}

/// What one pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pool replica count was changed.
    Scaled { from: i32, to: i32 },
    /// The replica count was right; this many placements were evicted off
    /// the trailing pods.
    Compacted { evicted: usize },
    Unchanged,
}

/// Cloneable sender half of the autoscaler mailbox.
///
/// The mailbox holds one value: a hint sent while a pass is running
/// replaces any earlier unread hint.
#[derive(Clone)]
pub struct AutoscalerHandle {
    tx: Arc<watch::Sender<i32>>,
}

impl AutoscaleTrigger for AutoscalerHandle {
    fn autoscale(&self, pending: i32) {
        self.tx.send_replace(pending);
    }
}

/// Sizes the pool from pending virtual replicas.
pub struct Autoscaler {
    config: AutoscalerConfig,
    accessor: Arc<dyn StateAccessor>,
    vpods: Arc<dyn VPodLister>,
    scale: Arc<dyn ScaleClient>,
    evictor: Arc<dyn Evictor>,
    handle: AutoscalerHandle,
    trigger: watch::Receiver<i32>,
}

impl Autoscaler {
    pub fn new(
        config: AutoscalerConfig,
        accessor: Arc<dyn StateAccessor>,
        vpods: Arc<dyn VPodLister>,
        scale: Arc<dyn ScaleClient>,
        evictor: Arc<dyn Evictor>,
    ) -> Self {
        let (tx, trigger) = watch::channel(0);
        Self {
            config,
            accessor,
            vpods,
            scale,
            evictor,
            handle: AutoscalerHandle { tx: Arc::new(tx) },
            trigger,
        }
    }

    /// A handle for the scheduler to post pending hints to.
    pub fn handle(&self) -> AutoscalerHandle {
        self.handle.clone()
    }

    /// Run the autoscaler loop until `shutdown` changes.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            pool = %self.config.pool,
            refresh_secs = self.config.refresh_period.as_secs(),
            "autoscaler started"
        );

        loop {
            let (attempt_scale_down, pending) = tokio::select! {
                _ = tokio::time::sleep(self.config.refresh_period) => (true, 0),
                // The sender lives in `self.handle`, so the channel never closes.
                _ = self.trigger.changed() => (false, *self.trigger.borrow_and_update()),
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            };

            self.pass_with_retry(attempt_scale_down, pending).await;
        }
    }

    /// Run one pass, retrying every `retry.interval` until it succeeds or
    /// `retry.timeout` has passed.
    pub async fn pass_with_retry(
        &self,
        attempt_scale_down: bool,
        pending: i32,
    ) -> Option<PassOutcome> {
        let RetryPolicy { interval, timeout } = self.config.retry;
        let deadline = Instant::now() + timeout;

        loop {
            match self.pass(attempt_scale_down, pending).await {
                Ok(outcome) => return Some(outcome),
                Err(e) if Instant::now() + interval <= deadline => {
                    info!(error = %e, "autoscale pass failed (will retry)");
                    tokio::time::sleep(interval).await;
                }
                Err(e) => {
                    warn!(error = %e, "autoscale pass failed, waiting for next trigger");
                    return None;
                }
            }
        }
    }

    /// One autoscale pass over a fresh snapshot.
    pub async fn pass(
        &self,
        attempt_scale_down: bool,
        pending: i32,
    ) -> AutoscaleResult<PassOutcome> {
        let state = self.accessor.state(None)?;
        let pool = self.config.pool.as_str();
        let current = self.scale.get_scale(pool).await.map_err(AutoscaleError::Scale)?;

        let factor = scale_up_factor(&state);
        info!(
            %pool,
            pending,
            replicas = current,
            last_ordinal = state.last_ordinal,
            factor,
            "checking pool capacity"
        );

        let desired = desired_replicas(&state, current, pending, attempt_scale_down, factor);
        if desired != current {
            self.scale
                .update_scale(pool, desired)
                .await
                .map_err(AutoscaleError::Scale)?;
            info!(%pool, from = current, to = desired, "pool replicas updated");
            return Ok(PassOutcome::Scaled {
                from: current,
                to: desired,
            });
        }

        if !attempt_scale_down {
            return Ok(PassOutcome::Unchanged);
        }

        let Some(targets) = compaction_targets(&state, factor) else {
            debug!(%pool, last_ordinal = state.last_ordinal, "nothing to compact");
            return Ok(PassOutcome::Unchanged);
        };

        // A failed compaction is not retried: evictions already made stand
        // and the scheduler re-places them.
        let evicted = match self.compact(&targets).await {
            Ok(evicted) => evicted,
            Err(e) => {
                error!(%pool, error = %e, "virtual replica compaction failed");
                match e {
                    AutoscaleError::Evict { evicted, .. } => evicted,
                    _ => 0,
                }
            }
        };
        Ok(PassOutcome::Compacted { evicted })
    }

    /// Evict every placement on the `targets` ordinals.
    ///
    /// Stops at the first failed eviction; earlier evictions are not undone.
    pub async fn compact(&self, targets: &[i32]) -> AutoscaleResult<usize> {
        let vpods = self.vpods.list_vpods()?;
        let mut evicted = 0;

        for vpod in &vpods {
            for placement in &vpod.placements {
                let Ok(ordinal) = ordinal_from_pod_name(&self.config.pool, &placement.pod_name)
                else {
                    continue;
                };
                if !targets.contains(&ordinal) {
                    continue;
                }

                self.evictor
                    .evict(vpod, placement)
                    .await
                    .map_err(|reason| AutoscaleError::Evict {
                        vpod: vpod.key.clone(),
                        pod: placement.pod_name.clone(),
                        evicted,
                        reason,
                    })?;
                evicted += 1;
                info!(
                    vpod = %vpod.key,
                    pod = %placement.pod_name,
                    vreplicas = placement.vreplicas,
                    "placement evicted for compaction"
                );
            }
        }

        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(cluster: &InMemoryCluster, name: &str, placements: &[(i32, i32)]) {
        let mut vpod = VPod::new(VPodKey::new("ns", name), placements.iter().map(|p| p.1).sum());
        vpod.placements = placements
            .iter()
            .map(|(ordinal, n)| Placement {
                pod_name: pod_name_from_ordinal("d", *ordinal),
                vreplicas: *n,
            })
            .collect();
        cluster.put_vpod(vpod);
    }

    fn setup(replicas: i32, refresh_period: Duration) -> (Arc<InMemoryCluster>, Autoscaler) {
        let cluster = Arc::new(InMemoryCluster::new(replicas, &["zone-a"]));
        let accessor = StateBuilder::new("d", 10, cluster.clone(), cluster.clone());
        let scaler = Autoscaler::new(
            AutoscalerConfig::new("d", refresh_period),
            Arc::new(accessor),
            cluster.clone(),
            cluster.clone(),
            cluster.clone(),
        );
        (cluster, scaler)
    }

    #[tokio::test]
    async fn pending_hint_scales_up() {
        let (cluster, scaler) = setup(1, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 10)]);

        let outcome = scaler.pass(false, 15).await.unwrap();

        assert_eq!(outcome, PassOutcome::Scaled { from: 1, to: 3 });
        assert_eq!(cluster.scale_updates(), vec![3]);
    }

    #[tokio::test]
    async fn pending_hint_never_shrinks() {
        let (cluster, scaler) = setup(5, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 4)]);

        let outcome = scaler.pass(false, 1).await.unwrap();

        assert_eq!(outcome, PassOutcome::Unchanged);
        assert!(cluster.scale_updates().is_empty());
    }

    #[tokio::test]
    async fn refresh_shrinks_to_last_ordinal() {
        let (cluster, scaler) = setup(5, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 4)]);

        let outcome = scaler.pass(true, 0).await.unwrap();

        assert_eq!(outcome, PassOutcome::Scaled { from: 5, to: 1 });
        assert_eq!(cluster.replicas(), 1);
    }

    #[tokio::test]
    async fn refresh_compacts_last_pod() {
        let (cluster, scaler) = setup(2, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 5)]);
        put(&cluster, "b", &[(1, 3)]);

        let outcome = scaler.pass(true, 0).await.unwrap();

        assert_eq!(outcome, PassOutcome::Compacted { evicted: 1 });
        let evictions = cluster.evictions();
        assert_eq!(evictions.len(), 1);
        assert_eq!(evictions[0].0, VPodKey::new("ns", "b"));
        assert_eq!(evictions[0].1.pod_name, "d-1");
        assert!(cluster.vpod(&VPodKey::new("ns", "b")).unwrap().placements.is_empty());
    }

    #[tokio::test]
    async fn pending_hint_never_compacts() {
        let (cluster, scaler) = setup(2, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 5)]);
        put(&cluster, "b", &[(1, 3)]);

        // Pod 0 could absorb pod 1, but only the refresh pass may compact.
        assert_eq!(scaler.pass(false, 0).await.unwrap(), PassOutcome::Unchanged);
        assert!(cluster.evictions().is_empty());
        assert_eq!(cluster.vpod(&VPodKey::new("ns", "b")).unwrap().placed(), 3);

        assert_eq!(
            scaler.pass(true, 0).await.unwrap(),
            PassOutcome::Compacted { evicted: 1 }
        );
        assert_eq!(cluster.evictions().len(), 1);
    }

    #[tokio::test]
    async fn full_pool_is_not_compacted() {
        let (cluster, scaler) = setup(2, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 9), (1, 3)]);

        assert_eq!(scaler.pass(true, 0).await.unwrap(), PassOutcome::Unchanged);
        assert!(cluster.evictions().is_empty());
    }

    #[tokio::test]
    async fn eviction_failure_aborts_compaction() {
        let (cluster, scaler) = setup(2, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 2), (1, 1)]);
        put(&cluster, "b", &[(1, 2)]);
        cluster.fail_next_evictions(1);

        let err = scaler.compact(&[1]).await.unwrap_err();

        assert!(matches!(err, AutoscaleError::Evict { evicted: 0, .. }));
        assert!(cluster.evictions().is_empty());
        assert_eq!(cluster.vpod(&VPodKey::new("ns", "b")).unwrap().placed(), 2);
    }

    #[tokio::test]
    async fn scale_failure_fails_the_pass() {
        let (cluster, scaler) = setup(1, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 10)]);
        cluster.fail_next_scale_calls(1);

        let err = scaler.pass(false, 5).await.unwrap_err();
        assert!(matches!(err, AutoscaleError::Scale(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let (cluster, scaler) = setup(1, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 10)]);
        cluster.fail_next_scale_calls(2);

        let start = Instant::now();
        let outcome = scaler.pass_with_retry(false, 5).await;

        assert_eq!(outcome, Some(PassOutcome::Scaled { from: 1, to: 2 }));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_give_up_after_timeout() {
        let (cluster, scaler) = setup(1, Duration::from_secs(30));
        cluster.fail_next_lists(1000);

        let start = Instant::now();
        assert_eq!(scaler.pass_with_retry(true, 0).await, None);

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(4500) && elapsed < Duration::from_millis(5100));
    }

    #[tokio::test(start_paused = true)]
    async fn hint_wakes_the_loop_before_refresh() {
        let (cluster, mut scaler) = setup(1, Duration::from_secs(3600));
        put(&cluster, "a", &[(0, 10)]);
        let handle = scaler.handle();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { scaler.run(shutdown_rx).await });

        handle.autoscale(15);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cluster.scale_updates(), vec![3]);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn latest_hint_wins() {
        let (cluster, mut scaler) = setup(1, Duration::from_secs(3600));
        put(&cluster, "a", &[(0, 10)]);
        let handle = scaler.handle();
        handle.autoscale(5);
        handle.autoscale(25);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { scaler.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cluster.scale_updates(), vec![4]);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_period_allows_scale_down() {
        let (cluster, mut scaler) = setup(3, Duration::from_secs(30));
        put(&cluster, "a", &[(0, 4)]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { scaler.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(cluster.scale_updates().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cluster.scale_updates(), vec![1]);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
