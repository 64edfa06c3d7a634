//! In-memory implementation of every collaborator contract.
//!
//! Backs the simulation daemon and the tests of the scheduler and
//! autoscaler. Pods are spread round-robin over the configured zones and
//! nodes. Failure injection counters make the next N calls fail, which is
//! how transient errors are exercised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::client::{AutoscaleTrigger, BoxFuture, Evictor, PodLister, ScaleClient, VPodLister};
use crate::error::{StateError, StateResult};
use crate::types::*;

#[derive(Default)]
struct Inner {
    replicas: i32,
    vpods: BTreeMap<VPodKey, VPod>,
    cordoned: BTreeSet<i32>,
    evictions: Vec<(VPodKey, Placement)>,
    scale_updates: Vec<i32>,
    autoscale_hints: Vec<i32>,
    list_failures: u32,
    scale_failures: u32,
    evict_failures: u32,
}

/// A worker pool and its VPods held entirely in memory.
pub struct InMemoryCluster {
    zones: Vec<String>,
    nodes: Vec<String>,
    inner: RwLock<Inner>,
}

impl InMemoryCluster {
    /// A pool of `replicas` pods spread over `zones`, one node per pod.
    pub fn new(replicas: i32, zones: &[&str]) -> Self {
        let zones = if zones.is_empty() {
            vec!["default".to_string()]
        } else {
            zones.iter().map(|z| z.to_string()).collect()
        };
        Self {
            zones,
            nodes: Vec::new(),
            inner: RwLock::new(Inner {
                replicas,
                ..Inner::default()
            }),
        }
    }

    /// Spread pods round-robin over a fixed set of nodes.
    pub fn with_nodes(mut self, nodes: &[&str]) -> Self {
        self.nodes = nodes.iter().map(|n| n.to_string()).collect();
        self
    }

    // ── Fixture management ─────────────────────────────────────────

    /// Insert or replace a VPod.
    pub fn put_vpod(&self, vpod: VPod) {
        self.write().vpods.insert(vpod.key.clone(), vpod);
    }

    pub fn vpod(&self, key: &VPodKey) -> Option<VPod> {
        self.read().vpods.get(key).cloned()
    }

    pub fn vpods(&self) -> Vec<VPod> {
        self.read().vpods.values().cloned().collect()
    }

    /// Replace the placements of a VPod, as the owning system would after
    /// a scheduling pass.
    pub fn set_placements(&self, key: &VPodKey, placements: Vec<Placement>) {
        if let Some(vpod) = self.write().vpods.get_mut(key) {
            vpod.placements = placements;
        }
    }

    pub fn replicas(&self) -> i32 {
        self.read().replicas
    }

    /// Mark a pod unschedulable.
    pub fn cordon(&self, ordinal: i32) {
        self.write().cordoned.insert(ordinal);
    }

    pub fn evictions(&self) -> Vec<(VPodKey, Placement)> {
        self.read().evictions.clone()
    }

    pub fn scale_updates(&self) -> Vec<i32> {
        self.read().scale_updates.clone()
    }

    pub fn autoscale_hints(&self) -> Vec<i32> {
        self.read().autoscale_hints.clone()
    }

    pub fn fail_next_lists(&self, n: u32) {
        self.write().list_failures = n;
    }

    pub fn fail_next_scale_calls(&self, n: u32) {
        self.write().scale_failures = n;
    }

    pub fn fail_next_evictions(&self, n: u32) {
        self.write().evict_failures = n;
    }

    fn pod_info(&self, ordinal: i32, cordoned: &BTreeSet<i32>) -> PodInfo {
        let idx = ordinal as usize;
        let zone = self.zones[idx % self.zones.len()].clone();
        let node = if self.nodes.is_empty() {
            format!("node-{ordinal}")
        } else {
            self.nodes[idx % self.nodes.len()].clone()
        };
        PodInfo {
            ordinal,
            zone,
            node,
            schedulable: !cordoned.contains(&ordinal),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

impl VPodLister for InMemoryCluster {
    fn list_vpods(&self) -> StateResult<Vec<VPod>> {
        let mut inner = self.write();
        if take_failure(&mut inner.list_failures) {
            return Err(StateError::ListVPods("injected failure".to_string()));
        }
        Ok(inner.vpods.values().cloned().collect())
    }
}

impl PodLister for InMemoryCluster {
    fn list_pods(&self) -> StateResult<Vec<PodInfo>> {
        let inner = self.read();
        Ok((0..inner.replicas)
            .map(|ordinal| self.pod_info(ordinal, &inner.cordoned))
            .collect())
    }
}

impl ScaleClient for InMemoryCluster {
    fn get_scale<'a>(&'a self, _pool: &'a str) -> BoxFuture<'a, anyhow::Result<i32>> {
        Box::pin(async move {
            let mut inner = self.write();
            if take_failure(&mut inner.scale_failures) {
                anyhow::bail!("injected scale read failure");
            }
            Ok(inner.replicas)
        })
    }

    fn update_scale<'a>(
        &'a self,
        pool: &'a str,
        replicas: i32,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let mut inner = self.write();
            if take_failure(&mut inner.scale_failures) {
                anyhow::bail!("injected scale write failure");
            }
            debug!(%pool, from = inner.replicas, to = replicas, "pool resized");
            inner.replicas = replicas;
            inner.scale_updates.push(replicas);
            Ok(())
        })
    }
}

impl Evictor for InMemoryCluster {
    fn evict<'a>(
        &'a self,
        vpod: &'a VPod,
        placement: &'a Placement,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let mut inner = self.write();
            if take_failure(&mut inner.evict_failures) {
                anyhow::bail!("injected eviction failure");
            }
            if let Some(stored) = inner.vpods.get_mut(&vpod.key) {
                stored.placements.retain(|p| p.pod_name != placement.pod_name);
            }
            inner.evictions.push((vpod.key.clone(), placement.clone()));
            Ok(())
        })
    }
}

impl AutoscaleTrigger for InMemoryCluster {
    fn autoscale(&self, pending: i32) {
        self.write().autoscale_hints.push(pending);
    }
}
