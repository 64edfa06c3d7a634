//! Contracts for the external collaborators of the core.
//!
//! Listing is synchronous (the hosting application answers from a cache);
//! scaling and eviction talk to a remote API and return boxed futures.

use std::future::Future;
use std::pin::Pin;

use crate::error::StateResult;
use crate::types::{Placement, PodInfo, VPod};

/// Boxed, sendable future returned by the async collaborators.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lists every VPod with its current placements.
pub trait VPodLister: Send + Sync {
    fn list_vpods(&self) -> StateResult<Vec<VPod>>;
}

/// Lists the pods that currently exist in the pool.
pub trait PodLister: Send + Sync {
    fn list_pods(&self) -> StateResult<Vec<PodInfo>>;
}

/// Reads and writes the replica count of the pool.
pub trait ScaleClient: Send + Sync {
    fn get_scale<'a>(&'a self, pool: &'a str) -> BoxFuture<'a, anyhow::Result<i32>>;

    fn update_scale<'a>(
        &'a self,
        pool: &'a str,
        replicas: i32,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Requests removal of exactly one placement.
///
/// The owning system is expected to re-request scheduling for the lost
/// virtual replicas on a later pass.
pub trait Evictor: Send + Sync {
    fn evict<'a>(
        &'a self,
        vpod: &'a VPod,
        placement: &'a Placement,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Receives "this many virtual replicas could not be placed" hints.
pub trait AutoscaleTrigger: Send + Sync {
    fn autoscale(&self, pending: i32);
}
