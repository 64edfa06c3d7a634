//! vpool-state — cluster-state snapshots for virtual-replica placement.
//!
//! A [`State`] is a point-in-time view of a worker pool: how many
//! virtual-replica slots each pod has left, how every VPod is spread across
//! pods, zones and nodes, and which scheduling policy is in force. Snapshots
//! are rebuilt from the external listers on every pass and never persisted.
//!
//! # Architecture
//!
//! ```text
//! StateBuilder (StateAccessor)
//!   ├── VPodLister  (VPods + their placements)
//!   └── PodLister   (pool metadata: ordinal, zone, node)
//!         │
//!         ▼
//!      State ──► scheduler / autoscaler (read-only, or a private working copy)
//! ```
//!
//! The collaborator traits live in [`client`]; [`InMemoryCluster`] implements
//! all of them for tests and for the simulation daemon.

pub mod accessor;
pub mod client;
pub mod error;
pub mod memory;
pub mod state;
pub mod types;

pub use accessor::{StateAccessor, StateBuilder};
pub use client::{AutoscaleTrigger, BoxFuture, Evictor, PodLister, ScaleClient, VPodLister};
pub use error::{StateError, StateResult};
pub use memory::InMemoryCluster;
pub use state::State;
pub use types::*;
