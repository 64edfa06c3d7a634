//! vpool-scheduler — converges each VPod's placements to its desired
//! virtual-replica count.
//!
//! A pass takes a fresh snapshot, then for every missing replica runs the
//! configured filters over the schedulable pods, scores the survivors,
//! normalizes, and picks the best pod (lowest ordinal on ties). Capacity is
//! reserved in the pass's private snapshot so nothing is double-booked.
//! Replicas that fit nowhere are reported as `pending` and forwarded to the
//! autoscaler.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── StateAccessor (fresh snapshot per pass, passes serialized)
//!   ├── PluginRegistry (filters + scores, injected)
//!   └── AutoscaleTrigger (pending hint)
//! ```

pub mod error;
pub mod pipeline;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use pipeline::{ScheduleOutcome, schedule_vpod};
pub use scheduler::Scheduler;
