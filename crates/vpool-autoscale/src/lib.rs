//! vpool-autoscale — sizes the worker pool from pending virtual replicas.
//!
//! Grows the pool when the scheduler reports replicas it could not place,
//! shrinks it on the periodic refresh once trailing pods hold nothing, and
//! compacts the trailing pods when the rest of the pool can absorb them.
//!
//! # Sizing Algorithm
//!
//! ```text
//! factor  = num_zones  if the zone priority is configured
//!         | num_nodes  if the node priority is configured
//!         | 1
//! desired = last_ordinal + 1
//! if pending > 0:
//!     desired += ceil(ceil(pending / capacity) / factor) * factor
//! if desired <= last_ordinal:
//!     desired = last_ordinal + factor
//! if hint pass and desired < current:
//!     desired = current
//! ```
//!
//! A refresh pass that leaves the replica count unchanged tries compaction:
//! every placement on the trailing pod (or the trailing `factor` pods under
//! an HA policy) is evicted when the free capacity below covers what they
//! hold.

pub mod error;
pub mod scaler;
pub mod sizing;

pub use error::{AutoscaleError, AutoscaleResult};
pub use scaler::{Autoscaler, AutoscalerConfig, AutoscalerHandle, PassOutcome, RetryPolicy};
pub use sizing::{compaction_targets, desired_replicas, scale_up_factor};
