//! Built-in plugins.

mod availability;
mod even_spread;
mod fits;
mod ordinal;

pub use availability::{AvailabilityNodePriority, AvailabilityZonePriority};
pub use even_spread::{ERR_REASON_UNEVEN_SPREAD, EvenPodSpread, RemoveWithEvenPodSpreadPriority};
pub use fits::{ERR_REASON_FULL, PodFitsResources};
pub use ordinal::{LowestOrdinalPriority, RemoveWithHighestOrdinalPriority};
