//! Capacity filter.

use vpool_state::{POD_FITS_RESOURCES, State, VPodKey};

use crate::framework::FilterPlugin;
use crate::status::Status;

pub const ERR_REASON_FULL: &str = "pod at full capacity";

/// Rejects pods without a free virtual-replica slot.
pub struct PodFitsResources;

impl FilterPlugin for PodFitsResources {
    fn name(&self) -> &'static str {
        POD_FITS_RESOURCES
    }

    fn filter(&self, _args: Option<&str>, state: &State, _vpod: &VPodKey, ordinal: i32) -> Status {
        if state.free(ordinal) > 0 {
            Status::success()
        } else {
            Status::unschedulable(ERR_REASON_FULL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_pod_is_rejected() {
        let key = VPodKey::new("ns", "a");
        let mut state = State::new("d", 2);
        state.adjust(&key, 0, 2);
        state.adjust(&key, 1, 1);

        assert_eq!(
            PodFitsResources.filter(None, &state, &key, 0),
            Status::unschedulable(ERR_REASON_FULL)
        );
        assert!(PodFitsResources.filter(None, &state, &key, 1).is_success());
        assert!(PodFitsResources.filter(None, &state, &key, 5).is_success());
    }
}
