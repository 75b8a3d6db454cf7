//! The memory (LPDDR) thermal governor.
//!
//! A single binary fail-safe: the memory controller reports a temperature
//! zone per channel, and reaching the maximum defined zone on either channel
//! means the part can no longer be cooled by throttling. There is no
//! graduated response and no hysteresis here; the only safe action left is
//! to sync storage and power off.

use std::sync::Arc;

use crate::power::ProtectiveAction;
use crate::tracing::prelude::*;

pub struct MemoryGovernor {
    max_zone: u32,
    power: Arc<dyn ProtectiveAction>,
}

impl MemoryGovernor {
    pub fn new(max_zone: u32, power: Arc<dyn ProtectiveAction>) -> Self {
        Self { max_zone, power }
    }

    /// Check both channel zone reports. Returns true when the fail-safe
    /// fired; no state is mutated afterward.
    pub fn dispatch(&self, zone1: u32, zone2: u32) -> bool {
        debug!(zone1, zone2, "memory temperature zones");

        if zone1 >= self.max_zone || zone2 >= self.max_zone {
            error!(
                zone1,
                zone2,
                max_zone = self.max_zone,
                "memory channel at maximum thermal zone, powering off"
            );
            self.power.sync_and_poweroff();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::power::testing::RecordingPower;

    use super::*;

    fn governor() -> (MemoryGovernor, Arc<RecordingPower>) {
        let power = Arc::new(RecordingPower::default());
        (MemoryGovernor::new(7, power.clone()), power)
    }

    #[test]
    fn should_take_no_action_below_the_maximum_zone() {
        let (governor, power) = governor();
        assert!(!governor.dispatch(6, 5));
        assert_eq!(power.calls(), 0);
    }

    #[test]
    fn should_power_off_exactly_once_when_first_channel_trips() {
        let (governor, power) = governor();
        assert!(governor.dispatch(7, 5));
        assert_eq!(power.calls(), 1);
    }

    #[test]
    fn should_power_off_when_second_channel_trips() {
        let (governor, power) = governor();
        assert!(governor.dispatch(5, 7));
        assert_eq!(power.calls(), 1);
    }

    #[test]
    fn should_trip_on_a_zone_report_past_the_maximum() {
        let (governor, power) = governor();
        assert!(governor.dispatch(9, 0));
        assert_eq!(power.calls(), 1);
    }
}
