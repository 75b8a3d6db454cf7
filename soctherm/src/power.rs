//! Protective power actions.
//!
//! The fatal-zone and memory fail-safe paths end in a storage sync followed
//! by power-off. That action lives behind a port so the governors can be
//! exercised in tests without powering off the test machine.

use crate::tracing::prelude::*;

/// Last-resort action when a domain exceeds its survivable limits.
pub trait ProtectiveAction: Send + Sync {
    /// Flush dirty pages to storage, then power the system off.
    ///
    /// On real hardware this does not return. Implementations used in tests
    /// record the call and return so the caller's no-further-writes
    /// behavior can be asserted.
    fn sync_and_poweroff(&self);
}

/// The real thing: `sync(2)` + `reboot(RB_POWER_OFF)`.
pub struct SystemPower;

impl ProtectiveAction for SystemPower {
    fn sync_and_poweroff(&self) {
        nix::unistd::sync();
        if let Err(err) = nix::sys::reboot::reboot(nix::sys::reboot::RebootMode::RB_POWER_OFF) {
            // Nothing left to do but say so; the caller performs no further
            // actuator writes either way.
            error!(%err, "power-off request failed");
        }
    }
}
