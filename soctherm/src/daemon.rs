//! The thermal event daemon.
//!
//! Owns one `NETLINK_KOBJECT_UEVENT` subscription bound to all multicast
//! groups. Kernel drivers announce a threshold crossing as a text message of
//! the form `change@/devices/platform/<device-path>`; the payload carries no
//! temperature, it is only a trigger to re-read the matching sensor. The
//! daemon routes each message to its domain through a table built once from
//! the configuration and dispatches the domain's governor via the shared
//! [`ThermalManager`].
//!
//! The loop runs blocking on a dedicated worker thread. Polls are bounded so
//! the cancellation token is observed; everything after socket setup is
//! logged and survived rather than propagated, because the loop's entire
//! purpose is continuous protection.

use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::path::PathBuf;
use std::sync::Arc;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::socket::{
    AddressFamily, MsgFlags, NetlinkAddr, SockFlag, SockProtocol, SockType, bind, recv,
    setsockopt, socket, sockopt,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ThermalConfig;
use crate::error::{Error, Result};
use crate::manager::ThermalManager;
use crate::sysfs;
use crate::thermal::{Domain, Zone};
use crate::tracing::prelude::*;

/// Kernel-side receive buffer. Bursts of uevents must survive the loop being
/// stalled in a slow actuator write.
const RECV_BUFFER_BYTES: usize = 64 * 1024;

/// Upper bound on a single uevent message.
const EVENT_BYTES: usize = 1024;

/// How long one poll waits before the loop re-checks cancellation.
const POLL_TICK_MS: u16 = 500;

pub struct ThermalDaemon {
    manager: Arc<Mutex<ThermalManager>>,
    routes: Vec<(String, Domain)>,
    diagnostics: Vec<PathBuf>,
    last_cpu_zone: Option<Zone>,
}

impl ThermalDaemon {
    pub fn new(config: &ThermalConfig, manager: Arc<Mutex<ThermalManager>>) -> Self {
        let last_cpu_zone = manager.lock().cpu_zone();
        Self {
            manager,
            routes: build_routes(config),
            diagnostics: diagnostic_files(config),
            last_cpu_zone,
        }
    }

    /// Blocking event loop; runs until the token is cancelled. Socket setup
    /// failures are init failures and abort startup.
    pub fn run(&mut self, cancellation: CancellationToken) -> Result<()> {
        let socket = subscribe()?;
        info!("listening for kernel thermal uevents");

        let mut buf = [0u8; EVENT_BYTES];
        while !cancellation.is_cancelled() {
            let mut fds = [PollFd::new(socket.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(POLL_TICK_MS)) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    warn!(%err, "uevent poll failed");
                    continue;
                }
            }
            if !fds[0]
                .revents()
                .is_some_and(|revents| revents.contains(PollFlags::POLLIN))
            {
                continue;
            }

            let len = match recv(socket.as_raw_fd(), &mut buf, MsgFlags::empty()) {
                Ok(len) => len,
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    warn!(%err, "uevent recv failed");
                    continue;
                }
            };

            // Only the `action@devpath` header matters; the key=value
            // attributes after the first NUL are not part of the contract.
            let header = &buf[..len];
            let header = &header[..header.iter().position(|&b| b == 0).unwrap_or(header.len())];
            let message = String::from_utf8_lossy(header);
            self.handle_event(&message);
        }

        info!("thermal daemon exiting");
        Ok(())
    }

    fn handle_event(&mut self, message: &str) {
        let Some(domain) = route_for(&self.routes, message) else {
            return;
        };
        debug!(uevent = message, %domain, "thermal uevent");

        let zone = self.manager.lock().notify(domain);

        if domain == Domain::Cpu
            && let Some(zone) = zone
            && self.last_cpu_zone != Some(zone)
        {
            info!(previous = ?self.last_cpu_zone, current = %zone, "cpu zone changed");
            self.last_cpu_zone = Some(zone);
            self.log_diagnostics();
        }
    }

    /// Best-effort snapshot of the actuator files after a zone change.
    /// Failures here never reach the loop.
    fn log_diagnostics(&self) {
        for path in &self.diagnostics {
            if let Ok(value) = sysfs::read_string(path) {
                debug!(file = %path.display(), %value, "diagnostic");
            }
        }
    }
}

fn subscribe() -> Result<OwnedFd> {
    let fd = socket(
        AddressFamily::Netlink,
        SockType::Datagram,
        SockFlag::empty(),
        SockProtocol::NetlinkKObjectUEvent,
    )
    .map_err(Error::Uevent)?;

    // Without CAP_NET_ADMIN the forced size is refused; the plain option
    // still raises the buffer as far as the system maximum allows.
    if setsockopt(&fd, sockopt::RcvBufForce, &RECV_BUFFER_BYTES).is_err()
        && let Err(err) = setsockopt(&fd, sockopt::RcvBuf, &RECV_BUFFER_BYTES)
    {
        warn!(%err, "could not enlarge uevent receive buffer");
    }

    // All multicast groups; the kernel assigns groups per subsystem.
    let addr = NetlinkAddr::new(std::process::id(), u32::MAX);
    bind(fd.as_raw_fd(), &addr).map_err(Error::Uevent)?;

    Ok(fd)
}

fn build_routes(config: &ThermalConfig) -> Vec<(String, Domain)> {
    vec![
        (format!("change@{}", config.cpu.uevent), Domain::Cpu),
        (format!("change@{}", config.memory.uevent1), Domain::Memory),
        (format!("change@{}", config.memory.uevent2), Domain::Memory),
        (format!("change@{}", config.board.uevent), Domain::Board),
    ]
}

fn route_for(routes: &[(String, Domain)], message: &str) -> Option<Domain> {
    routes
        .iter()
        .find(|(pattern, _)| pattern.as_str() == message)
        .map(|(_, domain)| *domain)
}

fn diagnostic_files(config: &ThermalConfig) -> Vec<PathBuf> {
    vec![
        config.cpu.cpufreq.scaling_governor.clone(),
        config.cpu.cpufreq.scaling_max_freq.clone(),
        config.cpu.cpufreq.scaling_setspeed.clone(),
        config.cpu.cpufreq.cpuinfo_cur_freq.clone(),
        config.cpu.monitor.threshold_high.clone(),
        config.cpu.monitor.threshold_low.clone(),
        config.cpu.monitor.update_rate.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> Vec<(String, Domain)> {
        vec![
            (
                "change@/devices/platform/soc_temp_sensor.0".to_string(),
                Domain::Cpu,
            ),
            ("change@/devices/platform/emif.0".to_string(), Domain::Memory),
            ("change@/devices/platform/emif.1".to_string(), Domain::Memory),
            (
                "change@/devices/platform/i2c.3/3-0048".to_string(),
                Domain::Board,
            ),
        ]
    }

    #[test]
    fn should_route_each_configured_device_path() {
        let routes = routes();
        assert_eq!(
            route_for(&routes, "change@/devices/platform/soc_temp_sensor.0"),
            Some(Domain::Cpu)
        );
        assert_eq!(
            route_for(&routes, "change@/devices/platform/emif.0"),
            Some(Domain::Memory)
        );
        assert_eq!(
            route_for(&routes, "change@/devices/platform/emif.1"),
            Some(Domain::Memory)
        );
        assert_eq!(
            route_for(&routes, "change@/devices/platform/i2c.3/3-0048"),
            Some(Domain::Board)
        );
    }

    #[test]
    fn should_ignore_unrelated_uevents() {
        let routes = routes();
        assert_eq!(route_for(&routes, "add@/devices/platform/emif.0"), None);
        assert_eq!(route_for(&routes, "change@/devices/platform/mmc.0"), None);
        // Prefixes are not matches; the comparison is exact.
        assert_eq!(route_for(&routes, "change@/devices/platform/emif"), None);
    }
}
