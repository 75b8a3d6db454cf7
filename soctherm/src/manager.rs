//! The thermal manager: one context object owning the configuration and the
//! three per-domain governors.
//!
//! The daemon and the optional board poll task dispatch through a shared
//! [`ThermalManager`]; embedding layers that bring their own event source use
//! the module-level [`init`]/[`notify`] entry points instead, which keep a
//! single manager behind a process-wide lock. Both entry points are
//! synchronous and must be driven by one caller at a time; the lock keeps the
//! state consistent but concurrency is not part of the contract.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{DEFAULT_CONFIG_PATH, ThermalConfig};
use crate::error::{Error, Result};
use crate::power::{ProtectiveAction, SystemPower};
use crate::sysfs;
use crate::thermal::{BoardGovernor, CpuGovernor, Domain, DutyCyclePolicy, MemoryGovernor, Zone};
use crate::tracing::prelude::*;

pub struct ThermalManager {
    config: ThermalConfig,
    cpu: CpuGovernor,
    memory: MemoryGovernor,
    board: BoardGovernor,
}

impl ThermalManager {
    /// Build every governor and seed each one from a blocking read of its
    /// current sensor value, so the initial state is computed rather than
    /// assumed. Any failure here is an init failure and aborts startup.
    pub fn new(config: ThermalConfig, power: Arc<dyn ProtectiveAction>) -> Result<Self> {
        let cpu = CpuGovernor::new(&config.cpu, config.hysteresis, power.clone())?;
        let memory = MemoryGovernor::new(config.memory.max_zone, power);
        let policy = DutyCyclePolicy::new(
            config.board.duty_cycle.clone(),
            config.cpu.cpufreq.scaling_max_freq.clone(),
        );
        let board = BoardGovernor::new(&config.board, Box::new(policy));

        let mut manager = Self {
            config,
            cpu,
            memory,
            board,
        };
        manager.seed()?;
        Ok(manager)
    }

    fn seed(&mut self) -> Result<()> {
        let cpu_temp = sysfs::read_value(&self.config.cpu.sensor)?;
        let initial = self.cpu.dispatch(cpu_temp);
        info!(zone = %initial, "cpu governor seeded");

        let zone1 = sysfs::read_value(&self.config.memory.zone1)?;
        let zone2 = sysfs::read_value(&self.config.memory.zone2)?;
        self.memory.dispatch(zone1, zone2);

        let board_temp = sysfs::read_value(&self.config.board.sensor)?;
        self.board.dispatch(board_temp);

        Ok(())
    }

    /// Re-read the domain's sensor and run its governor. The uevent itself
    /// carries no temperature; it is only a trigger to re-read.
    ///
    /// A failed sensor read drops the event with a warning: the monitoring
    /// loop exists to keep running, and the next event retries. Returns the
    /// resulting zone for CPU dispatches.
    pub fn notify(&mut self, domain: Domain) -> Option<Zone> {
        match domain {
            Domain::Cpu => match sysfs::read_value(&self.config.cpu.sensor) {
                Ok(temp) => Some(self.cpu.dispatch(temp)),
                Err(err) => {
                    warn!(%err, "cpu sensor read failed, event dropped");
                    None
                }
            },
            Domain::Memory => {
                let zones = (
                    sysfs::read_value(&self.config.memory.zone1),
                    sysfs::read_value(&self.config.memory.zone2),
                );
                match zones {
                    (Ok(zone1), Ok(zone2)) => {
                        self.memory.dispatch(zone1, zone2);
                    }
                    (Err(err), _) | (_, Err(err)) => {
                        warn!(%err, "memory zone read failed, event dropped");
                    }
                }
                None
            }
            Domain::Board => {
                match sysfs::read_value(&self.config.board.sensor) {
                    Ok(temp) => self.board.dispatch(temp),
                    Err(err) => warn!(%err, "board sensor read failed, event dropped"),
                }
                None
            }
        }
    }

    /// Zone the CPU governor last settled in.
    pub fn cpu_zone(&self) -> Option<Zone> {
        self.cpu.zone()
    }
}

static MANAGER: Mutex<Option<ThermalManager>> = Mutex::new(None);

fn parse_domain(name: &str) -> Result<Domain> {
    name.parse()
        .map_err(|_| Error::UnknownDomain(name.to_string()))
}

/// Bring the process-wide manager up from the default configuration path.
///
/// Idempotent: the first call loads the configuration and seeds every
/// governor, repeat calls are no-ops. The embedding contract has no error
/// channel, so failures are logged and leave later [`notify`] calls inert.
pub fn init() {
    let mut slot = MANAGER.lock();
    if slot.is_some() {
        return;
    }
    let result = ThermalConfig::load(Path::new(DEFAULT_CONFIG_PATH))
        .and_then(|config| ThermalManager::new(config, Arc::new(SystemPower)));
    match result {
        Ok(manager) => {
            info!("thermal manager initialized");
            *slot = Some(manager);
        }
        Err(err) => error!(%err, "thermal manager init failed"),
    }
}

/// Dispatch a domain by its wire name ("cpu", "memory", "board").
pub fn notify(domain: &str) {
    let domain = match parse_domain(domain) {
        Ok(domain) => domain,
        Err(err) => {
            warn!(%err, "notify ignored");
            return;
        }
    };
    match MANAGER.lock().as_mut() {
        Some(manager) => {
            manager.notify(domain);
        }
        None => warn!(%domain, "notify before init, ignored"),
    }
}
