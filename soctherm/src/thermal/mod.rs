//! Per-domain thermal governors and the temperature model they share.
//!
//! Each monitored domain gets its own governor: the CPU die runs the full
//! five-zone state machine, the memory channels a binary fail-safe, and the
//! board a graduated section policy. Dispatch is keyed by [`Domain`], a
//! closed enum; the string forms ("cpu", "memory", "board") exist only at the
//! embedding boundary.

mod board;
mod convert;
mod cpu;
mod cpufreq;
mod memory;
mod zone;

use strum::{Display, EnumString};

pub use board::{BoardGovernor, BoardPolicy, DutyCyclePolicy, LogOnlyPolicy};
pub use convert::HotspotModel;
pub use cpu::CpuGovernor;
pub use cpufreq::{CpuFreq, FrequencyTable};
pub use memory::MemoryGovernor;
pub use zone::{FATAL_THRESHOLD, Zone, ZoneThresholds, classify};

/// A monitored thermal domain. The two memory channels report separately but
/// are governed as one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Domain {
    Cpu,
    Memory,
    Board,
}
