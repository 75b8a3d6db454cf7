//! SoC thermal protection.
//!
//! soctherm watches the temperature sensors of an embedded SoC (CPU die, two
//! memory channels, board) and drives a graduated response through sysfs:
//! frequency capping, cpufreq governor switching, sensor poll-rate changes,
//! and as a last resort a storage sync followed by power-off.
//!
//! The crate is organized around three layers:
//!
//! - [`config`] and [`sysfs`] hold the immutable settings and the raw
//!   pseudo-file accessors everything else shares.
//! - [`thermal`] contains one governor per monitored domain plus the
//!   temperature model and cpufreq discovery they build on.
//! - [`daemon`] owns the kernel uevent subscription and dispatches events to
//!   the governors through the [`manager`] context object.
//!
//! The `socthermd` binary wires these together; embedders can instead call
//! [`manager::init`] and [`manager::notify`] directly.

pub mod config;
pub mod daemon;
pub mod error;
pub mod manager;
pub mod power;
pub mod sysfs;
pub mod thermal;
pub mod tracing;

pub use error::{Error, Result};
