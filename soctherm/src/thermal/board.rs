//! The board (PCB) thermal governor.
//!
//! The configuration defines an ordered table of sections, each naming a
//! board temperature level and the constraints to hold while below it. The
//! governor tracks which section the current temperature falls in and, on a
//! section change, hands the section to a [`BoardPolicy`] and re-programs the
//! sensor threshold window around it.
//!
//! What a policy does with a section is deliberately pluggable:
//! [`DutyCyclePolicy`] programs the platform duty-cycle module,
//! [`LogOnlyPolicy`] observes without actuating. When the duty-cycle control
//! files or the section table are missing the governor degrades to plain
//! temperature logging rather than refusing to start; the board domain is
//! advisory, unlike the CPU and memory domains.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::config::{BoardConfig, BoardSection, DutyCyclePaths};
use crate::sysfs;
use crate::tracing::prelude::*;

/// Consumer of a newly-entered board section.
pub trait BoardPolicy: Send {
    fn apply(&mut self, section: &BoardSection);
}

/// Observes section changes without touching any actuator. This mirrors the
/// behavior of platforms that ship the section table but no enforcement
/// module.
pub struct LogOnlyPolicy;

impl BoardPolicy for LogOnlyPolicy {
    fn apply(&mut self, section: &BoardSection) {
        info!(
            temp_level = section.temp_level,
            max_opp = section.max_opp,
            "board section entered (log only)"
        );
    }
}

/// Programs the platform duty-cycle module and the CPU frequency cap from a
/// section's parameters.
pub struct DutyCyclePolicy {
    duty: DutyCyclePaths,
    scaling_max_freq: PathBuf,
}

impl DutyCyclePolicy {
    pub fn new(duty: DutyCyclePaths, scaling_max_freq: PathBuf) -> Self {
        Self {
            duty,
            scaling_max_freq,
        }
    }
}

impl BoardPolicy for DutyCyclePolicy {
    fn apply(&mut self, section: &BoardSection) {
        // Duty cycling is disabled while its parameters are reprogrammed and
        // only re-enabled once they are all in place.
        best_effort(&self.duty.enabled, 0u32);
        if section.duty_cycle_enabled {
            best_effort(&self.scaling_max_freq, section.cooling_rate);
            best_effort(&self.duty.nitro_percentage, section.nitro_percentage);
            best_effort(&self.duty.nitro_interval, section.nitro_interval);
            best_effort(&self.duty.cooling_rate, section.cooling_rate);
            best_effort(&self.duty.nitro_rate, section.nitro_rate);
            best_effort(&self.duty.enabled, 1u32);
        }
        best_effort(&self.scaling_max_freq, section.max_opp);

        info!(
            temp_level = section.temp_level,
            max_opp = section.max_opp,
            duty_cycle = section.duty_cycle_enabled,
            "board constraint applied"
        );
    }
}

fn best_effort<T: Display>(path: &Path, value: T) {
    if let Err(err) = sysfs::write_value(path, value) {
        warn!(%err, "board actuator write failed");
    }
}

pub struct BoardGovernor {
    /// Ascending by `temp_level`.
    sections: Vec<BoardSection>,
    policy: Box<dyn BoardPolicy>,
    enforce: bool,
    threshold_high: PathBuf,
    threshold_low: PathBuf,
    current_section: Option<usize>,
    applied_t_high: Option<u32>,
    applied_t_low: Option<u32>,
}

impl BoardGovernor {
    pub fn new(config: &BoardConfig, policy: Box<dyn BoardPolicy>) -> Self {
        let mut sections = config.sections.clone();
        sections.sort_by_key(|s| s.temp_level);

        let enforce = if sections.is_empty() {
            warn!("no board sections configured, logging only");
            false
        } else if !control_points_present(config) {
            warn!("board duty-cycle control files unavailable, logging only");
            false
        } else {
            true
        };

        Self {
            sections,
            policy,
            enforce,
            threshold_high: config.threshold_high.clone(),
            threshold_low: config.threshold_low.clone(),
            current_section: None,
            applied_t_high: None,
            applied_t_low: None,
        }
    }

    /// Evaluate a board temperature reading, in milli-°C.
    pub fn dispatch(&mut self, temp_mc: i64) {
        let temp_c = (temp_mc / 1000).max(0) as u32;
        info!(temp_c, "board temperature");

        if !self.enforce {
            return;
        }

        // First section whose level is above the reading; past the table,
        // hold the most restrictive one.
        let idx = self
            .sections
            .iter()
            .position(|s| s.temp_level > temp_c)
            .unwrap_or(self.sections.len() - 1);

        if self.current_section == Some(idx) {
            return;
        }
        self.current_section = Some(idx);

        let section = self.sections[idx];
        self.policy.apply(&section);

        let low = if idx == 0 {
            0
        } else {
            self.sections[idx - 1].temp_level
        };
        self.update_thresholds(section.temp_level, low);
    }

    /// Program the sensor threshold window, in milli-°C. The section levels
    /// are strictly ordered, so high > low holds by construction.
    fn update_thresholds(&mut self, high: u32, low: u32) {
        if self.applied_t_high != Some(high) {
            match sysfs::write_value(&self.threshold_high, high * 1000) {
                Ok(()) => self.applied_t_high = Some(high),
                Err(err) => warn!(%err, high, "board threshold_high write failed"),
            }
        }
        if self.applied_t_low != Some(low) {
            match sysfs::write_value(&self.threshold_low, low * 1000) {
                Ok(()) => self.applied_t_low = Some(low),
                Err(err) => warn!(%err, low, "board threshold_low write failed"),
            }
        }
    }
}

fn control_points_present(config: &BoardConfig) -> bool {
    [
        &config.duty_cycle.nitro_rate,
        &config.duty_cycle.cooling_rate,
        &config.duty_cycle.nitro_interval,
        &config.duty_cycle.nitro_percentage,
        &config.duty_cycle.enabled,
        &config.threshold_high,
        &config.threshold_low,
    ]
    .iter()
    .all(|path| path.is_file())
}
