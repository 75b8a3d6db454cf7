//! The CPU thermal governor.
//!
//! Classifies every hotspot reading into one of five zones and runs that
//! zone's entry actions against the cpufreq and sensor-threshold actuators:
//!
//! - **Safe** — nominal cap and governor, normal sensor rate.
//! - **Monitor** — conservative governor, fast sensor rate. The frequency
//!   cap is deliberately left alone; only Safe removes a clamp.
//! - **Alert** — cap one operating point below the current frequency, unless
//!   a Panic-applied clamp is still in force.
//! - **Panic** — force the next-lower operating point through a temporary
//!   userspace governor; past the panic/fatal midpoint, force the lowest
//!   one ("pre-fatal").
//! - **Fatal** — sync storage and power off.
//!
//! Every actuator write is suppressed when the cached last-applied value
//! already matches, and a failed write leaves the cache untouched so the next
//! differing write retries.

use std::sync::Arc;

use crate::config::{CpuConfig, CpuMonitorPaths};
use crate::error::Result;
use crate::power::ProtectiveAction;
use crate::sysfs;
use crate::tracing::prelude::*;

use super::convert::HotspotModel;
use super::cpufreq::{CpuFreq, FrequencyTable};
use super::zone::{FATAL_THRESHOLD, Zone, ZoneThresholds, classify};

/// Sensor update period outside the protective zones, in milliseconds.
const NORMAL_MONITORING_RATE_MS: u32 = 1000;

/// Sensor update period from Monitor upward, in milliseconds.
const FAST_MONITORING_RATE_MS: u32 = 250;

pub struct CpuGovernor {
    thresholds: ZoneThresholds,
    model: HotspotModel,
    cpufreq: CpuFreq,
    monitor: CpuMonitorPaths,
    table: FrequencyTable,
    nominal_governor: String,
    power: Arc<dyn ProtectiveAction>,

    zone: Option<Zone>,
    /// Sticky across zone retreats; cleared only on re-entering Safe.
    panic_reached: bool,

    // Last-applied actuator values. Thresholds are cached in hotspot units;
    // the sensor files receive the converted sensor-level values.
    applied_max_freq: Option<u64>,
    applied_governor: Option<String>,
    applied_rate: Option<u32>,
    applied_t_high: Option<i64>,
    applied_t_low: Option<i64>,
}

impl CpuGovernor {
    /// Build the governor and run the one-time actuator discovery. Any
    /// failure here is an init failure and aborts startup.
    pub fn new(
        config: &CpuConfig,
        hysteresis: i64,
        power: Arc<dyn ProtectiveAction>,
    ) -> Result<Self> {
        let cpufreq = CpuFreq::new(config.cpufreq.clone());
        let table = FrequencyTable::discover(&cpufreq)?;
        let current_max = cpufreq.scaling_max_freq()?;
        let nominal_governor = cpufreq.scaling_governor()?;

        info!(
            nominal_max_freq = table.nominal_max(),
            current_max_freq = current_max,
            nominal_governor = %nominal_governor,
            conservative = table.has_conservative(),
            "cpu governor initialized"
        );

        Ok(Self {
            thresholds: ZoneThresholds {
                monitoring: config.threshold_monitoring,
                alert: config.threshold_alert,
                panic: config.threshold_panic,
                hysteresis,
            },
            model: HotspotModel {
                slope: config.slope,
                offset: config.offset,
            },
            cpufreq,
            monitor: config.monitor.clone(),
            table,
            nominal_governor,
            power,
            zone: None,
            panic_reached: false,
            applied_max_freq: Some(current_max),
            applied_governor: None,
            applied_rate: None,
            applied_t_high: None,
            applied_t_low: None,
        })
    }

    /// Classify a fresh sensor reading and run the entry actions of the
    /// resulting zone.
    pub fn dispatch(&mut self, sensor_temp: i64) -> Zone {
        let hotspot = self.model.to_hotspot(sensor_temp);
        let zone = classify(hotspot, &self.thresholds);
        match zone {
            Zone::Safe => self.safe_zone(hotspot),
            Zone::Monitor => self.monitoring_zone(hotspot),
            Zone::Alert => self.alert_zone(hotspot),
            Zone::Panic => self.panic_zone(hotspot),
            Zone::Fatal => self.fatal_zone(hotspot),
        }
        self.zone = Some(zone);
        zone
    }

    pub fn zone(&self) -> Option<Zone> {
        self.zone
    }

    pub fn panic_reached(&self) -> bool {
        self.panic_reached
    }

    fn safe_zone(&mut self, hotspot: i64) {
        info!(hotspot, "cpu thermal: safe zone");

        self.apply_max_freq(self.table.nominal_max());
        let nominal = self.nominal_governor.clone();
        self.apply_governor(&nominal);
        self.apply_rate(NORMAL_MONITORING_RATE_MS);
        self.apply_thresholds(
            self.thresholds.monitoring,
            self.thresholds.monitoring - self.thresholds.hysteresis,
        );
        self.panic_reached = false;
    }

    fn monitoring_zone(&mut self, hotspot: i64) {
        info!(hotspot, "cpu thermal: monitoring zone");

        // The frequency cap is left untouched: a clamp applied in Alert or
        // Panic must survive until the temperature is back in Safe.
        self.prefer_conservative();
        self.apply_rate(FAST_MONITORING_RATE_MS);
        self.apply_thresholds(
            self.thresholds.alert,
            self.thresholds.monitoring - self.thresholds.hysteresis,
        );
    }

    fn alert_zone(&mut self, hotspot: i64) {
        info!(hotspot, "cpu thermal: alert zone");

        if !self.panic_reached {
            match self.cpufreq.current_freq() {
                Ok(current) => {
                    if let Some(lower) = self.table.next_lower(current) {
                        self.apply_max_freq(lower);
                    }
                }
                Err(err) => {
                    warn!(%err, "current frequency unreadable, keeping existing cap");
                }
            }
        }
        // When falling out of Panic, the cap stays where Panic put it.

        self.prefer_conservative();
        self.apply_rate(FAST_MONITORING_RATE_MS);
        self.apply_thresholds(
            self.thresholds.panic,
            self.thresholds.alert - self.thresholds.hysteresis,
        );
    }

    fn panic_zone(&mut self, hotspot: i64) {
        warn!(hotspot, "cpu thermal: panic zone");

        let step_down = match self.cpufreq.current_freq() {
            Ok(current) => self
                .table
                .next_lower(current)
                .unwrap_or_else(|| self.table.lowest()),
            Err(err) => {
                warn!(%err, "current frequency unreadable, forcing lowest operating point");
                self.table.lowest()
            }
        };

        let restore = self.active_governor();
        self.force_speed(step_down, &restore);
        self.apply_rate(FAST_MONITORING_RATE_MS);

        // Guard between panic and fatal: if the temperature is already past
        // the midpoint despite the step-down, drop to the lowest operating
        // point and watch the fatal limit itself.
        let midpoint = (self.thresholds.panic + FATAL_THRESHOLD) / 2;
        let t_high = if hotspot >= midpoint {
            warn!(hotspot, "cpu thermal: pre-fatal, forcing lowest operating point");
            self.force_speed(self.table.lowest(), &restore);
            FATAL_THRESHOLD
        } else {
            midpoint
        };

        self.apply_thresholds(t_high, self.thresholds.panic - self.thresholds.hysteresis);
        self.panic_reached = true;
    }

    fn fatal_zone(&mut self, hotspot: i64) {
        error!(hotspot, "cpu thermal: fatal zone, powering off");
        self.panic_reached = true;
        self.power.sync_and_poweroff();
    }

    /// The governor to hand control back to after a forced-speed excursion:
    /// conservative when the platform has it, otherwise whatever is active.
    fn active_governor(&self) -> String {
        if self.table.has_conservative() {
            "conservative".to_string()
        } else {
            self.cpufreq.scaling_governor().unwrap_or_else(|err| {
                warn!(%err, "scaling governor unreadable, assuming nominal");
                self.nominal_governor.clone()
            })
        }
    }

    /// Force an immediate frequency change through the userspace governor,
    /// cap the maximum there, and hand control back to `restore`.
    fn force_speed(&mut self, freq: u64, restore: &str) {
        self.apply_governor("userspace");
        if let Err(err) = self.cpufreq.set_scaling_setspeed(freq) {
            warn!(%err, freq, "scaling_setspeed write failed");
        }
        self.apply_max_freq(freq);
        self.apply_governor(restore);
    }

    /// Conservative keeps the frequency scaler from ramping up before the
    /// temperature trend is known.
    fn prefer_conservative(&mut self) {
        if self.table.has_conservative() {
            self.apply_governor("conservative");
        }
    }

    fn apply_max_freq(&mut self, freq: u64) {
        if self.applied_max_freq == Some(freq) {
            return;
        }
        match self.cpufreq.set_scaling_max_freq(freq) {
            Ok(()) => self.applied_max_freq = Some(freq),
            Err(err) => warn!(%err, freq, "scaling_max_freq write failed"),
        }
    }

    fn apply_governor(&mut self, governor: &str) {
        if self.applied_governor.as_deref() == Some(governor) {
            return;
        }
        match self.cpufreq.set_scaling_governor(governor) {
            Ok(()) => self.applied_governor = Some(governor.to_string()),
            Err(err) => warn!(%err, governor, "scaling_governor write failed"),
        }
    }

    fn apply_rate(&mut self, rate_ms: u32) {
        if self.applied_rate == Some(rate_ms) {
            return;
        }
        match sysfs::write_value(&self.monitor.update_rate, rate_ms) {
            Ok(()) => self.applied_rate = Some(rate_ms),
            Err(err) => warn!(%err, rate_ms, "update_rate write failed"),
        }
    }

    /// Commit a threshold pair so that `high > low` holds at the sensor
    /// after every individual write: high first when it can move without
    /// crossing the current low, then low, then high retried for the case
    /// where both must move past each other. The ordering is a correctness
    /// requirement of the sensor interface, not an optimization.
    fn apply_thresholds(&mut self, high: i64, low: i64) {
        if self.applied_t_high != Some(high) && self.applied_t_low.is_none_or(|cur| high > cur) {
            self.write_t_high(high);
        }
        if self.applied_t_low != Some(low) && self.applied_t_high.is_none_or(|cur| low < cur) {
            self.write_t_low(low);
        }
        if self.applied_t_high != Some(high) && self.applied_t_low.is_none_or(|cur| high > cur) {
            self.write_t_high(high);
        }
    }

    fn write_t_high(&mut self, high: i64) {
        debug!(high, "cpu threshold high");
        match sysfs::write_value(&self.monitor.threshold_high, self.model.to_sensor(high)) {
            Ok(()) => self.applied_t_high = Some(high),
            Err(err) => warn!(%err, high, "threshold_high write failed"),
        }
    }

    fn write_t_low(&mut self, low: i64) {
        debug!(low, "cpu threshold low");
        match sysfs::write_value(&self.monitor.threshold_low, self.model.to_sensor(low)) {
            Ok(()) => self.applied_t_low = Some(low),
            Err(err) => warn!(%err, low, "threshold_low write failed"),
        }
    }
}
