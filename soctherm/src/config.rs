//! The settings file.
//!
//! Everything the daemon needs to know about a platform lives in one TOML
//! file read once at startup: per-domain thresholds, the hysteresis constant,
//! the hotspot model, the sensor/actuator path tables, and the board
//! duty-cycle sections. The loaded [`ThermalConfig`] is immutable for the
//! process lifetime; there is no hot reload.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::thermal::FATAL_THRESHOLD;

/// Where `socthermd` looks when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/soctherm.toml";

const DEFAULT_HYSTERESIS: i64 = 2_000;
const DEFAULT_MEMORY_MAX_ZONE: u32 = 7;

#[derive(Debug, Clone, Deserialize)]
pub struct ThermalConfig {
    /// Hysteresis band in milli-°C, applied when retreating from a zone.
    #[serde(default = "default_hysteresis")]
    pub hysteresis: i64,

    pub cpu: CpuConfig,
    pub memory: MemoryConfig,
    pub board: BoardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CpuConfig {
    /// Zone thresholds in hotspot milli-°C. Must satisfy
    /// `monitoring < alert < panic`, and `panic` must stay below the fixed
    /// fatal limit.
    pub threshold_monitoring: i64,
    pub threshold_alert: i64,
    pub threshold_panic: i64,

    /// Hotspot model slope, multiplied by 1000 to stay integral.
    pub slope: i64,
    /// Hotspot model offset in milli-°C.
    pub offset: i64,

    /// On-die temperature sensor file.
    pub sensor: PathBuf,
    /// Device path announced in the kernel uevent for this sensor.
    pub uevent: String,

    pub cpufreq: CpuFreqPaths,
    pub monitor: CpuMonitorPaths,
}

/// The cpufreq control points for the CPU governor.
#[derive(Debug, Clone, Deserialize)]
pub struct CpuFreqPaths {
    pub available_frequencies: PathBuf,
    pub available_governors: PathBuf,
    pub scaling_max_freq: PathBuf,
    pub scaling_governor: PathBuf,
    pub scaling_setspeed: PathBuf,
    pub cpuinfo_cur_freq: PathBuf,
}

/// The on-die sensor's own control points.
#[derive(Debug, Clone, Deserialize)]
pub struct CpuMonitorPaths {
    pub update_rate: PathBuf,
    pub threshold_high: PathBuf,
    pub threshold_low: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Zone-report files for the two memory channels.
    pub zone1: PathBuf,
    pub zone2: PathBuf,

    /// Device paths announced in the kernel uevents for the two channels.
    pub uevent1: String,
    pub uevent2: String,

    /// Zone index at which the fail-safe trips.
    #[serde(default = "default_memory_max_zone")]
    pub max_zone: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Board temperature sensor file, reporting milli-°C.
    pub sensor: PathBuf,
    /// Device path announced in the kernel uevent for this sensor.
    pub uevent: String,

    pub threshold_high: PathBuf,
    pub threshold_low: PathBuf,

    pub duty_cycle: DutyCyclePaths,

    /// When set, the board domain is also re-evaluated on this period
    /// rather than only on sensor interrupts.
    #[serde(default)]
    pub polling_interval_ms: Option<u64>,

    /// Graduated policy sections, ordered by `temp_level` after load.
    #[serde(default)]
    pub sections: Vec<BoardSection>,
}

/// Control points of the platform duty-cycle module.
#[derive(Debug, Clone, Deserialize)]
pub struct DutyCyclePaths {
    pub nitro_rate: PathBuf,
    pub cooling_rate: PathBuf,
    pub nitro_interval: PathBuf,
    pub nitro_percentage: PathBuf,
    pub enabled: PathBuf,
}

/// One row of the board's graduated policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BoardSection {
    /// Upper board temperature of this section, in °C.
    pub temp_level: u32,
    /// CPU frequency cap while in this section, in kHz.
    pub max_opp: u64,
    #[serde(default)]
    pub duty_cycle_enabled: bool,
    #[serde(default)]
    pub nitro_rate: u64,
    #[serde(default)]
    pub cooling_rate: u64,
    #[serde(default)]
    pub nitro_interval: u32,
    #[serde(default)]
    pub nitro_percentage: u32,
}

fn default_hysteresis() -> i64 {
    DEFAULT_HYSTERESIS
}

fn default_memory_max_zone() -> u32 {
    DEFAULT_MEMORY_MAX_ZONE
}

impl ThermalConfig {
    /// One-shot load. Any violation is fatal; the daemon must not start on a
    /// config it cannot trust.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ThermalConfig =
            toml::from_str(&text).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        config.validate()?;
        config.board.sections.sort_by_key(|s| s.temp_level);
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let cpu = &self.cpu;
        if !(cpu.threshold_monitoring < cpu.threshold_alert
            && cpu.threshold_alert < cpu.threshold_panic
            && cpu.threshold_panic < FATAL_THRESHOLD)
        {
            return Err(Error::ConfigInvalid(format!(
                "cpu thresholds must satisfy monitoring < alert < panic < {FATAL_THRESHOLD}, \
                 got {} / {} / {}",
                cpu.threshold_monitoring, cpu.threshold_alert, cpu.threshold_panic
            )));
        }
        if self.hysteresis <= 0 {
            return Err(Error::ConfigInvalid(format!(
                "hysteresis must be positive, got {}",
                self.hysteresis
            )));
        }
        if cpu.slope < 0 {
            return Err(Error::ConfigInvalid(format!(
                "cpu slope must not be negative, got {}",
                cpu.slope
            )));
        }
        if self.memory.max_zone == 0 {
            return Err(Error::ConfigInvalid(
                "memory max_zone must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> String {
        r#"
            hysteresis = 2000

            [cpu]
            threshold_monitoring = 60000
            threshold_alert = 80000
            threshold_panic = 100000
            slope = 230
            offset = 9000
            sensor = "/sys/class/hwmon/hwmon1/device/temp1_input"
            uevent = "/devices/platform/soc_temp_sensor.0/hwmon/hwmon1"

            [cpu.cpufreq]
            available_frequencies = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_available_frequencies"
            available_governors = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_available_governors"
            scaling_max_freq = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_max_freq"
            scaling_governor = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor"
            scaling_setspeed = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_setspeed"
            cpuinfo_cur_freq = "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_cur_freq"

            [cpu.monitor]
            update_rate = "/sys/class/hwmon/hwmon1/device/update_rate"
            threshold_high = "/sys/class/hwmon/hwmon1/device/temp1_max"
            threshold_low = "/sys/class/hwmon/hwmon1/device/temp1_max_hyst"

            [memory]
            zone1 = "/sys/devices/platform/emif.0/temperature"
            zone2 = "/sys/devices/platform/emif.1/temperature"
            uevent1 = "/devices/platform/emif.0"
            uevent2 = "/devices/platform/emif.1"

            [board]
            sensor = "/sys/class/hwmon/hwmon0/device/temp1_input"
            uevent = "/devices/platform/i2c.3/3-0048/hwmon/hwmon0"
            threshold_high = "/sys/class/hwmon/hwmon0/device/temp1_max"
            threshold_low = "/sys/class/hwmon/hwmon0/device/temp1_max_hyst"

            [board.duty_cycle]
            nitro_rate = "/sys/kernel/duty_cycle/nitro_rate"
            cooling_rate = "/sys/kernel/duty_cycle/cooling_rate"
            nitro_interval = "/sys/kernel/duty_cycle/nitro_interval"
            nitro_percentage = "/sys/kernel/duty_cycle/nitro_percentage"
            enabled = "/sys/kernel/duty_cycle/enabled"

            [[board.sections]]
            temp_level = 75
            max_opp = 1000000
            duty_cycle_enabled = true
            nitro_rate = 1200000
            cooling_rate = 600000
            nitro_interval = 20000
            nitro_percentage = 30

            [[board.sections]]
            temp_level = 65
            max_opp = 1200000
        "#
        .to_string()
    }

    fn load_str(text: &str) -> Result<ThermalConfig> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soctherm.toml");
        fs::write(&path, text).unwrap();
        ThermalConfig::load(&path)
    }

    #[test]
    fn loads_valid_config() {
        let config = load_str(&sample_toml()).unwrap();
        assert_eq!(config.hysteresis, 2000);
        assert_eq!(config.cpu.threshold_panic, 100000);
        assert_eq!(config.memory.max_zone, 7);
        assert_eq!(config.board.sections.len(), 2);
    }

    #[test]
    fn sorts_board_sections_by_temp_level() {
        let config = load_str(&sample_toml()).unwrap();
        assert_eq!(config.board.sections[0].temp_level, 65);
        assert_eq!(config.board.sections[1].temp_level, 75);
    }

    #[test]
    fn defaults_apply_when_fields_absent() {
        let text = sample_toml().replace("hysteresis = 2000", "");
        let config = load_str(&text).unwrap();
        assert_eq!(config.hysteresis, 2000);
        assert_eq!(config.memory.max_zone, 7);
    }

    #[test]
    fn rejects_unordered_thresholds() {
        let text = sample_toml().replace("threshold_alert = 80000", "threshold_alert = 50000");
        assert!(matches!(load_str(&text), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_panic_at_or_above_fatal() {
        let text = sample_toml().replace("threshold_panic = 100000", "threshold_panic = 125000");
        assert!(matches!(load_str(&text), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_nonpositive_hysteresis() {
        let text = sample_toml().replace("hysteresis = 2000", "hysteresis = 0");
        assert!(matches!(load_str(&text), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_missing_required_field() {
        let text = sample_toml().replace("threshold_panic = 100000", "");
        assert!(matches!(load_str(&text), Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            ThermalConfig::load(&path),
            Err(Error::ConfigRead { .. })
        ));
    }
}
