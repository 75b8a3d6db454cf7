//! cpufreq actuator access and one-time frequency discovery.

use crate::config::CpuFreqPaths;
use crate::error::{Error, Result};
use crate::sysfs;

/// Typed accessors over the cpufreq control files.
#[derive(Debug, Clone)]
pub struct CpuFreq {
    paths: CpuFreqPaths,
}

impl CpuFreq {
    pub fn new(paths: CpuFreqPaths) -> Self {
        Self { paths }
    }

    pub fn available_frequencies(&self) -> Result<Vec<u64>> {
        sysfs::read_list(&self.paths.available_frequencies)
    }

    pub fn available_governors(&self) -> Result<Vec<String>> {
        let text = sysfs::read_string(&self.paths.available_governors)?;
        Ok(text.split_whitespace().map(str::to_string).collect())
    }

    pub fn current_freq(&self) -> Result<u64> {
        sysfs::read_value(&self.paths.cpuinfo_cur_freq)
    }

    pub fn scaling_max_freq(&self) -> Result<u64> {
        sysfs::read_value(&self.paths.scaling_max_freq)
    }

    pub fn scaling_governor(&self) -> Result<String> {
        sysfs::read_string(&self.paths.scaling_governor)
    }

    pub fn set_scaling_max_freq(&self, freq: u64) -> Result<()> {
        sysfs::write_value(&self.paths.scaling_max_freq, freq)
    }

    pub fn set_scaling_governor(&self, governor: &str) -> Result<()> {
        sysfs::write_value(&self.paths.scaling_governor, governor)
    }

    pub fn set_scaling_setspeed(&self, freq: u64) -> Result<()> {
        sysfs::write_value(&self.paths.scaling_setspeed, freq)
    }
}

/// The operating points and governors the platform advertises, read once at
/// init and never rescanned.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    /// Ascending, deduplicated.
    frequencies: Vec<u64>,
    nominal_max: u64,
    conservative: bool,
}

impl FrequencyTable {
    /// Discover the table. Fatal when the platform advertises nothing
    /// usable; a governor without a frequency table cannot protect anything.
    pub fn discover(cpufreq: &CpuFreq) -> Result<Self> {
        let mut frequencies = cpufreq.available_frequencies()?;
        frequencies.sort_unstable();
        frequencies.dedup();
        let Some(&nominal_max) = frequencies.last() else {
            return Err(Error::FrequencyTable(
                "platform advertises no available frequencies".to_string(),
            ));
        };

        let governors = cpufreq.available_governors()?;
        let conservative = governors.iter().any(|g| g == "conservative");

        Ok(Self {
            frequencies,
            nominal_max,
            conservative,
        })
    }

    /// The next operating point below `freq`. When `freq` sits between two
    /// table entries, this is the highest entry strictly below it. `None`
    /// when `freq` is already at or below the lowest entry.
    pub fn next_lower(&self, freq: u64) -> Option<u64> {
        let idx = self.frequencies.partition_point(|&f| f < freq);
        if idx == 0 {
            None
        } else {
            Some(self.frequencies[idx - 1])
        }
    }

    pub fn lowest(&self) -> u64 {
        self.frequencies[0]
    }

    /// The nominal maximum: the highest advertised operating point.
    pub fn nominal_max(&self) -> u64 {
        self.nominal_max
    }

    pub fn has_conservative(&self) -> bool {
        self.conservative
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fixture(freqs: &str, governors: &str) -> (tempfile::TempDir, CpuFreq) {
        let dir = tempfile::tempdir().unwrap();
        let file = |name: &str, contents: &str| {
            let path = dir.path().join(name);
            fs::write(&path, contents).unwrap();
            path
        };
        let paths = CpuFreqPaths {
            available_frequencies: file("scaling_available_frequencies", freqs),
            available_governors: file("scaling_available_governors", governors),
            scaling_max_freq: file("scaling_max_freq", "1200000\n"),
            scaling_governor: file("scaling_governor", "ondemand\n"),
            scaling_setspeed: file("scaling_setspeed", "0\n"),
            cpuinfo_cur_freq: file("cpuinfo_cur_freq", "1200000\n"),
        };
        (dir, CpuFreq::new(paths))
    }

    #[test]
    fn should_discover_sorted_table_and_nominal_max() {
        let (_dir, cpufreq) = fixture(
            "1200000 300000 1000000 600000\n",
            "conservative ondemand userspace\n",
        );
        let table = FrequencyTable::discover(&cpufreq).unwrap();
        assert_eq!(table.nominal_max(), 1_200_000);
        assert_eq!(table.lowest(), 300_000);
        assert!(table.has_conservative());
    }

    #[test]
    fn should_detect_missing_conservative_governor() {
        let (_dir, cpufreq) = fixture("300000 600000\n", "ondemand performance\n");
        let table = FrequencyTable::discover(&cpufreq).unwrap();
        assert!(!table.has_conservative());
    }

    #[test]
    fn should_reject_empty_frequency_list() {
        let (_dir, cpufreq) = fixture("\n", "ondemand\n");
        assert!(matches!(
            FrequencyTable::discover(&cpufreq),
            Err(Error::FrequencyTable(_))
        ));
    }

    #[test]
    fn should_step_down_from_a_table_entry() {
        let (_dir, cpufreq) = fixture("300000 600000 1000000 1200000\n", "ondemand\n");
        let table = FrequencyTable::discover(&cpufreq).unwrap();
        assert_eq!(table.next_lower(1_200_000), Some(1_000_000));
        assert_eq!(table.next_lower(600_000), Some(300_000));
        assert_eq!(table.next_lower(300_000), None);
    }

    #[test]
    fn should_step_down_from_between_entries() {
        let (_dir, cpufreq) = fixture("300000 600000 1000000 1200000\n", "ondemand\n");
        let table = FrequencyTable::discover(&cpufreq).unwrap();
        assert_eq!(table.next_lower(700_000), Some(600_000));
    }
}
