//! Crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The settings file could not be read at startup.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML or is missing required fields.
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    /// The settings file parsed but violates an invariant, e.g. the
    /// threshold ordering `monitoring < alert < panic`.
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// A sensor or actuator file could not be read.
    #[error("failed to read {path}: {source}")]
    SysfsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sensor or actuator file could not be written.
    #[error("failed to write {path}: {source}")]
    SysfsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sensor or actuator file held something other than the expected
    /// decimal ASCII value.
    #[error("unparsable value {value:?} in {path}")]
    SysfsParse { path: PathBuf, value: String },

    /// The frequency table discovered at init is unusable.
    #[error("cpufreq discovery failed: {0}")]
    FrequencyTable(String),

    /// The kernel uevent socket could not be created or bound.
    #[error("uevent socket: {0}")]
    Uevent(#[source] nix::Error),

    /// A domain name from the embedding layer did not match any governor.
    #[error("unknown thermal domain {0:?}")]
    UnknownDomain(String),
}
