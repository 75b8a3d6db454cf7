//! Raw access to the sensor and actuator pseudo-files.
//!
//! Every control point is one sysfs file holding a decimal ASCII value with a
//! trailing newline. These helpers do the newline handling and parsing;
//! fatality is the caller's decision. During init and discovery any failure
//! propagates (a protection daemon must not run with a partially-initialized
//! actuator set); during steady-state actuation callers log and continue.

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Read a file and strip the trailing newline.
pub fn read_string(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).map_err(|source| Error::SysfsRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(raw.trim_end().to_string())
}

/// Read a single decimal value.
pub fn read_value<T: FromStr>(path: &Path) -> Result<T> {
    let text = read_string(path)?;
    text.trim().parse().map_err(|_| Error::SysfsParse {
        path: path.to_path_buf(),
        value: text,
    })
}

/// Read a whitespace-separated list, e.g. `scaling_available_frequencies`.
pub fn read_list<T: FromStr>(path: &Path) -> Result<Vec<T>> {
    let text = read_string(path)?;
    text.split_whitespace()
        .map(|token| {
            token.parse().map_err(|_| Error::SysfsParse {
                path: path.to_path_buf(),
                value: token.to_string(),
            })
        })
        .collect()
}

/// Write a value as decimal ASCII with a trailing newline.
pub fn write_value<T: Display>(path: &Path, value: T) -> Result<()> {
    fs::write(path, format!("{value}\n")).map_err(|source| Error::SysfsWrite {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attr");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn read_string_strips_trailing_newline() {
        let (_dir, path) = scratch_file("ondemand\n");
        assert_eq!(read_string(&path).unwrap(), "ondemand");
    }

    #[test]
    fn read_value_parses_decimal() {
        let (_dir, path) = scratch_file("61000\n");
        assert_eq!(read_value::<i64>(&path).unwrap(), 61000);
    }

    #[test]
    fn read_value_rejects_garbage() {
        let (_dir, path) = scratch_file("not-a-number\n");
        assert!(matches!(
            read_value::<i64>(&path),
            Err(Error::SysfsParse { .. })
        ));
    }

    #[test]
    fn read_list_splits_on_whitespace() {
        let (_dir, path) = scratch_file("300000 600000 1000000 1200000\n");
        assert_eq!(
            read_list::<u64>(&path).unwrap(),
            vec![300000, 600000, 1000000, 1200000]
        );
    }

    #[test]
    fn write_value_appends_newline() {
        let (_dir, path) = scratch_file("");
        write_value(&path, 600000u64).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "600000\n");
    }

    #[test]
    fn missing_file_reports_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        assert!(matches!(read_string(&path), Err(Error::SysfsRead { .. })));
    }
}
