// Runtime configuration
// Defaults, optionally overridden by a TOML file, then by CLI flags

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::barcode::DEFAULT_BAR_HEIGHT;
use crate::error::{AttendanceError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory the generated barcode images go into
    pub barcode_dir: PathBuf,
    /// Rendered bar height in pixels
    pub barcode_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("attendance.db"),
            barcode_dir: PathBuf::from("barcodes"),
            barcode_height: DEFAULT_BAR_HEIGHT,
        }
    }
}

impl Config {
    /// Load from `path` when given, otherwise use the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| AttendanceError::Config {
                    message: format!("cannot read {}: {}", path.display(), e),
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| AttendanceError::Config {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.barcode_height == 0 {
            return Err(AttendanceError::Config {
                message: "barcode_height must be greater than zero".to_string(),
            });
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(AttendanceError::Config {
                message: "database_path must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::load(None).unwrap();

        assert_eq!(config.database_path, PathBuf::from("attendance.db"));
        assert_eq!(config.barcode_dir, PathBuf::from("barcodes"));
        assert_eq!(config.barcode_height, 80);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml("barcode_dir = \"/srv/codes\"").unwrap();

        assert_eq!(config.barcode_dir, PathBuf::from("/srv/codes"));
        assert_eq!(config.database_path, PathBuf::from("attendance.db"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.toml");
        fs::write(
            &path,
            "database_path = \"class.db\"\nbarcode_dir = \"images\"\nbarcode_height = 120\n",
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();

        assert_eq!(config.database_path, PathBuf::from("class.db"));
        assert_eq!(config.barcode_dir, PathBuf::from("images"));
        assert_eq!(config.barcode_height, 120);
    }

    #[test]
    fn test_rejects_unknown_keys_and_zero_height() {
        assert_eq!(Config::from_toml("barcode_colour = \"red\"").unwrap_err().kind(), "config");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "barcode_height = 0").unwrap();
        assert_eq!(Config::load(Some(path.as_path())).unwrap_err().kind(), "config");
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Some(Path::new("/no/such/attendance.toml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
