//! Configuration management for the labeler
//!
//! Resolves where source datasets are read from and where labels are
//! written. Precedence: command-line flags, then `LABELER_*` environment
//! variables, then a config file in the working directory, then defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LabelError, Result};

pub const OUTPUT_DIR_ENV: &str = "LABELER_OUTPUT_DIR";
pub const DATA_DIR_ENV: &str = "LABELER_DATA_DIR";

const CONFIG_PATHS: [&str; 3] = [".labeler.json", "labeler.json", ".labeler/config.json"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  /// Directory holding `{dataset}.json` question files
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,
  /// Storage root for label files and exports
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
  PathBuf::from("data/final_files")
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("labeled_data")
}

impl Default for Config {
  fn default() -> Self {
    Self { data_dir: default_data_dir(), output_dir: default_output_dir() }
  }
}

impl Config {
  /// Load configuration from a file
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| LabelError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| LabelError::malformed(path, e))
  }

  /// Config file from the working directory (or defaults) with environment
  /// overrides applied
  pub fn load() -> Result<Self> {
    let mut config = match CONFIG_PATHS.iter().find(|path| Path::new(path).exists()) {
      Some(path) => Self::load_from_file(path)?,
      None => Config::default(),
    };

    config.apply_env();
    Ok(config)
  }

  pub fn apply_env(&mut self) {
    if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
      self.output_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
      self.data_dir = PathBuf::from(dir);
    }
  }

  /// Save configuration to a file
  pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(self).map_err(|e| LabelError::io(path, e.into()))?;
    std::fs::write(path, content).map_err(|e| LabelError::io(path, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.data_dir, PathBuf::from("data/final_files"));
    assert_eq!(config.output_dir, PathBuf::from("labeled_data"));
  }

  #[test]
  fn test_save_and_load_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("labeler.json");
    let config = Config { data_dir: PathBuf::from("/srv/questions"), output_dir: PathBuf::from("/srv/labels") };

    config.save_to_file(&path).unwrap();
    assert_eq!(Config::load_from_file(&path).unwrap(), config);
  }

  #[test]
  fn test_partial_file_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("labeler.json");
    std::fs::write(&path, r#"{ "output_dir": "out" }"#).unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.output_dir, PathBuf::from("out"));
    assert_eq!(config.data_dir, PathBuf::from("data/final_files"));
  }

  #[test]
  #[serial]
  fn test_env_overrides() {
    std::env::set_var(OUTPUT_DIR_ENV, "/tmp/labels-env");
    std::env::set_var(DATA_DIR_ENV, "/tmp/data-env");

    let mut config = Config::default();
    config.apply_env();

    std::env::remove_var(OUTPUT_DIR_ENV);
    std::env::remove_var(DATA_DIR_ENV);

    assert_eq!(config.output_dir, PathBuf::from("/tmp/labels-env"));
    assert_eq!(config.data_dir, PathBuf::from("/tmp/data-env"));
  }
}
