//! TableWatch configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::watcher::WatcherConfig;

/// Main TableWatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File watcher settings
    pub watch: WatcherConfig,

    /// Interactive prompt settings
    pub repl: ReplConfig,
}

/// Project-local config file, looked up in the working directory
const LOCAL_CONFIG: &str = ".tablewatch.yml";

impl Config {
    /// Load configuration
    ///
    /// An explicit `--config` path must exist and parse. Otherwise the first
    /// of `./.tablewatch.yml` and `<config_dir>/tablewatch/tablewatch.yml` that
    /// parses wins; broken candidates are logged and skipped.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .with_context(|| format!("Cannot use config file {}", path.display()));
        }

        for candidate in Self::candidates() {
            if !candidate.is_file() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => warn!(path = %candidate.display(), error = %e, "Skipping unreadable config"),
            }
        }

        info!("No tablewatch config found; watcher and prompt use built-in defaults");
        Ok(Self::default())
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("tablewatch").join("tablewatch.yml"));
        }
        paths
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).context("Config file is not readable")?;
        let config: Self = serde_yaml::from_str(&text).context("Config file is not valid YAML for tablewatch")?;

        info!(
            path = %path.display(),
            poll_interval_ms = config.watch.poll_interval_ms,
            "Using config file"
        );
        Ok(config)
    }
}

/// Interactive prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// Ask before loading a file
    #[serde(rename = "confirm-load")]
    pub confirm_load: bool,

    /// Ask whether to overwrite the loaded file or save elsewhere
    #[serde(rename = "confirm-save")]
    pub confirm_save: bool,

    /// Number of commands kept in line-editor history
    #[serde(rename = "history-size")]
    pub history_size: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            confirm_load: true,
            confirm_save: true,
            history_size: 100,
        }
    }
}
