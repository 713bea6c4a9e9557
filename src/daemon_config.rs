//! Docker daemon configuration file handling
//!
//! The daemon reads `/etc/docker/daemon.json` at startup. The file is
//! optional: an absent file means the daemon runs with built-in defaults.
//! The auditor distinguishes absent, invalid, and loaded configurations.

use serde::Deserialize;
use std::path::Path;

/// Default location of the daemon configuration file
pub const DAEMON_CONFIG_PATH: &str = "/etc/docker/daemon.json";

/// Default log driver when the config omits `log-driver`
pub const DEFAULT_LOG_DRIVER: &str = "json-file";

/// Default storage driver when the config omits `storage-driver`
pub const DEFAULT_STORAGE_DRIVER: &str = "auto";

/// Parsed subset of daemon.json
///
/// Only the fields the audit reports on are modeled; unknown fields are
/// ignored, matching the daemon's own lenient handling of extra keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfig {
    #[serde(rename = "log-driver")]
    log_driver: Option<String>,

    #[serde(rename = "storage-driver")]
    storage_driver: Option<String>,

    #[serde(rename = "data-root")]
    data_root: Option<String>,

    #[serde(rename = "live-restore")]
    live_restore: Option<bool>,
}

impl DaemonConfig {
    /// Configured log driver, falling back to the daemon default
    pub fn log_driver(&self) -> &str {
        self.log_driver.as_deref().unwrap_or(DEFAULT_LOG_DRIVER)
    }

    /// Configured storage driver, falling back to daemon auto-selection
    pub fn storage_driver(&self) -> &str {
        self.storage_driver
            .as_deref()
            .unwrap_or(DEFAULT_STORAGE_DRIVER)
    }

    /// Configured data root, if any
    pub fn data_root(&self) -> Option<&str> {
        self.data_root.as_deref()
    }

    /// Whether live-restore is enabled (defaults to off)
    pub fn live_restore(&self) -> bool {
        self.live_restore.unwrap_or(false)
    }
}

/// Three-way result of probing the daemon configuration file
#[derive(Debug, Clone)]
pub enum ConfigState {
    /// No file at the expected path; daemon uses built-in defaults
    Missing,
    /// File exists but is not valid JSON
    Invalid(String),
    /// File exists and parsed cleanly
    Loaded(DaemonConfig),
}

/// Probe the daemon configuration file at `path`
pub fn load(path: &Path) -> ConfigState {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ConfigState::Missing,
        Err(e) => return ConfigState::Invalid(e.to_string()),
    };

    match serde_json::from_str::<DaemonConfig>(&raw) {
        Ok(config) => ConfigState::Loaded(config),
        Err(e) => ConfigState::Invalid(e.to_string()),
    }
}
