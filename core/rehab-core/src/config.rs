//! Configuration loading and saving utilities.
//!
//! Handles persistence for the app preferences read by the session driver.
//! A missing file yields defaults; a malformed file yields defaults plus a
//! warning so a bad edit never blocks an exercise.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{RehabError, Result};
use crate::storage::StorageConfig;

/// Preferences for the countdown/tick driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Length of the "3-2-1" countdown before the timed phase.
    pub countdown_secs: u32,
    /// Reconcile with wall-clock time once ticked and elapsed time disagree by more than this.
    pub drift_tolerance_secs: u32,
    /// How long an interval alert stays on screen.
    pub alert_display_secs: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            drift_tolerance_secs: 2,
            alert_display_secs: 3,
        }
    }
}

/// Loads the app configuration, returning defaults if the file doesn't exist or is malformed.
pub fn load_app_config(storage: &StorageConfig) -> AppConfig {
    let path = storage.config_file();
    match read_config(&path) {
        Ok(Some(config)) => config,
        Ok(None) => AppConfig::default(),
        Err(err) => {
            warn!(error = %err, "Ignoring unreadable config, using defaults");
            AppConfig::default()
        }
    }
}

fn read_config(path: &Path) -> Result<Option<AppConfig>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(RehabError::io("Failed to read config", err)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|err| RehabError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
}

/// Saves the app configuration to disk.
pub fn save_app_config(storage: &StorageConfig, config: &AppConfig) -> Result<()> {
    let path = storage.config_file();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RehabError::io("Failed to create config dir", e))?;
    }
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| RehabError::json("Failed to serialize config", e))?;
    fs::write(&path, content).map_err(|e| RehabError::io("Failed to write config", e))
}
