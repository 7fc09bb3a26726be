//! Storage configuration and path management for pulmorehab.
//!
//! This module provides a centralized `StorageConfig` struct that manages all
//! file paths for pulmorehab data. This abstraction enables:
//!
//! - Easy path changes without hunting through code
//! - Testability via dependency injection (inject temp paths)
//! - Env var overrides (`PULMOREHAB_HOME`)
//!
//! ## Layout
//!
//! ```text
//! ~/.pulmorehab/
//! ├── config.json        # AppConfig
//! ├── storage/           # FileStorage root (one JSON file per key)
//! │   └── currentExercise.json
//! └── logs/              # rolling CLI logs
//! ```

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{RehabError, Result};

/// Overrides the default root directory when set.
pub const HOME_ENV_VAR: &str = "PULMOREHAB_HOME";

const ROOT_DIR_NAME: &str = ".pulmorehab";

/// Central configuration for all pulmorehab storage paths.
///
/// Production code uses [`StorageConfig::resolve`], which honours
/// `PULMOREHAB_HOME` and otherwise points to `~/.pulmorehab/`.
/// Tests use `StorageConfig::with_root(temp_dir)` for isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    pub fn resolve() -> Result<Self> {
        if let Some(root) = env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(RehabError::HomeDirNotFound)?;
        Ok(Self::with_root(home.join(ROOT_DIR_NAME)))
    }

    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing [`crate::FileStorage`].
    pub fn session_dir(&self) -> PathBuf {
        self.root.join("storage")
    }

    /// Path to config.json (app preferences).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
