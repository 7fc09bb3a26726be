//! Error types for rehab-core operations.
//!
//! The tracker never surfaces these to its callers (storage faults degrade to
//! "no session"); they flow through storage backends, configuration loading
//! and the CLI.

use std::path::PathBuf;

/// All errors that can occur in rehab-core operations.
#[derive(Debug, thiserror::Error)]
pub enum RehabError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid storage key: {0:?}")]
    InvalidStorageKey(String),

    #[error("Storage path has no parent directory: {0}")]
    NoParentDir(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RehabError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RehabError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        RehabError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using RehabError.
pub type Result<T> = std::result::Result<T, RehabError>;
