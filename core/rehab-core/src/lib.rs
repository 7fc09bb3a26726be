//! # rehab-core
//!
//! Core library for pulmorehab, providing the stateful pieces behind the
//! patient-facing exercise screens.
//!
//! ## Design Principles
//!
//! - **Injectable**: Trackers and caches are explicit values. Nothing lives in a
//!   module-level singleton, so tests build isolated instances.
//! - **Not thread-safe tracker**: `ExerciseTracker` takes `&mut self`. Clients
//!   provide their own synchronization (`Mutex`, `RwLock`).
//! - **Graceful degradation**: Missing or corrupt persisted state means "no
//!   session", never an error surfaced to callers.
//! - **Untrusted storage**: Everything read back from storage goes through
//!   [`sanitize_exercise_data`] before it is used.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rehab_core::{DataCollectionType, ExerciseTracker, FileStorage, StorageConfig};
//!
//! let storage = FileStorage::new(StorageConfig::resolve()?.session_dir());
//! let mut tracker = ExerciseTracker::open(storage);
//! tracker.start_exercise("ex1", DataCollectionType::A, 600);
//! if let Some(alert) = tracker.tick() {
//!     println!("interval {} reached", alert.interval);
//! }
//! ```

// Public modules
pub mod cache;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod timer;

// Re-export commonly used items at crate root
pub use cache::{dashboard_key, profile_key, RequestCache, PROFILE_CACHE_TTL, REQUEST_CACHE_TTL};
pub use config::{load_app_config, save_app_config, AppConfig};
pub use error::{RehabError, Result};
pub use session::*;
pub use storage::StorageConfig;
pub use timer::*;
