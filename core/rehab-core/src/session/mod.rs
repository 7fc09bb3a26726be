//! Exercise Session Tracking
//!
//! Tracks one timed exercise at a time (countdown, running timer, interval
//! alerts, measurement collection, completion) and keeps it alive across
//! restarts by writing it to durable storage after every change.
//!
//! # Architecture
//!
//! ```text
//! Driver (UI / CLI) → ExerciseTracker → SessionStorage (file / memory)
//!    (ticks, input)      (single slot)       (one fixed key)
//!                              ↑
//!                    sanitize_exercise_data (on load)
//! ```
//!
//! # Phases
//!
//! - **Idle**: no session. Initial state, and terminal after `clear_exercise`.
//! - **Running**: `is_started && is_timer_running`. `tick()` decrements once per second.
//! - **Paused**: `is_timer_running == false`. Ticks are ignored.
//! - **Expired-on-load**: a stored session older than 25 minutes is dropped during
//!   `restore()` as if it never existed. Running sessions are never expired.
//!
//! # Module Structure
//!
//! - [`types`]: Session record, collection schedule, patch and event types
//! - [`sanitize`]: Validation of untrusted persisted records
//! - [`store`]: Key-value storage backends
//! - [`tracker`]: The state machine itself
//! - [`clock`]: Wall-clock abstraction so tests control time

pub mod clock;
pub mod sanitize;
pub mod store;
pub mod tracker;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sanitize::sanitize_exercise_data;
pub use store::{FileStorage, MemoryStorage, SessionStorage};
pub use tracker::{ExerciseTracker, Phase, ViewSession};
pub use types::{
    CompletedExercise, DataCollectionType, ExerciseSession, IntervalReached,
    ParseCollectionTypeError, SessionPatch, SESSION_EXPIRY_MS, SESSION_RECORD_VERSION,
    SESSION_STORAGE_KEY,
};
