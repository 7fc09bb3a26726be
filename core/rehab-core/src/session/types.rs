//! Serialized session types.
//!
//! The persisted record uses camelCase field names so records written by
//! earlier clients still load. Current record version is 1; unversioned
//! records are accepted as legacy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed storage key for the single session slot.
pub const SESSION_STORAGE_KEY: &str = "currentExercise";

/// Stored sessions older than this are discarded on load (longest exercise plus margin).
pub const SESSION_EXPIRY_MS: i64 = 25 * 60 * 1000; // 25 minutes

pub const SESSION_RECORD_VERSION: u64 = 1;

pub const MAX_EXERCISE_ID_CHARS: usize = 100;
pub const MAX_FORM_KEY_CHARS: usize = 50;
pub const MAX_FORM_VALUE_CHARS: usize = 1000;

// -----------------------------------------------------------------------------
// Collection schedule
//
// type | total   | interval | alerts
// A    | 10 min  | 2 min    | 120s, 240s, 360s, 480s
// B    | 6 min   | 3 min    | 180s
// C    | 20 min  | 10 min   | 600s
// -----------------------------------------------------------------------------

/// Measurement schedule for an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataCollectionType {
    A,
    B,
    C,
}

impl DataCollectionType {
    pub const ALL: [DataCollectionType; 3] = [Self::A, Self::B, Self::C];

    /// Canonical total duration. Both the start and resume paths read this.
    pub fn total_secs(self) -> u32 {
        match self {
            Self::A => 600,
            Self::B => 360,
            Self::C => 1200,
        }
    }

    /// Length of one measurement interval.
    pub fn interval_secs(self) -> u32 {
        match self {
            Self::A => 120,
            Self::B => 180,
            Self::C => 600,
        }
    }

    /// Number of interval boundaries crossed once `elapsed_secs` have passed.
    pub fn intervals_elapsed(self, elapsed_secs: u32) -> u32 {
        elapsed_secs.min(self.total_secs()) / self.interval_secs()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl fmt::Display for DataCollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data collection type {0:?} (expected A, B or C)")]
pub struct ParseCollectionTypeError(pub String);

impl FromStr for DataCollectionType {
    type Err = ParseCollectionTypeError;

    /// Exact match only; persisted records are case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            other => Err(ParseCollectionTypeError(other.to_string())),
        }
    }
}

/// One in-progress or paused timed exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSession {
    pub exercise_id: String,
    pub data_collection_type: DataCollectionType,
    /// The pre-start countdown has finished and the timed phase began.
    pub is_started: bool,
    pub is_timer_running: bool,
    /// Seconds left, within `[0, total_secs]`.
    pub time_remaining: u32,
    /// Interval boundaries crossed so far. Never decreases.
    pub current_interval: u32,
    /// Epoch milliseconds of the (re)start.
    pub start_time: i64,
    #[serde(default)]
    pub form_data: BTreeMap<String, String>,
}

impl ExerciseSession {
    pub fn total_secs(&self) -> u32 {
        self.data_collection_type.total_secs()
    }

    /// Seconds counted down so far, according to `time_remaining`.
    pub fn elapsed_secs(&self) -> u32 {
        self.total_secs().saturating_sub(self.time_remaining)
    }

    pub fn is_finished(&self) -> bool {
        self.time_remaining == 0
    }

    /// True if `now - start_time` has reached the load-time expiry ceiling.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis.saturating_sub(self.start_time) >= SESSION_EXPIRY_MS
    }
}

/// Versioned on-disk shape of [`ExerciseSession`].
#[derive(Debug, Serialize)]
pub(crate) struct PersistedSession<'a> {
    pub version: u64,
    #[serde(flatten)]
    pub session: &'a ExerciseSession,
}

/// Shallow-merge update for [`crate::ExerciseTracker::update_exercise_state`].
///
/// Only the fields that are `Some` are written. `form_data` replaces the whole map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPatch {
    pub exercise_id: Option<String>,
    pub data_collection_type: Option<DataCollectionType>,
    pub is_started: Option<bool>,
    pub is_timer_running: Option<bool>,
    pub time_remaining: Option<u32>,
    pub current_interval: Option<u32>,
    pub start_time: Option<i64>,
    pub form_data: Option<BTreeMap<String, String>>,
}

impl SessionPatch {
    pub fn time_remaining(secs: u32) -> Self {
        Self {
            time_remaining: Some(secs),
            ..Default::default()
        }
    }

    pub fn running(running: bool) -> Self {
        Self {
            is_timer_running: Some(running),
            ..Default::default()
        }
    }

    pub fn form_data(form_data: BTreeMap<String, String>) -> Self {
        Self {
            form_data: Some(form_data),
            ..Default::default()
        }
    }
}

/// One-shot signal that a new measurement interval was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalReached {
    /// 1-based index of the boundary just crossed.
    pub interval: u32,
    pub time_remaining: u32,
}

/// Completion event handed to external persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedExercise {
    pub exercise_id: String,
    pub data_collection_type: DataCollectionType,
    pub duration_secs: u32,
    pub elapsed_secs: u32,
    pub start_time: i64,
    pub completed_at: i64,
    pub form_data: BTreeMap<String, String>,
}
