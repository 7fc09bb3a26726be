//! The exercise session state machine.
//!
//! [`ExerciseTracker`] owns the single session slot and mirrors it to
//! [`SessionStorage`] after every mutation. It never returns errors: storage
//! faults are logged and degrade to "no session".
//!
//! # Hydration
//!
//! A tracker starts un-restored. Until [`ExerciseTracker::restore`] has run,
//! mutations are kept in memory only, so an empty in-memory slot can never
//! overwrite a real persisted session. [`ExerciseTracker::open`] constructs and
//! restores in one step.
//!
//! # Time
//!
//! `tick()` decrements `time_remaining` from its previous in-memory value, one
//! second per call. `resume_exercise()` is the wall-clock authority: it
//! recomputes `time_remaining` from `now - start_time` against the canonical
//! total for the collection type. Drivers call it after a reload and whenever
//! the ticked countdown has drifted from the wall clock.
//!
//! # Disjoint Writers
//!
//! Timer fields (`time_remaining`, `current_interval`, `is_timer_running`) and
//! `form_data` are touched by different operations. A tick never rewrites form
//! data and a form edit never rewrites timer fields, so interleaved callers
//! cannot lose each other's updates.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::sanitize::{sanitize_exercise_data, truncate_chars};
use super::store::SessionStorage;
use super::types::{
    CompletedExercise, DataCollectionType, ExerciseSession, IntervalReached, PersistedSession,
    SessionPatch, MAX_EXERCISE_ID_CHARS, SESSION_RECORD_VERSION, SESSION_STORAGE_KEY,
};

/// Coarse lifecycle phase derived from the session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    /// Countdown reached zero; waiting for completion or clear.
    Finished,
}

/// Outcome of [`ExerciseTracker::resume_for_view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSession {
    /// Storage hasn't been loaded yet; don't act on the empty slot.
    NotRestored,
    Idle,
    /// The stored session belonged to another exercise and was cleared.
    DiscardedStale,
    Resumed,
}

pub struct ExerciseTracker<S, C = SystemClock> {
    storage: S,
    clock: C,
    session: Option<ExerciseSession>,
    restored: bool,
}

impl<S: SessionStorage> ExerciseTracker<S, SystemClock> {
    pub fn new(storage: S) -> Self {
        Self::with_clock(storage, SystemClock)
    }

    /// Creates a tracker and restores any persisted session.
    pub fn open(storage: S) -> Self {
        let mut tracker = Self::new(storage);
        tracker.restore();
        tracker
    }
}

impl<S: SessionStorage, C: Clock> ExerciseTracker<S, C> {
    pub fn with_clock(storage: S, clock: C) -> Self {
        ExerciseTracker {
            storage,
            clock,
            session: None,
            restored: false,
        }
    }

    pub fn open_with_clock(storage: S, clock: C) -> Self {
        let mut tracker = Self::with_clock(storage, clock);
        tracker.restore();
        tracker
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn session(&self) -> Option<&ExerciseSession> {
        self.session.as_ref()
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn phase(&self) -> Phase {
        match &self.session {
            None => Phase::Idle,
            Some(s) if s.is_finished() => Phase::Finished,
            Some(s) if s.is_started && s.is_timer_running => Phase::Running,
            Some(_) => Phase::Paused,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Hydration
    // ─────────────────────────────────────────────────────────────────────

    /// Loads the persisted session once. Invalid or expired records are
    /// removed from storage and leave the slot empty.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.session = self.load_persisted();
        self.restored = true;
    }

    fn load_persisted(&self) -> Option<ExerciseSession> {
        let raw = match self.storage.read(SESSION_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "Failed to read stored exercise session, clearing it");
                self.discard_persisted();
                return None;
            }
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "Stored exercise session is not valid JSON, clearing it");
                self.discard_persisted();
                return None;
            }
        };

        let Some(session) = sanitize_exercise_data(&value) else {
            warn!("Stored exercise session failed validation, clearing it");
            self.discard_persisted();
            return None;
        };

        let now = self.clock.now_millis();
        if session.is_expired_at(now) {
            debug!(
                exercise_id = %session.exercise_id,
                age_ms = now.saturating_sub(session.start_time),
                "Discarding expired exercise session"
            );
            self.discard_persisted();
            return None;
        }

        info!(
            exercise_id = %session.exercise_id,
            time_remaining = session.time_remaining,
            "Restored exercise session"
        );
        Some(session)
    }

    fn discard_persisted(&self) {
        if let Err(err) = self.storage.remove(SESSION_STORAGE_KEY) {
            warn!(error = %err, "Failed to remove stored exercise session");
        }
    }

    /// Mirrors the slot to storage. Skipped until hydration has completed.
    fn persist(&self) {
        if !self.restored {
            return;
        }
        let Some(session) = &self.session else {
            self.discard_persisted();
            return;
        };
        let record = PersistedSession {
            version: SESSION_RECORD_VERSION,
            session,
        };
        let content = match serde_json::to_string(&record) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "Failed to serialize exercise session");
                return;
            }
        };
        if let Err(err) = self.storage.write(SESSION_STORAGE_KEY, &content) {
            warn!(error = %err, "Failed to persist exercise session");
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Replaces whatever is in the slot with a fresh running session.
    ///
    /// The countdown always starts from the canonical total for `kind`, the
    /// same baseline `resume_exercise` measures against. A different
    /// `total_time_secs` is ignored with a warning.
    pub fn start_exercise(
        &mut self,
        exercise_id: impl Into<String>,
        kind: DataCollectionType,
        total_time_secs: u32,
    ) {
        let exercise_id = truncate_chars(&exercise_id.into(), MAX_EXERCISE_ID_CHARS);
        let time_remaining = kind.total_secs();
        if total_time_secs != time_remaining {
            warn!(
                exercise_id = %exercise_id,
                requested = total_time_secs,
                canonical = time_remaining,
                "Ignoring non-canonical exercise duration"
            );
        }

        info!(
            exercise_id = %exercise_id,
            data_collection_type = %kind,
            time_remaining,
            "Starting exercise session"
        );

        self.session = Some(ExerciseSession {
            exercise_id,
            data_collection_type: kind,
            is_started: true,
            is_timer_running: true,
            time_remaining,
            current_interval: 0,
            start_time: self.clock.now_millis(),
            form_data: Default::default(),
        });
        self.persist();
    }

    /// Shallow-merges `patch` into the session. No-op without a session.
    ///
    /// A patch carrying `time_remaining` without `current_interval` runs the
    /// interval bookkeeping and may return the one-shot interval signal.
    pub fn update_exercise_state(&mut self, patch: SessionPatch) -> Option<IntervalReached> {
        let now = self.clock.now_millis();
        let reached = {
            let session = self.session.as_mut()?;
            let SessionPatch {
                exercise_id,
                data_collection_type,
                is_started,
                is_timer_running,
                time_remaining,
                current_interval,
                start_time,
                form_data,
            } = patch;

            if let Some(id) = exercise_id {
                session.exercise_id = truncate_chars(&id, MAX_EXERCISE_ID_CHARS);
            }
            if let Some(kind) = data_collection_type {
                session.data_collection_type = kind;
                session.time_remaining = session.time_remaining.min(kind.total_secs());
            }
            if let Some(started) = is_started {
                session.is_started = started;
            }
            if let Some(running) = is_timer_running {
                set_timer_running(session, running, now);
            }
            if let Some(start_time) = start_time {
                session.start_time = start_time;
            }
            if let Some(form_data) = form_data {
                session.form_data = form_data;
            }

            match (time_remaining, current_interval) {
                (Some(secs), None) => apply_time_remaining(session, secs),
                (secs, interval) => {
                    if let Some(secs) = secs {
                        session.time_remaining = secs.min(session.total_secs());
                    }
                    if let Some(interval) = interval {
                        session.current_interval = session.current_interval.max(interval);
                    }
                    None
                }
            }
        };

        self.persist();
        reached
    }

    /// Advances the countdown by one second while running.
    pub fn tick(&mut self) -> Option<IntervalReached> {
        let reached = {
            let session = self.session.as_mut()?;
            if !(session.is_started && session.is_timer_running) || session.time_remaining == 0 {
                return None;
            }
            let next = session.time_remaining - 1;
            apply_time_remaining(session, next)
        };
        self.persist();
        reached
    }

    pub fn set_time_remaining(&mut self, secs: u32) -> Option<IntervalReached> {
        self.update_exercise_state(SessionPatch::time_remaining(secs))
    }

    /// Records one measurement or note. Timer fields are left alone.
    pub fn set_form_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.form_data.insert(key.into(), value.into());
        self.persist();
    }

    /// Pauses or continues the countdown.
    ///
    /// Continuing re-anchors `start_time` to the time already counted down, so
    /// the paused stretch is not charged as elapsed by `resume_exercise`.
    pub fn set_running(&mut self, running: bool) {
        let now = self.clock.now_millis();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        set_timer_running(session, running, now);
        self.persist();
    }

    /// Deletes the session from memory and storage. Safe to call repeatedly.
    pub fn clear_exercise(&mut self) {
        if let Some(session) = self.session.take() {
            info!(exercise_id = %session.exercise_id, "Clearing exercise session");
        }
        self.discard_persisted();
    }

    /// Recomputes `time_remaining` from the wall clock and keeps the timer running.
    ///
    /// A paused session has no wall-clock progress to recover; it continues
    /// from its stored `time_remaining` instead.
    pub fn resume_exercise(&mut self) {
        let now = self.clock.now_millis();
        {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let total = session.total_secs();
            let elapsed_secs = if session.is_timer_running {
                let elapsed_ms = now.saturating_sub(session.start_time).max(0);
                (elapsed_ms / 1000).min(i64::from(total)) as u32
            } else {
                session.elapsed_secs()
            };

            session.time_remaining = total - elapsed_secs;
            session.start_time = now - i64::from(elapsed_secs) * 1000;
            session.is_timer_running = true;

            info!(
                exercise_id = %session.exercise_id,
                time_remaining = session.time_remaining,
                "Resumed exercise session"
            );
        }
        self.persist();
    }

    /// Applies the stale-view rule for the exercise currently on screen.
    pub fn resume_for_view(&mut self, exercise_id: &str) -> ViewSession {
        if !self.restored {
            return ViewSession::NotRestored;
        }
        let stale = match &self.session {
            None => return ViewSession::Idle,
            Some(session) => session.exercise_id != exercise_id,
        };
        if stale {
            debug!(viewed = exercise_id, "Stored session belongs to another exercise");
            self.clear_exercise();
            ViewSession::DiscardedStale
        } else {
            self.resume_exercise();
            ViewSession::Resumed
        }
    }

    /// Takes the collected data for external persistence and clears the slot.
    pub fn complete_exercise(&mut self) -> Option<CompletedExercise> {
        let session = self.session.take()?;
        let completed = CompletedExercise {
            duration_secs: session.total_secs(),
            elapsed_secs: session.elapsed_secs(),
            exercise_id: session.exercise_id,
            data_collection_type: session.data_collection_type,
            start_time: session.start_time,
            completed_at: self.clock.now_millis(),
            form_data: session.form_data,
        };
        info!(
            exercise_id = %completed.exercise_id,
            elapsed_secs = completed.elapsed_secs,
            "Exercise session completed"
        );
        self.discard_persisted();
        Some(completed)
    }
}

/// Sets `time_remaining` and advances `current_interval` if a boundary was crossed.
fn set_timer_running(session: &mut ExerciseSession, running: bool, now: i64) {
    if running && !session.is_timer_running {
        session.start_time = now - i64::from(session.elapsed_secs()) * 1000;
    }
    session.is_timer_running = running;
    debug!(exercise_id = %session.exercise_id, running, "Exercise timer toggled");
}

fn apply_time_remaining(session: &mut ExerciseSession, secs: u32) -> Option<IntervalReached> {
    session.time_remaining = secs.min(session.total_secs());
    if session.time_remaining == 0 {
        return None;
    }

    let interval = session
        .data_collection_type
        .intervals_elapsed(session.elapsed_secs());
    if interval <= session.current_interval {
        return None;
    }

    session.current_interval = interval;
    debug!(
        exercise_id = %session.exercise_id,
        interval,
        time_remaining = session.time_remaining,
        "Interval reached"
    );
    Some(IntervalReached {
        interval,
        time_remaining: session.time_remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::store::MemoryStorage;
    use crate::session::types::SESSION_EXPIRY_MS;
    use serde_json::json;

    const T0: i64 = 1_700_000_000_000;

    fn tracker() -> (ExerciseTracker<MemoryStorage, ManualClock>, MemoryStorage, ManualClock) {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(T0);
        let tracker = ExerciseTracker::open_with_clock(storage.clone(), clock.clone());
        (tracker, storage, clock)
    }

    fn stored(storage: &MemoryStorage) -> Option<Value> {
        storage
            .read(SESSION_STORAGE_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn test_start_creates_running_session() {
        let (mut tracker, storage, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);

        let session = tracker.session().unwrap();
        assert!(session.is_started);
        assert!(session.is_timer_running);
        assert_eq!(session.time_remaining, 600);
        assert_eq!(session.current_interval, 0);
        assert_eq!(session.start_time, T0);
        assert!(session.form_data.is_empty());
        assert_eq!(tracker.phase(), Phase::Running);

        let record = stored(&storage).unwrap();
        assert_eq!(record["exerciseId"], "ex1");
        assert_eq!(record["version"], 1);
    }

    #[test]
    fn test_start_overwrites_previous_session() {
        let (mut tracker, _, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        tracker.set_form_field("input_0", "95");
        tracker.start_exercise("ex2", DataCollectionType::B, 360);

        let session = tracker.session().unwrap();
        assert_eq!(session.exercise_id, "ex2");
        assert!(session.form_data.is_empty());
    }

    #[test]
    fn test_start_ignores_non_canonical_total() {
        let (mut capped, _, _) = tracker();
        capped.start_exercise("ex1", DataCollectionType::B, 9_999);
        assert_eq!(capped.session().unwrap().time_remaining, 360);

        let (mut tracker, _, clock) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 100);
        assert_eq!(tracker.session().unwrap().time_remaining, 600);

        assert_eq!(tracker.tick(), None);
        let session = tracker.session().unwrap();
        assert_eq!(session.time_remaining, 599);
        assert_eq!(session.current_interval, 0);

        clock.advance_secs(1);
        tracker.resume_exercise();
        assert_eq!(tracker.session().unwrap().time_remaining, 599);
    }

    #[test]
    fn test_interval_signal_fires_once_per_boundary() {
        let (mut tracker, _, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);

        let reached = tracker.update_exercise_state(SessionPatch::time_remaining(480));
        assert_eq!(
            reached,
            Some(IntervalReached {
                interval: 1,
                time_remaining: 480
            })
        );
        assert_eq!(tracker.session().unwrap().current_interval, 1);

        assert_eq!(
            tracker.update_exercise_state(SessionPatch::time_remaining(479)),
            None
        );
        assert_eq!(tracker.session().unwrap().current_interval, 1);
    }

    #[test]
    fn test_interval_monotonic_over_full_countdown() {
        for kind in DataCollectionType::ALL {
            let (mut tracker, _, _) = tracker();
            let total = kind.total_secs();
            tracker.start_exercise("ex", kind, total);

            let mut signals = 0;
            let mut last = 0;
            for t in (0..total).rev() {
                let reached = tracker.set_time_remaining(t);
                let interval = tracker.session().unwrap().current_interval;
                assert!(interval >= last);
                if reached.is_some() {
                    signals += 1;
                    assert_eq!(interval, last + 1);
                    assert_eq!((total - t) % kind.interval_secs(), 0);
                }
                if t == 0 {
                    assert!(reached.is_none());
                    assert_eq!(interval, last);
                }
                last = interval;
            }
            // Boundaries strictly before the end
            assert_eq!(signals, (total - 1) / kind.interval_secs());
        }
    }

    #[test]
    fn test_tick_decrements_and_signals() {
        let (mut tracker, _, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::B, 360);

        let mut signals = Vec::new();
        for _ in 0..180 {
            if let Some(reached) = tracker.tick() {
                signals.push(reached.interval);
            }
        }
        assert_eq!(tracker.session().unwrap().time_remaining, 180);
        assert_eq!(signals, vec![1]);
    }

    #[test]
    fn test_tick_stops_at_zero() {
        let (mut tracker, _, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::B, 360);
        tracker.set_time_remaining(2);
        tracker.tick();
        tracker.tick();
        tracker.tick();
        assert_eq!(tracker.session().unwrap().time_remaining, 0);
        assert_eq!(tracker.phase(), Phase::Finished);
    }

    #[test]
    fn test_tick_ignored_while_paused() {
        let (mut tracker, _, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        tracker.set_running(false);
        assert_eq!(tracker.phase(), Phase::Paused);
        assert_eq!(tracker.tick(), None);
        assert_eq!(tracker.session().unwrap().time_remaining, 600);
    }

    #[test]
    fn test_update_without_session_is_noop() {
        let (mut tracker, storage, _) = tracker();
        assert_eq!(tracker.set_time_remaining(100), None);
        assert_eq!(tracker.tick(), None);
        tracker.set_form_field("input_0", "1");
        tracker.set_running(true);
        tracker.resume_exercise();
        assert!(tracker.session().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_explicit_interval_never_lowers() {
        let (mut tracker, _, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        tracker.set_time_remaining(350);
        assert_eq!(tracker.session().unwrap().current_interval, 2);

        tracker.update_exercise_state(SessionPatch {
            time_remaining: Some(340),
            current_interval: Some(0),
            ..Default::default()
        });
        let session = tracker.session().unwrap();
        assert_eq!(session.time_remaining, 340);
        assert_eq!(session.current_interval, 2);
    }

    #[test]
    fn test_form_edits_and_ticks_touch_disjoint_fields() {
        let (mut tracker, storage, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        tracker.set_form_field("input_0", "96");
        tracker.tick();
        tracker.set_form_field("observations", "short of breath");
        tracker.tick();

        let session = tracker.session().unwrap();
        assert_eq!(session.time_remaining, 598);
        assert_eq!(session.form_data.len(), 2);
        assert_eq!(stored(&storage).unwrap()["formData"]["input_0"], "96");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (mut tracker, storage, _) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        tracker.clear_exercise();
        assert!(storage.is_empty());
        tracker.clear_exercise();
        assert!(storage.is_empty());
        assert_eq!(tracker.phase(), Phase::Idle);
    }

    #[test]
    fn test_resume_recomputes_from_wall_clock() {
        let (mut tracker, _, clock) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        // Only five ticks delivered while 130.5s passed
        for _ in 0..5 {
            tracker.tick();
        }
        clock.advance_millis(130_500);
        tracker.resume_exercise();

        let session = tracker.session().unwrap();
        assert_eq!(session.time_remaining, 470);
        assert_eq!(session.start_time, T0 + 500);
        assert!(session.is_timer_running);
    }

    #[test]
    fn test_resume_after_full_duration_reaches_zero() {
        let (mut tracker, _, clock) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::B, 360);
        clock.advance_secs(1_000);
        tracker.resume_exercise();
        assert_eq!(tracker.session().unwrap().time_remaining, 0);
    }

    #[test]
    fn test_start_and_resume_share_baseline() {
        for kind in DataCollectionType::ALL {
            let (mut tracker, _, _) = tracker();
            tracker.start_exercise("ex", kind, kind.total_secs());
            let started = tracker.session().unwrap().time_remaining;
            tracker.resume_exercise();
            assert_eq!(tracker.session().unwrap().time_remaining, started);
            assert_eq!(started, kind.total_secs());
        }
    }

    #[test]
    fn test_paused_time_not_charged_on_resume() {
        let (mut tracker, _, clock) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        clock.advance_secs(60);
        tracker.resume_exercise();
        tracker.set_running(false);

        clock.advance_secs(300);
        tracker.set_running(true);
        clock.advance_secs(10);
        tracker.resume_exercise();

        assert_eq!(tracker.session().unwrap().time_remaining, 530);
    }

    #[test]
    fn test_pause_via_patch_matches_set_running() {
        let (mut tracker, _, clock) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        clock.advance_secs(60);
        tracker.resume_exercise();
        tracker.update_exercise_state(SessionPatch::running(false));
        assert_eq!(tracker.phase(), Phase::Paused);

        clock.advance_secs(300);
        tracker.update_exercise_state(SessionPatch::running(true));
        clock.advance_secs(10);
        tracker.resume_exercise();

        assert_eq!(tracker.session().unwrap().time_remaining, 530);
    }

    #[test]
    fn test_resume_for_view() {
        let (mut tracker, storage, _) = tracker();
        assert_eq!(tracker.resume_for_view("ex1"), ViewSession::Idle);

        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        assert_eq!(tracker.resume_for_view("ex1"), ViewSession::Resumed);
        assert_eq!(tracker.resume_for_view("ex2"), ViewSession::DiscardedStale);
        assert!(tracker.session().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_resume_for_view_before_restore() {
        let mut tracker = ExerciseTracker::with_clock(MemoryStorage::new(), ManualClock::new(T0));
        assert_eq!(tracker.resume_for_view("ex1"), ViewSession::NotRestored);
    }

    #[test]
    fn test_complete_returns_record_and_clears() {
        let (mut tracker, storage, clock) = tracker();
        tracker.start_exercise("ex1", DataCollectionType::A, 600);
        tracker.set_form_field("input_0", "97");
        tracker.set_time_remaining(0);
        clock.advance_secs(600);

        let completed = tracker.complete_exercise().unwrap();
        assert_eq!(completed.exercise_id, "ex1");
        assert_eq!(completed.duration_secs, 600);
        assert_eq!(completed.elapsed_secs, 600);
        assert_eq!(completed.completed_at, T0 + 600_000);
        assert_eq!(completed.form_data["input_0"], "97");
        assert!(tracker.session().is_none());
        assert!(storage.is_empty());
        assert!(tracker.complete_exercise().is_none());
    }

    #[test]
    fn test_mutations_before_restore_are_not_persisted() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(T0);
        storage
            .write(
                SESSION_STORAGE_KEY,
                &json!({
                    "exerciseId": "persisted",
                    "dataCollectionType": "C",
                    "isStarted": true,
                    "isTimerRunning": true,
                    "timeRemaining": 900,
                    "currentInterval": 0,
                    "startTime": T0 - 300_000,
                    "formData": {}
                })
                .to_string(),
            )
            .unwrap();

        let mut tracker = ExerciseTracker::with_clock(storage.clone(), clock);
        tracker.start_exercise("transient", DataCollectionType::A, 600);
        assert_eq!(stored(&storage).unwrap()["exerciseId"], "persisted");

        tracker.restore();
        assert_eq!(tracker.session().unwrap().exercise_id, "persisted");
    }

    #[test]
    fn test_restore_discards_expired_session() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(T0);
        {
            let mut tracker = ExerciseTracker::open_with_clock(storage.clone(), clock.clone());
            tracker.start_exercise("ex1", DataCollectionType::C, 1200);
        }
        clock.advance_millis(SESSION_EXPIRY_MS + 1);

        let tracker = ExerciseTracker::open_with_clock(storage.clone(), clock);
        assert!(tracker.is_restored());
        assert!(tracker.session().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_restore_keeps_recent_session() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(T0);
        {
            let mut tracker = ExerciseTracker::open_with_clock(storage.clone(), clock.clone());
            tracker.start_exercise("ex1", DataCollectionType::A, 600);
            tracker.set_form_field("input_0", "93");
        }
        clock.advance_secs(1);

        let tracker = ExerciseTracker::open_with_clock(storage, clock);
        let session = tracker.session().unwrap();
        assert_eq!(session.exercise_id, "ex1");
        assert_eq!(session.form_data["input_0"], "93");
    }

    #[test]
    fn test_restore_clears_corrupt_record() {
        let storage = MemoryStorage::new();
        storage.write(SESSION_STORAGE_KEY, "{not json").unwrap();

        let tracker = ExerciseTracker::open_with_clock(storage.clone(), ManualClock::new(T0));
        assert!(tracker.session().is_none());
        assert!(!storage.contains(SESSION_STORAGE_KEY));
    }

    #[test]
    fn test_restore_clears_invalid_record() {
        let storage = MemoryStorage::new();
        storage
            .write(
                SESSION_STORAGE_KEY,
                &json!({"exerciseId": "ex1", "dataCollectionType": "Z", "startTime": T0})
                    .to_string(),
            )
            .unwrap();

        let tracker = ExerciseTracker::open_with_clock(storage.clone(), ManualClock::new(T0));
        assert!(tracker.session().is_none());
        assert!(storage.is_empty());
    }
}
