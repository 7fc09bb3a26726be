//! Helpers for drivers of the tracker's tick loop.
//!
//! The tracker itself has no timer. A driver (the CLI, a UI) schedules one
//! tick per second, shows a short countdown before starting, and compares
//! the ticked countdown with the wall clock to decide when to call
//! `resume_exercise`.

use crate::session::ExerciseSession;

/// Renders seconds as `MM:SS`.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// The pre-start countdown: yields `from`, `from - 1`, ..., `1`.
#[derive(Debug, Clone)]
pub struct Countdown {
    next: u32,
}

impl Countdown {
    pub fn new(from: u32) -> Self {
        Self { next: from }
    }
}

impl Iterator for Countdown {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == 0 {
            return None;
        }
        let current = self.next;
        self.next -= 1;
        Some(current)
    }
}

/// Seconds the ticked countdown lags behind wall-clock time.
///
/// Positive when ticks were lost (suspended process, throttled loop).
/// Meaningless for a paused session, which returns 0.
pub fn drift_secs(session: &ExerciseSession, now_millis: i64) -> i64 {
    if !session.is_timer_running {
        return 0;
    }
    let wall_elapsed = now_millis.saturating_sub(session.start_time).max(0) / 1000;
    let wall_elapsed = wall_elapsed.min(i64::from(session.total_secs()));
    wall_elapsed - i64::from(session.elapsed_secs())
}

/// True once drift in either direction exceeds `tolerance_secs`.
pub fn needs_reconcile(session: &ExerciseSession, now_millis: i64, tolerance_secs: u32) -> bool {
    drift_secs(session, now_millis).unsigned_abs() > u64::from(tolerance_secs)
}
