//! Subcommand implementations.
//!
//! Each command takes the tracker and an output sink so tests can drive them
//! with in-memory storage and a manual clock.

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Local};
use rehab_core::{
    format_clock, needs_reconcile, AppConfig, Clock, Countdown, DataCollectionType,
    ExerciseSession, ExerciseTracker, Phase, RehabError, SessionStorage, ViewSession,
};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] RehabError),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No active exercise session")]
    NoSession,
}

pub type CliResult = Result<(), CliError>;

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Running => "running",
        Phase::Paused => "paused",
        Phase::Finished => "finished",
    }
}

fn format_start_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}

fn write_session(out: &mut dyn Write, session: &ExerciseSession, phase: Phase) -> CliResult {
    writeln!(
        out,
        "exercise: {} (type {})",
        session.exercise_id, session.data_collection_type
    )?;
    writeln!(out, "phase: {}", phase_label(phase))?;
    writeln!(
        out,
        "remaining: {} of {} (interval {})",
        format_clock(session.time_remaining),
        format_clock(session.total_secs()),
        session.current_interval
    )?;
    writeln!(out, "started: {}", format_start_time(session.start_time))?;
    for (key, value) in &session.form_data {
        writeln!(out, "  {key} = {value}")?;
    }
    Ok(())
}

pub fn start<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
    exercise_id: &str,
    kind: DataCollectionType,
) -> CliResult {
    tracker.start_exercise(exercise_id, kind, kind.total_secs());
    status(tracker, out, None, false)
}

pub fn status<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
    viewed_exercise: Option<&str>,
    json: bool,
) -> CliResult {
    if let Some(exercise_id) = viewed_exercise {
        let stale = tracker
            .session()
            .is_some_and(|session| session.exercise_id != exercise_id);
        if stale {
            tracker.clear_exercise();
            writeln!(out, "discarded session for another exercise")?;
        }
    }

    let Some(session) = tracker.session() else {
        if json {
            writeln!(out, "null")?;
        } else {
            writeln!(out, "no active exercise session")?;
        }
        return Ok(());
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(session)?)?;
    } else {
        write_session(out, session, tracker.phase())?;
    }
    Ok(())
}

pub fn resume<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
) -> CliResult {
    if tracker.session().is_none() {
        return Err(CliError::NoSession);
    }
    tracker.resume_exercise();
    status(tracker, out, None, false)
}

pub fn set_running<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
    running: bool,
) -> CliResult {
    if tracker.session().is_none() {
        return Err(CliError::NoSession);
    }
    tracker.set_running(running);
    writeln!(out, "phase: {}", phase_label(tracker.phase()))?;
    Ok(())
}

pub fn field<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
    key: &str,
    value: &str,
) -> CliResult {
    if tracker.session().is_none() {
        return Err(CliError::NoSession);
    }
    tracker.set_form_field(key, value);
    writeln!(out, "recorded {key}")?;
    Ok(())
}

pub fn tick<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
    count: u32,
) -> CliResult {
    if tracker.session().is_none() {
        return Err(CliError::NoSession);
    }
    for _ in 0..count {
        if let Some(reached) = tracker.tick() {
            writeln!(
                out,
                "interval {} reached at {}",
                reached.interval,
                format_clock(reached.time_remaining)
            )?;
        }
    }
    if let Some(session) = tracker.session() {
        writeln!(out, "remaining: {}", format_clock(session.time_remaining))?;
    }
    Ok(())
}

pub fn complete<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
) -> CliResult {
    let completed = tracker.complete_exercise().ok_or(CliError::NoSession)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&completed)?)?;
    Ok(())
}

pub fn clear<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
) -> CliResult {
    tracker.clear_exercise();
    writeln!(out, "cleared")?;
    Ok(())
}

/// Foreground driver: resume or start, count down, then tick once per second
/// until the session finishes, is paused elsewhere, or disappears.
///
/// `sleep` is called once per scheduled second; each tick schedules the next.
pub fn run<S: SessionStorage, C: Clock>(
    tracker: &mut ExerciseTracker<S, C>,
    out: &mut dyn Write,
    config: &AppConfig,
    exercise_id: &str,
    kind: DataCollectionType,
    sleep: &mut dyn FnMut(Duration),
) -> CliResult {
    let second = Duration::from_secs(1);

    match tracker.resume_for_view(exercise_id) {
        ViewSession::Resumed => {
            writeln!(out, "resuming {exercise_id}")?;
        }
        outcome => {
            if outcome == ViewSession::DiscardedStale {
                writeln!(out, "discarded session for another exercise")?;
            }
            for n in Countdown::new(config.countdown_secs) {
                writeln!(out, "{n}...")?;
                sleep(second);
            }
            tracker.start_exercise(exercise_id, kind, kind.total_secs());
            writeln!(out, "go!")?;
        }
    }

    let mut alert_ticks_left = 0;
    while tracker.phase() == Phase::Running {
        sleep(second);

        if let Some(reached) = tracker.tick() {
            info!(interval = reached.interval, "Interval alert");
            alert_ticks_left = config.alert_display_secs;
            writeln!(
                out,
                "interval {} reached: record your measurements",
                reached.interval
            )?;
        }

        let now = tracker.clock().now_millis();
        let drifted = tracker
            .session()
            .is_some_and(|session| needs_reconcile(session, now, config.drift_tolerance_secs));
        if drifted {
            warn!("Timer drifted from wall clock, reconciling");
            tracker.resume_exercise();
        }

        if let Some(session) = tracker.session() {
            let alert = if alert_ticks_left > 0 {
                alert_ticks_left -= 1;
                " [measure now]"
            } else {
                ""
            };
            writeln!(out, "{}{alert}", format_clock(session.time_remaining))?;
        }
    }

    match tracker.phase() {
        Phase::Finished => writeln!(
            out,
            "exercise finished: record measurements with `field`, then `complete`"
        )?,
        Phase::Paused => writeln!(out, "paused")?,
        Phase::Idle | Phase::Running => {}
    }
    Ok(())
}
