//! rehab-session: CLI driver for pulmorehab exercise sessions.
//!
//! Keeps one timed exercise in `<root>/storage/currentExercise.json` and
//! plays the role of the exercise screen: it counts down, ticks once per
//! second, announces measurement intervals and hands the collected data to
//! whatever persists completions (stdout, as JSON).
//!
//! ## Subcommands
//!
//! - `start`, `run`: begin an exercise (`run` stays in the foreground and ticks)
//! - `status`, `resume`, `pause`, `unpause`, `tick`, `field`: inspect or drive a session
//! - `complete`, `clear`: finish or discard it

mod commands;
mod logging;

use std::io;
use std::path::PathBuf;
use std::thread;

use clap::{Parser, Subcommand};
use rehab_core::{
    load_app_config, DataCollectionType, ExerciseTracker, FileStorage, RehabError, StorageConfig,
};

use commands::CliResult;

#[derive(Parser)]
#[command(name = "rehab-session")]
#[command(about = "Pulmonary rehab exercise session tracker")]
#[command(version)]
struct Cli {
    /// Data directory (default: $PULMOREHAB_HOME or ~/.pulmorehab)
    #[arg(long, global = true, value_name = "PATH")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new session, replacing any existing one
    Start {
        #[arg(long, value_name = "ID")]
        exercise: String,

        /// Data collection type (A, B or C)
        #[arg(long = "type", value_name = "TYPE", value_parser = parse_collection_type)]
        kind: DataCollectionType,
    },

    /// Show the current session
    Status {
        /// Exercise being viewed; a session for any other exercise is discarded
        #[arg(long, value_name = "ID")]
        exercise: Option<String>,

        /// Print the session record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recompute the remaining time from the wall clock and keep running
    Resume,

    /// Pause the countdown
    Pause,

    /// Continue a paused countdown
    Unpause,

    /// Record a measurement or note
    Field {
        #[arg(value_name = "KEY")]
        key: String,

        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// Advance the countdown manually
    Tick {
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Resume or start an exercise and tick in the foreground until it ends
    Run {
        #[arg(long, value_name = "ID")]
        exercise: String,

        #[arg(long = "type", value_name = "TYPE", value_parser = parse_collection_type)]
        kind: DataCollectionType,
    },

    /// Print the completion record as JSON and clear the session
    Complete,

    /// Discard the current session
    Clear,
}

fn parse_collection_type(value: &str) -> Result<DataCollectionType, String> {
    value
        .to_ascii_uppercase()
        .parse()
        .map_err(|err: rehab_core::ParseCollectionTypeError| err.to_string())
}

fn resolve_storage(root: Option<PathBuf>) -> Result<StorageConfig, RehabError> {
    match root {
        Some(root) => Ok(StorageConfig::with_root(root)),
        None => StorageConfig::resolve(),
    }
}

fn execute(command: Commands, storage: &StorageConfig) -> CliResult {
    let mut tracker = ExerciseTracker::open(FileStorage::new(storage.session_dir()));
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Start { exercise, kind } => {
            commands::start(&mut tracker, &mut out, &exercise, kind)
        }
        Commands::Status { exercise, json } => {
            commands::status(&mut tracker, &mut out, exercise.as_deref(), json)
        }
        Commands::Resume => commands::resume(&mut tracker, &mut out),
        Commands::Pause => commands::set_running(&mut tracker, &mut out, false),
        Commands::Unpause => commands::set_running(&mut tracker, &mut out, true),
        Commands::Field { key, value } => commands::field(&mut tracker, &mut out, &key, &value),
        Commands::Tick { count } => commands::tick(&mut tracker, &mut out, count),
        Commands::Run { exercise, kind } => {
            let config = load_app_config(storage);
            commands::run(
                &mut tracker,
                &mut out,
                &config,
                &exercise,
                kind,
                &mut thread::sleep,
            )
        }
        Commands::Complete => commands::complete(&mut tracker, &mut out),
        Commands::Clear => commands::clear(&mut tracker, &mut out),
    }
}

fn main() {
    let cli = Cli::parse();
    let storage = resolve_storage(cli.root);
    let _logging_guard = logging::init(storage.as_ref().ok().map(|s| s.logs_dir()).as_deref());

    let storage = match storage {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!(error = %e, "Failed to resolve data directory");
            eprintln!("rehab-session: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = execute(cli.command, &storage) {
        tracing::error!(error = %e, "rehab-session failed");
        eprintln!("rehab-session: {e}");
        std::process::exit(1);
    }
}
