use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use gymbud_core::models::Resolution;

#[derive(Parser)]
#[command(name = "gymbud")]
#[command(about = "Browse and sync GymBud training history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional JSON config file (GYMBUD_* env vars take precedence)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Never contact the backend
    #[arg(long, global = true)]
    pub offline: bool,

    /// Write buffered telemetry as JSON to this path on exit
    #[arg(long, global = true, value_name = "PATH")]
    pub telemetry_out: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse past sessions
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Pull changes from the backend
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Inspect and resolve sync conflicts
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },
    /// Look up exercises on the backend
    Exercises {
        #[command(subcommand)]
        command: ExerciseCommands,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List sessions, newest first
    List {
        /// Only sessions with this status (pending, active, completed)
        #[arg(long)]
        status: Option<String>,
        /// Earliest date, inclusive (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<String>,
        /// Latest date, inclusive (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<String>,
        /// Substring of the session date
        #[arg(short, long)]
        query: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one session with per-exercise volume
    Show {
        session_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Pull and merge changes since the last cursor
    Pull,
    /// Merge a pull snapshot from a JSON file
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ConflictCommands {
    /// List unresolved conflicts, most recent first
    List {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every recorded conflict without resolving it
    Clear,
    /// Settle a conflict
    Resolve {
        /// Conflict id, e.g. `logged_sets:<id>`
        id: String,
        /// Which copy wins
        #[arg(long, value_enum)]
        keep: KeepSide,
    },
}

#[derive(Subcommand)]
pub enum ExerciseCommands {
    /// Search the exercise catalogue
    Search {
        query: String,
        /// Number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KeepSide {
    Local,
    Server,
}

impl From<KeepSide> for Resolution {
    fn from(side: KeepSide) -> Self {
        match side {
            KeepSide::Local => Self::KeepLocal,
            KeepSide::Server => Self::TakeServer,
        }
    }
}
