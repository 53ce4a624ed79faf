//! GymBud CLI - training history from the terminal
//!
//! Reads the local store first and syncs with the backend in the
//! background when configured.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{
    Cli, Commands, ConflictCommands, ExerciseCommands, HistoryCommands, SyncCommands,
};
use crate::commands::common::{write_telemetry, AppContext};
use crate::commands::conflicts::{
    run_conflicts_clear, run_conflicts_list, run_conflicts_resolve,
};
use crate::commands::exercises::run_exercise_search;
use crate::commands::history::{run_history_list, run_history_show, HistoryListArgs};
use crate::commands::sync::{run_sync_import, run_sync_pull};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gymbud=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = AppContext::open(cli.db_path.clone(), cli.config.as_deref(), cli.offline).await?;

    let outcome = dispatch(cli.command, &app).await;

    if let Some(path) = cli.telemetry_out.as_deref() {
        write_telemetry(&app, path)?;
    }
    outcome
}

async fn dispatch(command: Commands, app: &AppContext) -> Result<(), CliError> {
    match command {
        Commands::History { command } => match command {
            HistoryCommands::List {
                status,
                from,
                to,
                query,
                json,
            } => {
                run_history_list(
                    app,
                    &HistoryListArgs {
                        status,
                        from,
                        to,
                        query,
                    },
                    json,
                )
                .await
            }
            HistoryCommands::Show { session_id, json } => {
                run_history_show(app, &session_id, json).await
            }
        },
        Commands::Sync { command } => match command {
            SyncCommands::Pull => run_sync_pull(app).await,
            SyncCommands::Import { file } => run_sync_import(app, &file).await,
        },
        Commands::Conflicts { command } => match command {
            ConflictCommands::List { limit, json } => run_conflicts_list(app, limit, json).await,
            ConflictCommands::Clear => run_conflicts_clear(app).await,
            ConflictCommands::Resolve { id, keep } => run_conflicts_resolve(app, &id, keep).await,
        },
        Commands::Exercises { command } => match command {
            ExerciseCommands::Search { query, limit, json } => {
                run_exercise_search(app, &query, limit, json).await
            }
        },
    }
}
