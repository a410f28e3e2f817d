//! pals - command-line client for the PoopyPals offline-first sync core
//!
//! Every write lands locally first and is queued for upload; `pals sync`
//! pushes the queue to the remote and pulls remote changes back.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SyncAction};
use crate::commands::achievements::{run_achievements, run_unlock, run_view_achievement};
use crate::commands::common::{resolve_config_path, resolve_db_path};
use crate::commands::log::{run_delete_log, run_edit_log, run_log, run_logs, LogEdit};
use crate::commands::queue::run_queue;
use crate::commands::stats::run_stats;
use crate::commands::sync::{run_status, run_sync, run_sync_watch};
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

    let directive: Directive = "pals=info"
        .parse()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Some(Commands::Log {
            duration,
            rating,
            consistency,
            notes,
            json,
        }) => run_log(duration, rating.into(), consistency, notes, json, &db_path).await?,
        Some(Commands::Logs { limit, today, json }) => {
            run_logs(limit, today, json, &db_path).await?;
        }
        Some(Commands::EditLog {
            id,
            duration,
            rating,
            consistency,
            notes,
        }) => {
            let edit = LogEdit {
                duration,
                rating: rating.map(Into::into),
                consistency,
                notes,
            };
            run_edit_log(&id, edit, &db_path).await?;
        }
        Some(Commands::DeleteLog { id }) => run_delete_log(&id, &db_path).await?,
        Some(Commands::Achievements { locked, json }) => {
            run_achievements(locked, json, &db_path).await?;
        }
        Some(Commands::Unlock { key }) => run_unlock(&key, &db_path).await?,
        Some(Commands::ViewAchievement { id }) => run_view_achievement(&id, &db_path).await?,
        Some(Commands::Stats { json }) => run_stats(json, &db_path).await?,
        Some(Commands::Queue { json }) => run_queue(json, &db_path).await?,
        Some(Commands::Sync { action: None }) => run_sync(&db_path, &config_path).await?,
        Some(Commands::Sync {
            action: Some(SyncAction::Watch { interval }),
        }) => run_sync_watch(interval, &db_path, &config_path).await?,
        Some(Commands::Status { json }) => run_status(json, &db_path, &config_path).await?,
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
