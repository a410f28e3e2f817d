use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pals_core::sync::{SyncOutcome, SyncReport};
use serde::Serialize;

use crate::commands::common::{
    format_timestamp, load_sync_config, open_sync_engine, open_tracker,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub remote_configured: bool,
    pub remote_url: Option<String>,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub pending_mutations: usize,
    pub sync_interval_secs: u64,
}

pub async fn run_sync(db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let config = load_sync_config(config_path)?;
    let engine = open_sync_engine(db_path, &config).await?;

    match engine.sync_now().await {
        SyncOutcome::Skipped => println!("Sync already in progress"),
        SyncOutcome::Completed(report) => {
            let pending = engine.queue().len().await?;
            println!("{}", describe_report(&report, pending));
        }
    }
    Ok(())
}

pub async fn run_sync_watch(
    interval_secs: Option<u64>,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let config = load_sync_config(config_path)?;
    let interval = interval_secs.map_or_else(|| config.sync_interval(), Duration::from_secs);
    if interval.is_zero() {
        return Err(CliError::Config(
            "sync interval must be greater than zero".to_string(),
        ));
    }

    let engine = open_sync_engine(db_path, &config).await?;
    let background = engine.start_background(interval);
    println!(
        "Syncing every {}s. Press Ctrl-C to stop.",
        interval.as_secs()
    );

    tokio::signal::ctrl_c().await?;
    println!("Stopping after the current cycle...");
    background.shutdown().await;
    Ok(())
}

pub async fn run_status(as_json: bool, db_path: &Path, config_path: &Path) -> Result<(), CliError> {
    let config = load_sync_config(config_path)?;
    let tracker = open_tracker(db_path).await?;
    let status = StatusItem {
        remote_configured: config.is_configured(),
        remote_url: config.remote_url.clone(),
        last_sync_date: tracker.store().load_last_sync_date().await?,
        pending_mutations: tracker.queue().len().await?,
        sync_interval_secs: config.sync_interval_secs,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "Remote:     {}",
        status.remote_url.as_deref().unwrap_or("not configured")
    );
    println!(
        "Last sync:  {}",
        status
            .last_sync_date
            .map_or_else(|| "never".to_string(), format_timestamp)
    );
    println!("Pending:    {}", status.pending_mutations);
    println!("Interval:   {}s", status.sync_interval_secs);
    Ok(())
}

pub fn describe_report(report: &SyncReport, pending: usize) -> String {
    if report.offline {
        return format!("Remote unreachable; {pending} change(s) still queued");
    }

    let mut summary = format!(
        "Uploaded {}, downloaded {}, {} still queued",
        report.uploaded, report.downloaded, pending
    );
    if report.evicted > 0 {
        summary.push_str(&format!(", {} dropped after repeated failures", report.evicted));
    }
    if !report.download_completed {
        summary.push_str("; download failed, will retry next sync");
    }
    summary
}
