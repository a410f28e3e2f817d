use std::path::Path;

use crate::commands::common::{format_timestamp, open_tracker};
use crate::error::CliError;

pub async fn run_stats(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let tracker = open_tracker(db_path).await?;
    let stats = tracker.device_stats().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Streak:       {} day(s)", stats.streak_count);
    println!("Flush funds:  {}", stats.total_flush_funds);
    println!("Total logs:   {}", stats.total_logs);
    println!(
        "Last log:     {}",
        stats
            .last_log_date
            .map_or_else(|| "never".to_string(), format_timestamp)
    );
    Ok(())
}
