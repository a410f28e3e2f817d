use std::path::Path;

use chrono::Utc;

use crate::commands::common::{
    format_queue_lines, open_tracker, queue_to_list_item, QueueListItem,
};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let tracker = open_tracker(db_path).await?;
    let pending = tracker.pending_mutations().await?;

    if as_json {
        let items = pending
            .iter()
            .map(queue_to_list_item)
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("Sync queue is empty.");
        return Ok(());
    }
    for line in format_queue_lines(&pending, Utc::now()) {
        println!("{line}");
    }
    Ok(())
}
