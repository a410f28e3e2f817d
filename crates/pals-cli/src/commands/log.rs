use std::path::Path;

use chrono::{Local, Utc};
use pals_core::util::normalize_text_option;
use pals_core::{Rating, VisitLog};

use crate::commands::common::{
    format_visit_lines, open_tracker, resolve_visit, today_bounds, visit_to_list_item,
    VisitListItem,
};
use crate::error::CliError;

/// Field changes requested by `pals edit-log`
#[derive(Debug, Default)]
pub struct LogEdit {
    pub duration: Option<u32>,
    pub rating: Option<Rating>,
    pub consistency: Option<u8>,
    pub notes: Option<String>,
}

impl LogEdit {
    pub const fn is_empty(&self) -> bool {
        self.duration.is_none()
            && self.rating.is_none()
            && self.consistency.is_none()
            && self.notes.is_none()
    }

    pub fn apply(self, log: &mut VisitLog) {
        if let Some(duration) = self.duration {
            log.duration_seconds = duration;
        }
        if let Some(rating) = self.rating {
            log.rating = rating;
        }
        if let Some(consistency) = self.consistency {
            log.consistency = consistency;
        }
        if let Some(notes) = self.notes {
            log.notes = normalize_text_option(Some(notes));
        }
    }
}

pub async fn run_log(
    duration: u32,
    rating: Rating,
    consistency: u8,
    notes: Option<String>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let tracker = open_tracker(db_path).await?;
    let log = tracker
        .log_visit(VisitLog::new(duration, rating, consistency).with_notes(notes))
        .await?;

    if as_json {
        let item = visit_to_list_item(&log, Utc::now());
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else if let Some(id) = log.id {
        println!("{id}");
    }
    Ok(())
}

pub async fn run_logs(
    limit: usize,
    today: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let tracker = open_tracker(db_path).await?;
    let logs = if today {
        let (start, end) = today_bounds(Local::now());
        let mut logs = tracker.visits_between(start, end).await?;
        logs.truncate(limit);
        logs
    } else {
        tracker.list_visits(limit, 0).await?
    };

    let now = Utc::now();
    if as_json {
        let items = logs
            .iter()
            .map(|log| visit_to_list_item(log, now))
            .collect::<Vec<VisitListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if logs.is_empty() {
        println!("No visits logged yet.");
    } else {
        for line in format_visit_lines(&logs, now) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_edit_log(id: &str, edit: LogEdit, db_path: &Path) -> Result<(), CliError> {
    if edit.is_empty() {
        return Err(CliError::NothingToEdit);
    }

    let tracker = open_tracker(db_path).await?;
    let mut log = resolve_visit(&tracker, id).await?;
    edit.apply(&mut log);
    let updated = tracker.update_visit(log).await?;

    if let Some(id) = updated.id {
        println!("{id}");
    }
    Ok(())
}

pub async fn run_delete_log(id: &str, db_path: &Path) -> Result<(), CliError> {
    let tracker = open_tracker(db_path).await?;
    let log = resolve_visit(&tracker, id).await?;
    let Some(log_id) = log.id else {
        return Err(CliError::VisitNotFound(id.to_string()));
    };

    tracker.delete_visit(log_id).await?;
    println!("{log_id}");
    Ok(())
}
