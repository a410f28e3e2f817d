use std::path::Path;

use chrono::Utc;

use crate::commands::common::{format_achievement_lines, open_tracker, resolve_achievement};
use crate::error::CliError;

pub async fn run_achievements(
    include_locked: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let tracker = open_tracker(db_path).await?;
    let achievements = tracker.list_achievements().await?;
    let locked = if include_locked {
        tracker.locked_achievement_keys().await?
    } else {
        Vec::new()
    };

    if as_json {
        let payload = serde_json::json!({
            "unlocked": achievements,
            "locked": locked,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if achievements.is_empty() {
        println!("No achievements unlocked yet.");
    }
    for line in format_achievement_lines(&achievements, Utc::now()) {
        println!("{line}");
    }
    if !locked.is_empty() {
        println!();
        println!("Locked: {}", locked.join(", "));
    }
    Ok(())
}

pub async fn run_unlock(key: &str, db_path: &Path) -> Result<(), CliError> {
    let tracker = open_tracker(db_path).await?;
    match tracker.unlock_achievement(key.trim()).await? {
        Some(achievement) => println!(
            "Unlocked {} (+{} flush funds)",
            achievement.title, achievement.flush_funds_reward
        ),
        None => println!("Already unlocked: {}", key.trim()),
    }
    Ok(())
}

pub async fn run_view_achievement(id: &str, db_path: &Path) -> Result<(), CliError> {
    let tracker = open_tracker(db_path).await?;
    let achievement = resolve_achievement(&tracker, id).await?;
    let viewed = tracker.mark_achievement_viewed(achievement.id).await?;

    println!("{}: {}", viewed.title, viewed.description);
    Ok(())
}
