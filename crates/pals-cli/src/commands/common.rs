use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveTime, Utc};
use pals_core::config::SyncConfig;
use pals_core::db::LocalRecordStore;
use pals_core::models::AchievementId;
use pals_core::services::TrackerService;
use pals_core::sync::{DerivedDeviceIdentity, HttpRemoteService, SyncEngine};
use pals_core::{Achievement, MutationRecord, VisitLog, VisitLogId};
use serde::Serialize;

use crate::error::CliError;

const DEVICE_SEED_FILE: &str = "device-id";

#[derive(Debug, Serialize)]
pub struct VisitListItem {
    pub id: String,
    pub logged_at: DateTime<Utc>,
    pub relative_time: String,
    pub duration_seconds: u32,
    pub rating: String,
    pub consistency: u8,
    pub notes: Option<String>,
    pub flush_funds_earned: i64,
}

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub id: String,
    pub entity_type: String,
    pub action: String,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("PALS_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pals")
        .join("pals.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path.unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pals")
            .join("config.json")
    })
}

pub async fn open_tracker(db_path: &Path) -> Result<TrackerService, CliError> {
    Ok(TrackerService::open(db_path).await?)
}

/// Config file overlaid with `PALS_*` environment variables
pub fn load_sync_config(config_path: &Path) -> Result<SyncConfig, CliError> {
    let config = SyncConfig::load_from_path(config_path)?.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Stable per-install seed the device id is derived from, created on first use
pub fn load_or_create_device_seed(db_path: &Path) -> Result<String, CliError> {
    let seed_path = db_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DEVICE_SEED_FILE);

    if let Ok(existing) = std::fs::read_to_string(&seed_path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    if let Some(parent) = seed_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let seed = uuid::Uuid::new_v4().to_string();
    std::fs::write(&seed_path, &seed)?;
    tracing::debug!("Created device seed at {}", seed_path.display());
    Ok(seed)
}

pub async fn open_sync_engine(
    db_path: &Path,
    config: &SyncConfig,
) -> Result<Arc<SyncEngine>, CliError> {
    if !config.is_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let remote = HttpRemoteService::from_config(config)?;
    let identity = DerivedDeviceIdentity::new(load_or_create_device_seed(db_path)?);
    let store = LocalRecordStore::open(db_path).await?;
    let engine = SyncEngine::builder(store, Arc::new(remote), Arc::new(identity))
        .config(config)
        .build()
        .await?;
    Ok(Arc::new(engine))
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyIdentifier)
    } else {
        Ok(trimmed.to_ascii_lowercase())
    }
}

/// Pick the single item whose id starts with `query`
pub fn resolve_by_prefix<T>(
    items: Vec<T>,
    query: &str,
    id_of: impl Fn(&T) -> String,
) -> Result<Option<T>, CliError> {
    let mut matches: Vec<T> = items
        .into_iter()
        .filter(|item| id_of(item).starts_with(query))
        .collect();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|item| short_id(&id_of(item)))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub async fn resolve_visit(tracker: &TrackerService, query: &str) -> Result<VisitLog, CliError> {
    let query = normalize_identifier(query)?;
    if let Ok(id) = query.parse::<VisitLogId>() {
        if let Some(log) = tracker.get_visit(id).await? {
            return Ok(log);
        }
    }

    let logs = tracker.list_visits(usize::MAX, 0).await?;
    resolve_by_prefix(logs, &query, |log| {
        log.id.map(|id| id.to_string()).unwrap_or_default()
    })?
    .ok_or(CliError::VisitNotFound(query))
}

pub async fn resolve_achievement(
    tracker: &TrackerService,
    query: &str,
) -> Result<Achievement, CliError> {
    let query = normalize_identifier(query)?;
    let achievements = tracker.list_achievements().await?;
    if let Ok(id) = query.parse::<AchievementId>() {
        if let Some(found) = achievements.iter().find(|a| a.id == id) {
            return Ok(found.clone());
        }
    }

    resolve_by_prefix(achievements, &query, |achievement| achievement.id.to_string())?
        .ok_or(CliError::AchievementNotFound(query))
}

/// Start and end of the local calendar day containing `now`
pub fn today_bounds(now: DateTime<Local>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map_or_else(
            || now.with_timezone(&Utc) - Duration::hours(24),
            |midnight| midnight.with_timezone(&Utc),
        );
    (start, start + Duration::days(1))
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_duration(seconds: u32) -> String {
    format!("{}m {:02}s", seconds / 60, seconds % 60)
}

pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - then).num_seconds().max(0);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn visit_to_list_item(log: &VisitLog, now: DateTime<Utc>) -> VisitListItem {
    VisitListItem {
        id: log.id.map(|id| id.to_string()).unwrap_or_default(),
        logged_at: log.logged_at,
        relative_time: format_relative_time(log.logged_at, now),
        duration_seconds: log.duration_seconds,
        rating: log.rating.to_string(),
        consistency: log.consistency,
        notes: log.notes.clone(),
        flush_funds_earned: log.flush_funds_earned,
    }
}

pub fn format_visit_lines(logs: &[VisitLog], now: DateTime<Utc>) -> Vec<String> {
    logs.iter()
        .map(|log| {
            let id = short_id(&log.id.map(|id| id.to_string()).unwrap_or_default());
            let duration = format_duration(log.duration_seconds);
            let relative_time = format_relative_time(log.logged_at, now);
            let rating = log.rating.as_str();
            match log.notes.as_deref() {
                Some(notes) => format!(
                    "{id:<13}  {relative_time:<10}  {duration:>8}  {rating:<8}  c{}  {notes}",
                    log.consistency
                ),
                None => format!(
                    "{id:<13}  {relative_time:<10}  {duration:>8}  {rating:<8}  c{}",
                    log.consistency
                ),
            }
        })
        .collect()
}

pub fn format_achievement_lines(achievements: &[Achievement], now: DateTime<Utc>) -> Vec<String> {
    achievements
        .iter()
        .map(|achievement| {
            let id = short_id(&achievement.id.to_string());
            let marker = if achievement.is_viewed { " " } else { "*" };
            let relative_time = format_relative_time(achievement.unlocked_at, now);
            format!(
                "{id:<13} {marker} {:<18}  {:<20}  +{:<4}  {relative_time}",
                achievement.achievement_key, achievement.title, achievement.flush_funds_reward
            )
        })
        .collect()
}

pub fn queue_to_list_item(record: &MutationRecord) -> QueueListItem {
    QueueListItem {
        id: record.id.to_string(),
        entity_type: record.entity_type.to_string(),
        action: record.action.to_string(),
        retry_count: record.retry_count,
        enqueued_at: record.enqueued_at,
    }
}

pub fn format_queue_lines(records: &[MutationRecord], now: DateTime<Utc>) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let id = short_id(&record.id.to_string());
            let relative_time = format_relative_time(record.enqueued_at, now);
            format!(
                "{id:<13}  {:<13}  {:<7}  retries={}  {relative_time}",
                record.entity_type.as_str(),
                record.action.as_str(),
                record.retry_count
            )
        })
        .collect()
}
