//! Local-first write API for visit logs, achievements, and device stats.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::db::{LocalRecordStore, LocalWrite};
use crate::error::{Error, Result};
use crate::models::{
    catalog, Achievement, AchievementId, DeviceStats, EntityType, MutationAction, MutationRecord,
    VisitLog, VisitLogId,
};
use crate::sync::SyncQueue;

/// Writes go to the local store and onto the sync queue in one batch.
///
/// Validation errors are returned before anything is stored or queued.
/// Storage errors propagate to the caller and leave nothing behind.
#[derive(Clone)]
pub struct TrackerService {
    store: LocalRecordStore,
    queue: SyncQueue,
}

impl TrackerService {
    pub fn new(store: LocalRecordStore) -> Self {
        Self {
            queue: SyncQueue::new(store.clone()),
            store,
        }
    }

    /// Open a tracker backed by the libSQL file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(LocalRecordStore::open(path).await?))
    }

    pub const fn store(&self) -> &LocalRecordStore {
        &self.store
    }

    pub const fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Record a new visit, bumping the local stats in the same write
    pub async fn log_visit(&self, log: VisitLog) -> Result<VisitLog> {
        log.validate()?;
        let id = log
            .id
            .ok_or_else(|| Error::Validation("new visit logs need a local id".to_string()))?;
        let record = MutationRecord::new(EntityType::VisitLog, MutationAction::Create, &log)?;

        let stored = log.clone();
        self.store
            .update_collection_and_enqueue(move |write: &mut LocalWrite<VisitLog>| {
                if write.items.iter().any(|existing| existing.id == Some(id)) {
                    return Err(Error::Validation(format!("visit log {id} already exists")));
                }
                write
                    .stats_mut()
                    .record_log(stored.flush_funds_earned, stored.logged_at);
                write.items.push(stored);
                write.enqueue(record);
                Ok(())
            })
            .await?;

        tracing::debug!(visit_log_id = %id, "Logged visit");
        Ok(log)
    }

    /// Replace an existing visit, stamping a fresh `updated_at`
    pub async fn update_visit(&self, mut log: VisitLog) -> Result<VisitLog> {
        let id = log
            .id
            .ok_or_else(|| Error::Validation("cannot update a visit log without an id".to_string()))?;
        log.validate()?;
        log.updated_at = Utc::now();
        let record = MutationRecord::new(EntityType::VisitLog, MutationAction::Update, &log)?;

        let stored = log.clone();
        self.store
            .update_collection_and_enqueue(move |write: &mut LocalWrite<VisitLog>| {
                let slot = write
                    .items
                    .iter_mut()
                    .find(|existing| existing.id == Some(id))
                    .ok_or_else(|| Error::NotFound(format!("visit log {id}")))?;
                *slot = stored;
                write.enqueue(record);
                Ok(())
            })
            .await?;

        tracing::debug!(visit_log_id = %id, "Updated visit");
        Ok(log)
    }

    /// Remove a visit, queueing its last snapshot for remote deletion
    pub async fn delete_visit(&self, id: VisitLogId) -> Result<VisitLog> {
        let removed = self
            .store
            .update_collection_and_enqueue(move |write: &mut LocalWrite<VisitLog>| {
                let index = write
                    .items
                    .iter()
                    .position(|existing| existing.id == Some(id))
                    .ok_or_else(|| Error::NotFound(format!("visit log {id}")))?;
                let removed = write.items.remove(index);
                write.enqueue(MutationRecord::new(
                    EntityType::VisitLog,
                    MutationAction::Delete,
                    &removed,
                )?);
                Ok(removed)
            })
            .await?;

        tracing::debug!(visit_log_id = %id, "Deleted visit");
        Ok(removed)
    }

    pub async fn get_visit(&self, id: VisitLogId) -> Result<Option<VisitLog>> {
        let logs: Vec<VisitLog> = self.store.load_collection().await?;
        Ok(logs.into_iter().find(|log| log.id == Some(id)))
    }

    /// Visits newest-first
    pub async fn list_visits(&self, limit: usize, offset: usize) -> Result<Vec<VisitLog>> {
        let logs: Vec<VisitLog> = self.store.load_collection().await?;
        Ok(logs.into_iter().skip(offset).take(limit).collect())
    }

    /// Visits logged in `[start, end)`, newest-first
    pub async fn visits_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<VisitLog>> {
        let logs: Vec<VisitLog> = self.store.load_collection().await?;
        Ok(logs
            .into_iter()
            .filter(|log| log.logged_at >= start && log.logged_at < end)
            .collect())
    }

    /// Unlock the catalog achievement `key`.
    ///
    /// Returns `None` when it was already unlocked; nothing is queued then.
    pub async fn unlock_achievement(&self, key: &str) -> Result<Option<Achievement>> {
        let achievement = Achievement::unlock(key)
            .ok_or_else(|| Error::Validation(format!("unknown achievement '{key}'")))?;
        let record =
            MutationRecord::new(EntityType::Achievement, MutationAction::Create, &achievement)?;

        let stored = achievement.clone();
        let inserted = self
            .store
            .update_collection_and_enqueue(move |write: &mut LocalWrite<Achievement>| {
                if write
                    .items
                    .iter()
                    .any(|existing| existing.achievement_key == stored.achievement_key)
                {
                    return Ok(false);
                }
                write.items.push(stored);
                write.enqueue(record);
                Ok(true)
            })
            .await?;

        if !inserted {
            tracing::debug!(achievement_key = key, "Achievement already unlocked");
            return Ok(None);
        }

        tracing::info!(achievement_key = key, "Unlocked achievement");
        Ok(Some(achievement))
    }

    /// Flag an achievement as seen. Already-viewed achievements are
    /// returned unchanged without queueing.
    pub async fn mark_achievement_viewed(&self, id: AchievementId) -> Result<Achievement> {
        self.store
            .update_collection_and_enqueue(move |write: &mut LocalWrite<Achievement>| {
                let existing = write
                    .items
                    .iter_mut()
                    .find(|existing| existing.id == id)
                    .ok_or_else(|| Error::NotFound(format!("achievement {id}")))?;
                if existing.is_viewed {
                    return Ok(existing.clone());
                }
                existing.is_viewed = true;
                let viewed = existing.clone();
                write.enqueue(MutationRecord::new(
                    EntityType::Achievement,
                    MutationAction::Update,
                    &viewed,
                )?);
                Ok(viewed)
            })
            .await
    }

    /// Unlocked achievements, most recent first
    pub async fn list_achievements(&self) -> Result<Vec<Achievement>> {
        self.store.load_collection().await
    }

    /// Catalog keys not yet unlocked on this device
    pub async fn locked_achievement_keys(&self) -> Result<Vec<&'static str>> {
        let unlocked = self.list_achievements().await?;
        Ok(catalog()
            .iter()
            .map(|entry| entry.key)
            .filter(|key| !unlocked.iter().any(|a| a.achievement_key == *key))
            .collect())
    }

    pub async fn device_stats(&self) -> Result<DeviceStats> {
        Ok(self.store.load_device_stats().await?.unwrap_or_default())
    }

    /// Credit (or debit, when negative) flush funds
    pub async fn add_flush_funds(&self, amount: i64) -> Result<DeviceStats> {
        self.store
            .update_device_stats_and_enqueue(MutationAction::Update, move |stats| {
                stats.total_flush_funds = stats.total_flush_funds.saturating_add(amount);
            })
            .await
    }

    pub async fn update_streak(&self, streak_count: u32) -> Result<DeviceStats> {
        self.store
            .update_device_stats_and_enqueue(MutationAction::Update, move |stats| {
                stats.streak_count = streak_count;
            })
            .await
    }

    pub async fn pending_mutations(&self) -> Result<Vec<MutationRecord>> {
        self.queue.snapshot().await
    }
}
