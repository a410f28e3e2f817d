//! Single-flight sync cycle: upload queued mutations, download remote
//! changes, merge, then advance the last sync date.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::clock::{Clock, SystemClock};
use super::identity::DeviceIdentity;
use super::queue::{CommitSummary, SyncQueue, UploadOutcome};
use super::remote::{FetchFilter, RemoteError, RemoteService};
use super::resolver::merge_collections;
use super::retry::RetryPolicy;
use crate::config::SyncConfig;
use crate::db::LocalRecordStore;
use crate::error::Result;
use crate::models::{
    Achievement, DeviceId, DeviceStats, EntityType, MutationAction, MutationRecord,
    PlatformMetadata, VisitLog,
};
use crate::state::SyncState;

const DEFAULT_RETRY_CEILING: u32 = 3;

/// Result of a [`SyncEngine::sync_now`] trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another cycle was already running; nothing was done
    Skipped,
    Completed(SyncReport),
}

/// What one sync cycle accomplished
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Remote was unreachable; the queue was not touched
    pub offline: bool,
    pub uploaded: usize,
    pub retained: usize,
    pub evicted: usize,
    pub downloaded: usize,
    pub download_completed: bool,
    /// Set when this cycle advanced the last sync date
    pub last_sync_date: Option<DateTime<Utc>>,
}

enum UploadFailure {
    Payload(serde_json::Error),
    Remote(RemoteError),
}

impl From<RemoteError> for UploadFailure {
    fn from(error: RemoteError) -> Self {
        Self::Remote(error)
    }
}

/// Clears the in-flight flag on every exit path of a cycle
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngineBuilder {
    store: LocalRecordStore,
    remote: Arc<dyn RemoteService>,
    identity: Arc<dyn DeviceIdentity>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
    retry_ceiling: u32,
    platform: PlatformMetadata,
}

impl SyncEngineBuilder {
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Failed uploads are evicted once their retry count reaches `ceiling`
    #[must_use]
    pub fn retry_ceiling(mut self, ceiling: u32) -> Self {
        self.retry_ceiling = ceiling.max(1);
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: PlatformMetadata) -> Self {
        self.platform = platform;
        self
    }

    /// Apply the retry settings from `config`
    #[must_use]
    pub fn config(self, config: &SyncConfig) -> Self {
        self.retry_policy(config.retry_policy())
            .retry_ceiling(config.retry_ceiling)
    }

    /// Restore the persisted last sync date and build the engine
    pub async fn build(self) -> Result<SyncEngine> {
        let last_sync_date = self.store.load_last_sync_date().await?;
        Ok(SyncEngine {
            queue: SyncQueue::new(self.store.clone()),
            store: self.store,
            remote: self.remote,
            identity: self.identity,
            clock: self.clock,
            retry_policy: self.retry_policy,
            retry_ceiling: self.retry_ceiling,
            platform: self.platform,
            in_flight: AtomicBool::new(false),
            registered: AtomicBool::new(false),
            last_sync_date: RwLock::new(last_sync_date),
        })
    }
}

/// Coordinates the local store, sync queue, and remote service.
///
/// At most one cycle runs at a time; a trigger that arrives while a cycle is
/// in flight returns [`SyncOutcome::Skipped`]. Remote failures never escape
/// a cycle: they are logged and the affected mutations stay queued.
pub struct SyncEngine {
    store: LocalRecordStore,
    queue: SyncQueue,
    remote: Arc<dyn RemoteService>,
    identity: Arc<dyn DeviceIdentity>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
    retry_ceiling: u32,
    platform: PlatformMetadata,
    in_flight: AtomicBool,
    registered: AtomicBool,
    last_sync_date: RwLock<Option<DateTime<Utc>>>,
}

impl SyncEngine {
    pub fn builder(
        store: LocalRecordStore,
        remote: Arc<dyn RemoteService>,
        identity: Arc<dyn DeviceIdentity>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            store,
            remote,
            identity,
            clock: Arc::new(SystemClock),
            retry_policy: RetryPolicy::default(),
            retry_ceiling: DEFAULT_RETRY_CEILING,
            platform: PlatformMetadata::current(),
        }
    }

    pub const fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn last_sync_date(&self) -> Option<DateTime<Utc>> {
        *self
            .last_sync_date
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SyncState {
        SyncState {
            last_sync_date: self.last_sync_date(),
            is_syncing: self.is_syncing(),
        }
    }

    /// Run one sync cycle unless one is already running
    pub async fn sync_now(&self) -> SyncOutcome {
        let Some(_flight) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Sync already in progress; ignoring trigger");
            return SyncOutcome::Skipped;
        };

        tracing::info!("Sync cycle started");
        let report = self.run_cycle().await;
        tracing::info!(
            offline = report.offline,
            uploaded = report.uploaded,
            retained = report.retained,
            evicted = report.evicted,
            downloaded = report.downloaded,
            download_completed = report.download_completed,
            "Sync cycle finished"
        );
        SyncOutcome::Completed(report)
    }

    async fn run_cycle(&self) -> SyncReport {
        let mut report = SyncReport::default();

        if !self.remote.check_connectivity().await {
            tracing::warn!("Remote unreachable; skipping sync cycle");
            report.offline = true;
            return report;
        }

        let device_id = match self.identity.device_id() {
            Ok(device_id) => device_id,
            Err(error) => {
                tracing::error!("Cannot resolve device identity: {}", error);
                return report;
            }
        };
        self.ensure_registered(device_id).await;

        match self.upload_local_changes(device_id).await {
            Ok(summary) => {
                report.uploaded = summary.uploaded;
                report.retained = summary.retained;
                report.evicted = summary.evicted.len();
            }
            Err(error) => tracing::error!("Upload phase failed: {}", error),
        }

        match self.download_remote_changes(device_id).await {
            Ok(downloaded) => {
                report.downloaded = downloaded;
                report.download_completed = true;
            }
            Err(error) => tracing::error!("Download phase failed: {}", error),
        }

        if report.download_completed {
            let now = self.clock.now();
            match self.store.save_last_sync_date(now).await {
                Ok(()) => {
                    *self
                        .last_sync_date
                        .write()
                        .unwrap_or_else(PoisonError::into_inner) = Some(now);
                    report.last_sync_date = Some(now);
                }
                Err(error) => tracing::error!("Failed to persist last sync date: {}", error),
            }
        }

        report
    }

    async fn ensure_registered(&self, device_id: DeviceId) {
        if self.registered.load(Ordering::Acquire) {
            return;
        }
        match self.remote.register_device(device_id, &self.platform).await {
            Ok(remote_id) => {
                if remote_id != device_id {
                    tracing::warn!(%device_id, %remote_id, "Remote registered device under a different id");
                }
                self.registered.store(true, Ordering::Release);
                tracing::debug!(%device_id, "Device registered");
            }
            Err(error) => tracing::warn!("Device registration failed: {}", error),
        }
    }

    async fn upload_local_changes(&self, device_id: DeviceId) -> Result<CommitSummary> {
        let pending = self.queue.snapshot().await?;
        if pending.is_empty() {
            return Ok(CommitSummary::default());
        }
        tracing::debug!(count = pending.len(), "Uploading queued mutations");

        let mut outcomes = Vec::with_capacity(pending.len());
        for record in &pending {
            let outcome = match self.upload_record(device_id, record).await {
                Ok(()) => UploadOutcome::Uploaded(record.id),
                Err(UploadFailure::Payload(error)) => {
                    tracing::error!(
                        mutation_id = %record.id,
                        entity_type = %record.entity_type,
                        action = %record.action,
                        "Dropping mutation with undecodable payload: {}",
                        error
                    );
                    UploadOutcome::Rejected(record.id)
                }
                Err(UploadFailure::Remote(error)) => {
                    tracing::warn!(
                        mutation_id = %record.id,
                        entity_type = %record.entity_type,
                        action = %record.action,
                        "Upload failed after retries: {}",
                        error
                    );
                    UploadOutcome::Failed(record.id)
                }
            };
            outcomes.push(outcome);
        }

        let summary = self
            .queue
            .commit_upload(&outcomes, self.retry_ceiling)
            .await?;
        for evicted in &summary.evicted {
            tracing::warn!(
                mutation_id = %evicted.id,
                entity_type = %evicted.entity_type,
                action = %evicted.action,
                retry_count = evicted.retry_count,
                "Evicted mutation from sync queue; change will not reach the remote"
            );
        }
        Ok(summary)
    }

    async fn upload_record(
        &self,
        device_id: DeviceId,
        record: &MutationRecord,
    ) -> std::result::Result<(), UploadFailure> {
        let remote = self.remote.as_ref();
        let policy = self.retry_policy;

        match record.entity_type {
            EntityType::VisitLog => {
                let log: VisitLog = record.decode_payload().map_err(UploadFailure::Payload)?;
                match record.action {
                    MutationAction::Create => {
                        policy
                            .run(|| remote.create_visit_log(device_id, &log))
                            .await?;
                    }
                    MutationAction::Update => {
                        policy
                            .run(|| remote.update_visit_log(device_id, &log))
                            .await?;
                    }
                    MutationAction::Delete => match log.id {
                        Some(id) => policy.run(|| remote.delete_visit_log(device_id, id)).await?,
                        None => tracing::debug!("Deleted visit log never had an id; nothing to delete remotely"),
                    },
                }
            }
            EntityType::Achievement => {
                let achievement: Achievement =
                    record.decode_payload().map_err(UploadFailure::Payload)?;
                match record.action {
                    MutationAction::Create => {
                        policy
                            .run(|| remote.create_achievement(device_id, &achievement))
                            .await?;
                    }
                    MutationAction::Update => {
                        policy
                            .run(|| remote.update_achievement(device_id, &achievement))
                            .await?;
                    }
                    MutationAction::Delete => {
                        policy
                            .run(|| remote.delete_achievement(device_id, achievement.id))
                            .await?;
                    }
                }
            }
            EntityType::DeviceStats => {
                let stats: DeviceStats =
                    record.decode_payload().map_err(UploadFailure::Payload)?;
                match record.action {
                    MutationAction::Create | MutationAction::Update => {
                        policy
                            .run(|| remote.upsert_device_stats(device_id, &stats))
                            .await?;
                    }
                    MutationAction::Delete => {
                        tracing::debug!("Device stats are never deleted remotely; skipping");
                    }
                }
            }
        }
        Ok(())
    }

    async fn download_remote_changes(&self, device_id: DeviceId) -> Result<usize> {
        let since = self.last_sync_date();

        let remote_logs: Vec<VisitLog> = self
            .remote
            .fetch_visit_logs(device_id, &FetchFilter::updated_since(since))
            .await?
            .into_iter()
            .filter(|log| since.is_none_or(|since| log.updated_at > since))
            .collect();
        let mut downloaded = remote_logs.len();
        self.store
            .update_collection(move |local: &mut Vec<VisitLog>| {
                *local = merge_collections(std::mem::take(local), remote_logs);
                Ok(())
            })
            .await?;

        let remote_achievements = self
            .remote
            .fetch_achievements(device_id, &FetchFilter::default())
            .await?;
        downloaded += remote_achievements.len();
        self.store
            .update_collection(move |local: &mut Vec<Achievement>| {
                *local = merge_collections(std::mem::take(local), remote_achievements);
                Ok(())
            })
            .await?;

        if let Some(stats) = self.remote.fetch_device_stats(device_id).await? {
            self.store.save_device_stats(&stats).await?;
            downloaded += 1;
        }

        tracing::debug!(downloaded, "Downloaded remote changes");
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::Rating;
    use crate::sync::identity::StaticDeviceIdentity;
    use crate::sync::test_support::{Gate, ManualClock, StubRemote};

    async fn engine_for(
        remote: &Arc<StubRemote>,
        store: LocalRecordStore,
    ) -> (SyncEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let engine = SyncEngine::builder(
            store,
            Arc::clone(remote) as Arc<dyn RemoteService>,
            Arc::new(StaticDeviceIdentity::new(DeviceId::new())),
        )
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build()
        .await
        .unwrap();
        (engine, clock)
    }

    fn completed(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Completed(report) => report,
            SyncOutcome::Skipped => panic!("expected a completed cycle"),
        }
    }

    async fn enqueue<T: Serialize>(
        engine: &SyncEngine,
        entity_type: EntityType,
        action: MutationAction,
        entity: &T,
    ) -> MutationRecord {
        let record = MutationRecord::new(entity_type, action, entity).unwrap();
        engine.queue().enqueue(record.clone()).await.unwrap();
        record
    }

    #[tokio::test(start_paused = true)]
    async fn successful_cycle_drains_queue_and_advances_last_sync_date() {
        let remote = Arc::new(StubRemote::new());
        let (engine, clock) = engine_for(&remote, LocalRecordStore::in_memory()).await;
        let log = VisitLog::new(180, Rating::Great, 4);
        enqueue(&engine, EntityType::VisitLog, MutationAction::Create, &log).await;

        let report = completed(engine.sync_now().await);

        assert_eq!(report.uploaded, 1);
        assert!(report.download_completed);
        assert!(engine.queue().is_empty().await.unwrap());
        assert_eq!(engine.last_sync_date(), Some(clock.now()));
        assert_eq!(remote.calls_to("create_visit_log"), 1);
        assert_eq!(remote.visit_logs(), vec![log]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_upload_is_evicted_after_three_cycles() {
        let remote = Arc::new(StubRemote::new().failing_uploads());
        let (engine, _clock) = engine_for(&remote, LocalRecordStore::in_memory()).await;
        let log = VisitLog::new(180, Rating::Great, 4);
        enqueue(&engine, EntityType::VisitLog, MutationAction::Create, &log).await;

        for expected_retry_count in 1..=2 {
            let report = completed(engine.sync_now().await);
            assert_eq!(report.retained, 1);
            let queue = engine.queue().snapshot().await.unwrap();
            assert_eq!(queue.len(), 1);
            assert_eq!(queue[0].retry_count, expected_retry_count);
        }

        let report = completed(engine.sync_now().await);

        assert_eq!(report.evicted, 1);
        assert!(engine.queue().is_empty().await.unwrap());
        // Three attempts per cycle, three cycles.
        assert_eq!(remote.calls_to("create_visit_log"), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_remote_achievement_replaces_local_copy() {
        let remote = Arc::new(StubRemote::new());
        let store = LocalRecordStore::in_memory();
        let local = Achievement::unlock("streak_7").unwrap();
        let mut newer = local.clone();
        newer.unlocked_at = local.unlocked_at + Duration::minutes(5);
        newer.is_viewed = true;
        store.save_collection(vec![local]).await.unwrap();
        remote.set_achievements(vec![newer.clone()]);
        let (engine, _clock) = engine_for(&remote, store.clone()).await;

        completed(engine.sync_now().await);

        let achievements: Vec<Achievement> = store.load_collection().await.unwrap();
        assert_eq!(achievements, vec![newer]);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_during_cycle_is_skipped() {
        let gate = Arc::new(Gate::default());
        let remote = Arc::new(StubRemote::new().with_gate(Arc::clone(&gate)));
        let (engine, _clock) = engine_for(&remote, LocalRecordStore::in_memory()).await;
        let engine = Arc::new(engine);

        let first = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.sync_now().await }
        });
        gate.wait_entered().await;

        assert!(engine.is_syncing());
        assert_eq!(engine.sync_now().await, SyncOutcome::Skipped);

        gate.release();
        completed(first.await.unwrap());

        assert!(!engine.is_syncing());
        assert_eq!(remote.calls_to("check_connectivity"), 1);
        assert_eq!(remote.calls_to("fetch_visit_logs"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_cycle_leaves_queue_untouched() {
        let remote = Arc::new(StubRemote::new().offline());
        let (engine, _clock) = engine_for(&remote, LocalRecordStore::in_memory()).await;
        let log = VisitLog::new(60, Rating::Okay, 3);
        let record = enqueue(&engine, EntityType::VisitLog, MutationAction::Create, &log).await;

        let report = completed(engine.sync_now().await);

        assert!(report.offline);
        assert_eq!(engine.queue().snapshot().await.unwrap(), vec![record]);
        assert_eq!(engine.last_sync_date(), None);
        assert_eq!(remote.calls_to("create_visit_log"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_download_does_not_advance_last_sync_date() {
        let remote = Arc::new(StubRemote::new().failing_downloads());
        let store = LocalRecordStore::in_memory();
        let (engine, _clock) = engine_for(&remote, store.clone()).await;
        let log = VisitLog::new(60, Rating::Okay, 3);
        enqueue(&engine, EntityType::VisitLog, MutationAction::Create, &log).await;

        let report = completed(engine.sync_now().await);

        assert_eq!(report.uploaded, 1);
        assert!(!report.download_completed);
        assert_eq!(engine.last_sync_date(), None);
        assert_eq!(store.load_last_sync_date().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn uploads_follow_enqueue_order() {
        let remote = Arc::new(StubRemote::new());
        let (engine, _clock) = engine_for(&remote, LocalRecordStore::in_memory()).await;
        let log = VisitLog::new(180, Rating::Great, 4);
        let mut edited = log.clone();
        edited.duration_seconds = 240;
        enqueue(&engine, EntityType::VisitLog, MutationAction::Create, &log).await;
        enqueue(&engine, EntityType::VisitLog, MutationAction::Update, &edited).await;
        enqueue(&engine, EntityType::VisitLog, MutationAction::Delete, &edited).await;

        completed(engine.sync_now().await);

        let uploads: Vec<&str> = remote
            .calls()
            .into_iter()
            .filter(|call| call.ends_with("_visit_log"))
            .collect();
        assert_eq!(
            uploads,
            vec!["create_visit_log", "update_visit_log", "delete_visit_log"]
        );
        assert!(remote.visit_logs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_payload_is_evicted_without_remote_calls() {
        let remote = Arc::new(StubRemote::new());
        let (engine, _clock) = engine_for(&remote, LocalRecordStore::in_memory()).await;
        let mut record = MutationRecord::new(
            EntityType::VisitLog,
            MutationAction::Create,
            &VisitLog::new(60, Rating::Good, 4),
        )
        .unwrap();
        record.payload = "{not json".to_string();
        engine.queue().enqueue(record).await.unwrap();

        let report = completed(engine.sync_now().await);

        assert_eq!(report.evicted, 1);
        assert!(engine.queue().is_empty().await.unwrap());
        assert_eq!(remote.calls_to("create_visit_log"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn device_stats_round_trip_through_remote() {
        let remote = Arc::new(StubRemote::new());
        let store = LocalRecordStore::in_memory();
        let (engine, _clock) = engine_for(&remote, store.clone()).await;
        let stats = DeviceStats {
            streak_count: 4,
            total_flush_funds: 120,
            total_logs: 12,
            last_log_date: Some(Utc::now()),
        };
        enqueue(&engine, EntityType::DeviceStats, MutationAction::Update, &stats).await;

        completed(engine.sync_now().await);

        assert_eq!(remote.calls_to("upsert_device_stats"), 1);
        assert_eq!(store.load_device_stats().await.unwrap(), Some(stats));
    }

    #[tokio::test(start_paused = true)]
    async fn device_is_registered_once() {
        let remote = Arc::new(StubRemote::new());
        let (engine, _clock) = engine_for(&remote, LocalRecordStore::in_memory()).await;

        completed(engine.sync_now().await);
        completed(engine.sync_now().await);

        assert_eq!(remote.calls_to("register_device"), 1);
        assert_eq!(remote.calls_to("check_connectivity"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn incremental_download_ignores_logs_older_than_last_sync() {
        let remote = Arc::new(StubRemote::new());
        let store = LocalRecordStore::in_memory();
        let (engine, clock) = engine_for(&remote, store.clone()).await;
        completed(engine.sync_now().await);
        let synced_at = clock.now();

        let mut stale = VisitLog::new(60, Rating::Good, 4);
        stale.updated_at = synced_at - Duration::minutes(1);
        let mut fresh = VisitLog::new(90, Rating::Great, 4);
        fresh.updated_at = synced_at + Duration::minutes(1);
        remote.set_visit_logs(vec![stale, fresh.clone()]);
        clock.advance(Duration::minutes(2));

        let report = completed(engine.sync_now().await);

        assert_eq!(report.downloaded, 1);
        let logs: Vec<VisitLog> = store.load_collection().await.unwrap();
        assert_eq!(logs, vec![fresh]);
        assert_eq!(engine.last_sync_date(), Some(clock.now()));
    }

    #[tokio::test(start_paused = true)]
    async fn last_sync_date_is_restored_from_store() {
        let remote = Arc::new(StubRemote::new());
        let store = LocalRecordStore::in_memory();
        let saved = Utc::now() - Duration::hours(1);
        store.save_last_sync_date(saved).await.unwrap();

        let (engine, _clock) = engine_for(&remote, store).await;

        assert_eq!(
            engine.state(),
            SyncState {
                last_sync_date: Some(saved),
                is_syncing: false,
            }
        );
    }
}
