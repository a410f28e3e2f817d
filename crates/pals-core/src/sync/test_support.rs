//! In-process fakes for exercising the sync engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Notify;

use super::clock::Clock;
use super::remote::{FetchFilter, RemoteError, RemoteResult, RemoteService};
use crate::db::{KeyValueStore, MemoryKeyValueStore};
use crate::error::{Error, Result};
use crate::models::{
    Achievement, AchievementId, DeviceId, DeviceStats, PlatformMetadata, VisitLog, VisitLogId,
};

/// Pauses a stubbed connectivity check until released
#[derive(Default)]
pub(crate) struct Gate {
    entered: Notify,
    released: Notify,
}

impl Gate {
    pub(crate) async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self) {
        self.released.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.released.notified().await;
    }
}

/// Remote service keeping its state in memory and recording every call
#[derive(Default)]
pub(crate) struct StubRemote {
    offline: AtomicBool,
    fail_uploads: AtomicBool,
    fail_downloads: AtomicBool,
    gate: Option<Arc<Gate>>,
    calls: Mutex<Vec<&'static str>>,
    visit_logs: Mutex<Vec<VisitLog>>,
    achievements: Mutex<Vec<Achievement>>,
    stats: Mutex<Option<DeviceStats>>,
}

impl StubRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn offline(self) -> Self {
        self.offline.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_uploads(self) -> Self {
        self.fail_uploads.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_downloads(self) -> Self {
        self.fail_downloads.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call == name)
            .count()
    }

    pub(crate) fn visit_logs(&self) -> Vec<VisitLog> {
        self.visit_logs.lock().unwrap().clone()
    }

    pub(crate) fn set_visit_logs(&self, logs: Vec<VisitLog>) {
        *self.visit_logs.lock().unwrap() = logs;
    }

    pub(crate) fn set_achievements(&self, achievements: Vec<Achievement>) {
        *self.achievements.lock().unwrap() = achievements;
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn upload(&self, call: &'static str) -> RemoteResult<()> {
        self.record(call);
        if self.fail_uploads.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable(format!("{call} rejected by stub")))
        } else {
            Ok(())
        }
    }

    fn download(&self, call: &'static str) -> RemoteResult<()> {
        self.record(call);
        if self.fail_downloads.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable(format!("{call} rejected by stub")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteService for StubRemote {
    async fn check_connectivity(&self) -> bool {
        self.record("check_connectivity");
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        !self.offline.load(Ordering::SeqCst)
    }

    async fn register_device(
        &self,
        device_id: DeviceId,
        _metadata: &PlatformMetadata,
    ) -> RemoteResult<DeviceId> {
        self.record("register_device");
        Ok(device_id)
    }

    async fn fetch_visit_logs(
        &self,
        _device_id: DeviceId,
        _filter: &FetchFilter,
    ) -> RemoteResult<Vec<VisitLog>> {
        self.download("fetch_visit_logs")?;
        Ok(self.visit_logs())
    }

    async fn create_visit_log(&self, _device_id: DeviceId, log: &VisitLog) -> RemoteResult<VisitLog> {
        self.upload("create_visit_log")?;
        self.visit_logs.lock().unwrap().push(log.clone());
        Ok(log.clone())
    }

    async fn update_visit_log(&self, _device_id: DeviceId, log: &VisitLog) -> RemoteResult<VisitLog> {
        self.upload("update_visit_log")?;
        let mut logs = self.visit_logs.lock().unwrap();
        logs.retain(|existing| existing.id != log.id);
        logs.push(log.clone());
        Ok(log.clone())
    }

    async fn delete_visit_log(&self, _device_id: DeviceId, id: VisitLogId) -> RemoteResult<()> {
        self.upload("delete_visit_log")?;
        self.visit_logs
            .lock()
            .unwrap()
            .retain(|existing| existing.id != Some(id));
        Ok(())
    }

    async fn fetch_achievements(
        &self,
        _device_id: DeviceId,
        _filter: &FetchFilter,
    ) -> RemoteResult<Vec<Achievement>> {
        self.download("fetch_achievements")?;
        Ok(self.achievements.lock().unwrap().clone())
    }

    async fn create_achievement(
        &self,
        _device_id: DeviceId,
        achievement: &Achievement,
    ) -> RemoteResult<Achievement> {
        self.upload("create_achievement")?;
        self.achievements.lock().unwrap().push(achievement.clone());
        Ok(achievement.clone())
    }

    async fn update_achievement(
        &self,
        _device_id: DeviceId,
        achievement: &Achievement,
    ) -> RemoteResult<Achievement> {
        self.upload("update_achievement")?;
        let mut achievements = self.achievements.lock().unwrap();
        achievements.retain(|existing| existing.id != achievement.id);
        achievements.push(achievement.clone());
        Ok(achievement.clone())
    }

    async fn delete_achievement(&self, _device_id: DeviceId, id: AchievementId) -> RemoteResult<()> {
        self.upload("delete_achievement")?;
        self.achievements
            .lock()
            .unwrap()
            .retain(|existing| existing.id != id);
        Ok(())
    }

    async fn fetch_device_stats(&self, _device_id: DeviceId) -> RemoteResult<Option<DeviceStats>> {
        self.download("fetch_device_stats")?;
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn upsert_device_stats(
        &self,
        _device_id: DeviceId,
        stats: &DeviceStats,
    ) -> RemoteResult<DeviceStats> {
        self.upload("upsert_device_stats")?;
        *self.stats.lock().unwrap() = Some(stats.clone());
        Ok(stats.clone())
    }
}

/// Clock frozen at a fixed instant until advanced
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(1_750_000_000, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Key-value store whose every operation fails, as a full disk would
pub(crate) struct FailingKeyValueStore;

#[async_trait]
impl KeyValueStore for FailingKeyValueStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Storage("disk unavailable".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Storage("disk unavailable".to_string()))
    }

    async fn set_many(&self, _entries: &[(&str, &str)]) -> Result<()> {
        Err(Error::Storage("disk unavailable".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::Storage("disk unavailable".to_string()))
    }
}

/// In-memory store that rejects any write touching one key until healed
pub(crate) struct KeyFailingStore {
    inner: MemoryKeyValueStore,
    key: &'static str,
    failing: AtomicBool,
}

impl KeyFailingStore {
    pub(crate) fn new(key: &'static str) -> Self {
        Self {
            inner: MemoryKeyValueStore::new(),
            key,
            failing: AtomicBool::new(true),
        }
    }

    pub(crate) fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    fn check(&self, keys: &[&str]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) && keys.contains(&self.key) {
            Err(Error::Storage("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for KeyFailingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check(&[key])?;
        self.inner.set(key, value).await
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let keys: Vec<&str> = entries.iter().map(|(key, _)| *key).collect();
        self.check(&keys)?;
        self.inner.set_many(entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check(&[key])?;
        self.inner.remove(key).await
    }
}
