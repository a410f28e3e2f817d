//! Typed local record store over a [`KeyValueStore`]
//!
//! Every collection is stored as a single JSON document under a fixed key,
//! mirroring the way the mobile clients persist their caches. All writes go
//! through one async lock so read-modify-write updates never interleave.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use super::{KeyValueStore, LibSqlKeyValueStore, MemoryKeyValueStore};
use crate::error::{Error, Result};
use crate::models::{
    Achievement, DeviceStats, EntityType, MutationAction, MutationRecord, VisitLog,
};

/// Storage keys used by the local record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    VisitLogs,
    Achievements,
    DeviceStats,
    SyncQueue,
    LastSyncDate,
}

impl StorageKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VisitLogs => "visit_logs",
            Self::Achievements => "achievements",
            Self::DeviceStats => "device_stats",
            Self::SyncQueue => "sync_queue",
            Self::LastSyncDate => "last_sync_date",
        }
    }
}

/// An entity persisted as a whole collection under one key
pub trait StoredCollection: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KEY: StorageKey;
    const ENTITY_TYPE: EntityType;

    /// Order the collection the way it is persisted (newest first)
    fn sort_for_storage(items: &mut [Self]);
}

impl StoredCollection for VisitLog {
    const KEY: StorageKey = StorageKey::VisitLogs;
    const ENTITY_TYPE: EntityType = EntityType::VisitLog;

    fn sort_for_storage(items: &mut [Self]) {
        items.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
    }
}

impl StoredCollection for Achievement {
    const KEY: StorageKey = StorageKey::Achievements;
    const ENTITY_TYPE: EntityType = EntityType::Achievement;

    fn sort_for_storage(items: &mut [Self]) {
        items.sort_by(|a, b| b.unlocked_at.cmp(&a.unlocked_at));
    }
}

/// Authoritative local copy of all synced state
#[derive(Clone)]
pub struct LocalRecordStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl LocalRecordStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open a durable store backed by the libSQL file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let kv = LibSqlKeyValueStore::open(path).await?;
        Ok(Self::new(Arc::new(kv)))
    }

    /// Create a non-durable store (primarily for tests)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    pub async fn load_collection<T: StoredCollection>(&self) -> Result<Vec<T>> {
        Ok(self.load(T::KEY).await?.unwrap_or_default())
    }

    /// Replace a collection, storing it newest-first
    pub async fn save_collection<T: StoredCollection>(&self, mut items: Vec<T>) -> Result<()> {
        T::sort_for_storage(&mut items);
        let _guard = self.write_lock.lock().await;
        self.save(T::KEY, &items).await
    }

    /// Serialized read-modify-write of a collection
    pub async fn update_collection<T, R, F>(&self, apply: F) -> Result<R>
    where
        T: StoredCollection,
        R: Send,
        F: FnOnce(&mut Vec<T>) -> Result<R> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.load(T::KEY).await?.unwrap_or_default();
        let result = apply(&mut items)?;
        T::sort_for_storage(&mut items);
        self.save(T::KEY, &items).await?;
        Ok(result)
    }

    pub async fn load_queue(&self) -> Result<Vec<MutationRecord>> {
        Ok(self.load(StorageKey::SyncQueue).await?.unwrap_or_default())
    }

    pub async fn save_queue(&self, queue: &[MutationRecord]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(StorageKey::SyncQueue, &queue).await
    }

    /// Serialized read-modify-write of the pending-mutation queue
    pub async fn update_queue<R, F>(&self, apply: F) -> Result<R>
    where
        R: Send,
        F: FnOnce(&mut Vec<MutationRecord>) -> R + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut queue: Vec<MutationRecord> =
            self.load(StorageKey::SyncQueue).await?.unwrap_or_default();
        let result = apply(&mut queue);
        self.save(StorageKey::SyncQueue, &queue).await?;
        Ok(result)
    }

    pub async fn load_last_sync_date(&self) -> Result<Option<DateTime<Utc>>> {
        self.load(StorageKey::LastSyncDate).await
    }

    pub async fn save_last_sync_date(&self, date: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(StorageKey::LastSyncDate, &date).await
    }

    pub async fn load_device_stats(&self) -> Result<Option<DeviceStats>> {
        self.load(StorageKey::DeviceStats).await
    }

    pub async fn save_device_stats(&self, stats: &DeviceStats) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(StorageKey::DeviceStats, stats).await
    }

    /// Load a collection, let `apply` change it, and persist the collection
    /// together with any stats change and queued mutations in one batch.
    ///
    /// When `apply` fails or the batch cannot be written, nothing is stored.
    pub async fn update_collection_and_enqueue<T, R, F>(&self, apply: F) -> Result<R>
    where
        T: StoredCollection,
        R: Send,
        F: FnOnce(&mut LocalWrite<T>) -> Result<R> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut write = LocalWrite {
            items: self.load(T::KEY).await?.unwrap_or_default(),
            stats: self.load(StorageKey::DeviceStats).await?,
            stats_changed: false,
            queued: Vec::new(),
        };
        let result = apply(&mut write)?;
        T::sort_for_storage(&mut write.items);

        let mut batch = vec![(T::KEY, encode(T::KEY, &write.items)?)];
        if let Some(stats) = write.stats.as_ref().filter(|_| write.stats_changed) {
            batch.push((StorageKey::DeviceStats, encode(StorageKey::DeviceStats, stats)?));
        }
        if !write.queued.is_empty() {
            let mut queue: Vec<MutationRecord> =
                self.load(StorageKey::SyncQueue).await?.unwrap_or_default();
            queue.append(&mut write.queued);
            batch.push((StorageKey::SyncQueue, encode(StorageKey::SyncQueue, &queue)?));
        }

        self.save_batch(&batch).await?;
        Ok(result)
    }

    /// Change the device stats and queue a snapshot of the result under
    /// `action`, persisting both in one batch
    pub async fn update_device_stats_and_enqueue<F>(
        &self,
        action: MutationAction,
        apply: F,
    ) -> Result<DeviceStats>
    where
        F: FnOnce(&mut DeviceStats) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut stats: DeviceStats = self
            .load(StorageKey::DeviceStats)
            .await?
            .unwrap_or_default();
        apply(&mut stats);

        let record = MutationRecord::new(EntityType::DeviceStats, action, &stats)?;
        let mut queue: Vec<MutationRecord> =
            self.load(StorageKey::SyncQueue).await?.unwrap_or_default();
        queue.push(record);

        let batch = [
            (StorageKey::DeviceStats, encode(StorageKey::DeviceStats, &stats)?),
            (StorageKey::SyncQueue, encode(StorageKey::SyncQueue, &queue)?),
        ];
        self.save_batch(&batch).await?;
        Ok(stats)
    }

    async fn load<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>> {
        let Some(raw) = self.kv.get(key.as_str()).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|error| Error::Storage(format!("corrupt record '{}': {error}", key.as_str())))
    }

    async fn save<T: Serialize + ?Sized + Sync>(&self, key: StorageKey, value: &T) -> Result<()> {
        let raw = encode(key, value)?;
        self.kv.set(key.as_str(), &raw).await
    }

    async fn save_batch(&self, batch: &[(StorageKey, String)]) -> Result<()> {
        let entries: Vec<(&str, &str)> = batch
            .iter()
            .map(|(key, raw)| (key.as_str(), raw.as_str()))
            .collect();
        self.kv.set_many(&entries).await
    }
}

/// Documents staged by [`LocalRecordStore::update_collection_and_enqueue`]
pub struct LocalWrite<T> {
    pub items: Vec<T>,
    stats: Option<DeviceStats>,
    stats_changed: bool,
    queued: Vec<MutationRecord>,
}

impl<T> LocalWrite<T> {
    /// Device stats, starting from defaults when none are stored yet
    pub fn stats_mut(&mut self) -> &mut DeviceStats {
        self.stats_changed = true;
        self.stats.get_or_insert_with(DeviceStats::default)
    }

    /// Append `record` to the sync queue as part of this write
    pub fn enqueue(&mut self, record: MutationRecord) {
        self.queued.push(record);
    }
}

fn encode<T: Serialize + ?Sized>(key: StorageKey, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|error| Error::Storage(format!("cannot encode '{}': {error}", key.as_str())))
}
