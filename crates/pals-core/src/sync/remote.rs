//! Remote service contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Achievement, AchievementId, DeviceId, DeviceStats, PlatformMetadata, VisitLog, VisitLogId,
};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Unexpected remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Query filters for remote fetches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchFilter {
    /// Only entities modified strictly after this instant
    pub updated_since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl FetchFilter {
    pub fn updated_since(since: Option<DateTime<Utc>>) -> Self {
        Self {
            updated_since: since,
            ..Self::default()
        }
    }
}

/// Server side of synchronization, scoped by device identity.
///
/// Implementations may fail with any [`RemoteError`]; the sync engine
/// retries uploads and treats every error as a failed attempt.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Cheap reachability probe run before each sync cycle
    async fn check_connectivity(&self) -> bool;

    /// Idempotently register the device, returning the id the remote uses
    async fn register_device(
        &self,
        device_id: DeviceId,
        metadata: &PlatformMetadata,
    ) -> RemoteResult<DeviceId>;

    async fn fetch_visit_logs(
        &self,
        device_id: DeviceId,
        filter: &FetchFilter,
    ) -> RemoteResult<Vec<VisitLog>>;

    async fn create_visit_log(&self, device_id: DeviceId, log: &VisitLog)
        -> RemoteResult<VisitLog>;

    async fn update_visit_log(&self, device_id: DeviceId, log: &VisitLog)
        -> RemoteResult<VisitLog>;

    async fn delete_visit_log(&self, device_id: DeviceId, id: VisitLogId) -> RemoteResult<()>;

    async fn fetch_achievements(
        &self,
        device_id: DeviceId,
        filter: &FetchFilter,
    ) -> RemoteResult<Vec<Achievement>>;

    async fn create_achievement(
        &self,
        device_id: DeviceId,
        achievement: &Achievement,
    ) -> RemoteResult<Achievement>;

    async fn update_achievement(
        &self,
        device_id: DeviceId,
        achievement: &Achievement,
    ) -> RemoteResult<Achievement>;

    async fn delete_achievement(&self, device_id: DeviceId, id: AchievementId)
        -> RemoteResult<()>;

    /// `None` when the remote has no stats for the device yet
    async fn fetch_device_stats(&self, device_id: DeviceId) -> RemoteResult<Option<DeviceStats>>;

    async fn upsert_device_stats(
        &self,
        device_id: DeviceId,
        stats: &DeviceStats,
    ) -> RemoteResult<DeviceStats>;
}
