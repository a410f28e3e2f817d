//! Pending mutation records held by the sync queue

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::id::uuid_id;

uuid_id!(
    /// Identifier of a queued mutation
    MutationId
);

/// Entity collection a mutation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    VisitLog,
    Achievement,
    DeviceStats,
}

impl EntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VisitLog => "visit_log",
            Self::Achievement => "achievement",
            Self::DeviceStats => "device_stats",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local write waiting to be uploaded
///
/// Only `retry_count` changes after enqueue; the payload is a frozen JSON
/// snapshot of the entity at the time of the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub id: MutationId,
    pub entity_type: EntityType,
    pub action: MutationAction,
    pub payload: String,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl MutationRecord {
    /// Snapshot `entity` into a new record with a fresh id
    pub fn new<T: Serialize>(
        entity_type: EntityType,
        action: MutationAction,
        entity: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            id: MutationId::new(),
            entity_type,
            action,
            payload: serde_json::to_string(entity)?,
            enqueued_at: Utc::now(),
            retry_count: 0,
        })
    }

    /// Decode the payload snapshot
    pub fn decode_payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.payload)
    }
}
