//! Shared cross-platform sync state types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Observable sync state used by clients to render status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub last_sync_date: Option<DateTime<Utc>>,
    pub is_syncing: bool,
}
