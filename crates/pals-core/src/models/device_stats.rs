//! Per-device aggregate statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-computed aggregates for one device (singleton per device)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub streak_count: u32,
    pub total_flush_funds: i64,
    pub total_logs: u32,
    #[serde(default)]
    pub last_log_date: Option<DateTime<Utc>>,
}

impl DeviceStats {
    /// Apply a freshly created log to the local copy of the aggregates
    pub fn record_log(&mut self, flush_funds: i64, logged_at: DateTime<Utc>) {
        self.total_logs = self.total_logs.saturating_add(1);
        self.total_flush_funds = self.total_flush_funds.saturating_add(flush_funds);
        if self.last_log_date.is_none_or(|last| logged_at > last) {
            self.last_log_date = Some(logged_at);
        }
    }
}
