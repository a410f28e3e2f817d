//! Visit log model

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::uuid_id;
use crate::error::{Error, Result};

/// Longest visit the tracker accepts, in seconds (two hours)
pub const MAX_DURATION_SECONDS: u32 = 7200;

/// Accepted consistency scores (Bristol-like 1-7 scale)
pub const CONSISTENCY_RANGE: RangeInclusive<u8> = 1..=7;

/// Flush funds awarded for a single log unless the caller overrides it
pub const DEFAULT_FLUSH_FUNDS: i64 = 10;

uuid_id!(
    /// Identifier of a visit log
    VisitLogId
);

/// Five-point rating of a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Great,
    Good,
    Okay,
    Bad,
    Terrible,
}

impl Rating {
    pub const ALL: [Self; 5] = [
        Self::Great,
        Self::Good,
        Self::Okay,
        Self::Bad,
        Self::Terrible,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Great => "great",
            Self::Good => "good",
            Self::Okay => "okay",
            Self::Bad => "bad",
            Self::Terrible => "terrible",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|rating| rating.as_str() == normalized)
            .ok_or_else(|| Error::Validation(format!("unknown rating '{}'", s.trim())))
    }
}

/// A single logged bathroom visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitLog {
    /// Identity; `None` until assigned (locally on creation or by the remote)
    #[serde(default)]
    pub id: Option<VisitLogId>,
    /// When the visit happened
    pub logged_at: DateTime<Utc>,
    /// Visit length in seconds, `1..=MAX_DURATION_SECONDS`
    pub duration_seconds: u32,
    pub rating: Rating,
    /// Consistency score within [`CONSISTENCY_RANGE`]
    pub consistency: u8,
    #[serde(default)]
    pub notes: Option<String>,
    /// Reward currency earned by this log
    pub flush_funds_earned: i64,
    /// Client-side correlation id, echoed back by the remote
    #[serde(default)]
    pub local_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Last modification; the conflict tiebreaker
    pub updated_at: DateTime<Utc>,
}

impl VisitLog {
    /// Create a new log happening now, with a locally assigned id
    #[must_use]
    pub fn new(duration_seconds: u32, rating: Rating, consistency: u8) -> Self {
        let now = Utc::now();
        let id = VisitLogId::new();
        Self {
            id: Some(id),
            logged_at: now,
            duration_seconds,
            rating,
            consistency,
            notes: None,
            flush_funds_earned: DEFAULT_FLUSH_FUNDS,
            local_id: Some(id.as_str()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach free-form notes, dropping whitespace-only text
    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = crate::util::normalize_text_option(notes);
        self
    }

    /// Check the domain invariants enforced before a log is stored or queued
    pub fn validate(&self) -> Result<()> {
        if self.duration_seconds == 0 || self.duration_seconds > MAX_DURATION_SECONDS {
            return Err(Error::Validation(format!(
                "duration must be between 1 and {MAX_DURATION_SECONDS} seconds, got {}",
                self.duration_seconds
            )));
        }
        if !CONSISTENCY_RANGE.contains(&self.consistency) {
            return Err(Error::Validation(format!(
                "consistency must be between {} and {}, got {}",
                CONSISTENCY_RANGE.start(),
                CONSISTENCY_RANGE.end(),
                self.consistency
            )));
        }
        Ok(())
    }

    pub const fn duration_minutes(&self) -> u32 {
        self.duration_seconds / 60
    }

    pub const fn is_ideal_consistency(&self) -> bool {
        matches!(self.consistency, 3 | 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_log_has_local_identity() {
        let log = VisitLog::new(180, Rating::Great, 4);
        let id = log.id.unwrap();
        assert_eq!(log.local_id, Some(id.as_str()));
        assert_eq!(log.created_at, log.updated_at);
        assert_eq!(log.flush_funds_earned, DEFAULT_FLUSH_FUNDS);
    }

    #[test]
    fn visit_log_id_parses_from_its_display_form() {
        let id = VisitLogId::new();
        let parsed: VisitLogId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<VisitLogId>().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_duration() {
        assert!(VisitLog::new(0, Rating::Okay, 4).validate().is_err());
        assert!(VisitLog::new(7201, Rating::Okay, 4).validate().is_err());
        assert!(VisitLog::new(7200, Rating::Okay, 4).validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_consistency() {
        assert!(VisitLog::new(60, Rating::Okay, 0).validate().is_err());
        assert!(VisitLog::new(60, Rating::Okay, 8).validate().is_err());
        assert!(VisitLog::new(60, Rating::Okay, 1).validate().is_ok());
        assert!(VisitLog::new(60, Rating::Okay, 7).validate().is_ok());
    }

    #[test]
    fn rating_parses_case_insensitively() {
        assert_eq!("Great".parse::<Rating>().unwrap(), Rating::Great);
        assert_eq!(" terrible ".parse::<Rating>().unwrap(), Rating::Terrible);
        assert!("meh".parse::<Rating>().is_err());
    }

    #[test]
    fn with_notes_drops_blank_text() {
        let log = VisitLog::new(60, Rating::Good, 3).with_notes(Some("  ".to_string()));
        assert_eq!(log.notes, None);
        assert!(log.is_ideal_consistency());
    }

    #[test]
    fn deserializes_without_identity() {
        let json = r#"{
            "logged_at": "2026-01-01T08:00:00Z",
            "duration_seconds": 120,
            "rating": "good",
            "consistency": 4,
            "flush_funds_earned": 10,
            "created_at": "2026-01-01T08:00:00Z",
            "updated_at": "2026-01-01T08:00:00Z"
        }"#;
        let log: VisitLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.id, None);
        assert_eq!(log.duration_minutes(), 2);
    }
}
