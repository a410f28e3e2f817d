//! Achievement model and the built-in catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::uuid_id;

uuid_id!(
    /// Identifier of an unlocked achievement
    AchievementId
);

/// Achievement category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AchievementType {
    #[default]
    Milestone,
    Streak,
    Special,
    Consistency,
}

/// An unlocked achievement
///
/// A device holds at most one achievement per `achievement_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: AchievementId,
    /// Stable catalog key, e.g. `streak_7`
    pub achievement_key: String,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    pub icon_name: String,
    pub flush_funds_reward: i64,
    /// Unlock time; the conflict tiebreaker
    pub unlocked_at: DateTime<Utc>,
    #[serde(default)]
    pub is_viewed: bool,
}

impl Achievement {
    /// Unlock the catalog achievement with the given key, now
    pub fn unlock(key: &str) -> Option<Self> {
        find_catalog_entry(key).map(|entry| entry.unlock_at(Utc::now()))
    }
}

/// Static description of an unlockable achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub key: &'static str,
    pub achievement_type: AchievementType,
    pub title: &'static str,
    pub description: &'static str,
    pub icon_name: &'static str,
    pub flush_funds_reward: i64,
}

impl CatalogEntry {
    #[must_use]
    pub fn unlock_at(&self, unlocked_at: DateTime<Utc>) -> Achievement {
        Achievement {
            id: AchievementId::new(),
            achievement_key: self.key.to_string(),
            achievement_type: self.achievement_type,
            title: self.title.to_string(),
            description: self.description.to_string(),
            icon_name: self.icon_name.to_string(),
            flush_funds_reward: self.flush_funds_reward,
            unlocked_at,
            is_viewed: false,
        }
    }
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "first_log",
        achievement_type: AchievementType::Milestone,
        title: "First Steps",
        description: "Your journey begins! You've logged your first bathroom visit.",
        icon_name: "star.fill",
        flush_funds_reward: 100,
    },
    CatalogEntry {
        key: "streak_3",
        achievement_type: AchievementType::Streak,
        title: "Getting Started",
        description: "3-day streak! You're building a healthy habit.",
        icon_name: "flame.fill",
        flush_funds_reward: 150,
    },
    CatalogEntry {
        key: "streak_7",
        achievement_type: AchievementType::Streak,
        title: "Week Warrior",
        description: "7-day streak! One week of consistent tracking.",
        icon_name: "flame.fill",
        flush_funds_reward: 300,
    },
    CatalogEntry {
        key: "streak_30",
        achievement_type: AchievementType::Streak,
        title: "Monthly Master",
        description: "30-day streak! You're a tracking legend.",
        icon_name: "flame.fill",
        flush_funds_reward: 1000,
    },
    CatalogEntry {
        key: "streak_100",
        achievement_type: AchievementType::Streak,
        title: "Century Streak",
        description: "100-day streak! Unbelievable dedication!",
        icon_name: "flame.fill",
        flush_funds_reward: 5000,
    },
    CatalogEntry {
        key: "logs_10",
        achievement_type: AchievementType::Milestone,
        title: "Double Digits",
        description: "10 logs tracked! Keep it going!",
        icon_name: "number.circle.fill",
        flush_funds_reward: 100,
    },
    CatalogEntry {
        key: "logs_50",
        achievement_type: AchievementType::Milestone,
        title: "Half Century",
        description: "50 logs! You're halfway to the Century Club.",
        icon_name: "number.circle.fill",
        flush_funds_reward: 500,
    },
    CatalogEntry {
        key: "logs_100",
        achievement_type: AchievementType::Milestone,
        title: "Century Club",
        description: "100 logs tracked! Welcome to the elite club.",
        icon_name: "crown.fill",
        flush_funds_reward: 1000,
    },
    CatalogEntry {
        key: "logs_365",
        achievement_type: AchievementType::Milestone,
        title: "Year of Logging",
        description: "365 logs! A full year of tracking.",
        icon_name: "calendar.circle.fill",
        flush_funds_reward: 5000,
    },
    CatalogEntry {
        key: "morning_person",
        achievement_type: AchievementType::Special,
        title: "Morning Person",
        description: "5 logs before 9am! Early bird gets the... relief.",
        icon_name: "sunrise.fill",
        flush_funds_reward: 200,
    },
    CatalogEntry {
        key: "speed_runner",
        achievement_type: AchievementType::Special,
        title: "Speed Runner",
        description: "Average under 2 minutes for 10 logs. Efficient!",
        icon_name: "bolt.fill",
        flush_funds_reward: 300,
    },
    CatalogEntry {
        key: "perfect_week",
        achievement_type: AchievementType::Consistency,
        title: "Perfect Week",
        description: "7 days in a row, all 'Great' ratings!",
        icon_name: "star.circle.fill",
        flush_funds_reward: 500,
    },
    CatalogEntry {
        key: "ideal_consistency",
        achievement_type: AchievementType::Consistency,
        title: "Gut Health Champion",
        description: "10 logs with ideal consistency (3-4). Your gut is happy!",
        icon_name: "heart.circle.fill",
        flush_funds_reward: 400,
    },
];

/// All predefined achievements
pub const fn catalog() -> &'static [CatalogEntry] {
    CATALOG
}

fn find_catalog_entry(key: &str) -> Option<&'static CatalogEntry> {
    let key = key.trim();
    CATALOG.iter().find(|entry| entry.key == key)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn catalog_keys_are_unique() {
        let keys = catalog().iter().map(|entry| entry.key).collect::<HashSet<_>>();
        assert_eq!(keys.len(), catalog().len());
    }

    #[test]
    fn unlock_copies_catalog_fields() {
        let achievement = Achievement::unlock("streak_7").unwrap();
        assert_eq!(achievement.achievement_key, "streak_7");
        assert_eq!(achievement.achievement_type, AchievementType::Streak);
        assert_eq!(achievement.flush_funds_reward, 300);
        assert!(!achievement.is_viewed);
    }

    #[test]
    fn unlock_unknown_key_is_none() {
        assert!(Achievement::unlock("streak_8").is_none());
    }
}
