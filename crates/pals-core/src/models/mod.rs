//! Data models for PoopyPals

mod achievement;
mod device;
mod device_stats;
mod id;
mod mutation;
mod visit_log;

pub use achievement::{catalog, Achievement, AchievementId, AchievementType, CatalogEntry};
pub use device::{DeviceId, PlatformMetadata};
pub use device_stats::DeviceStats;
pub use mutation::{EntityType, MutationAction, MutationId, MutationRecord};
pub use visit_log::{
    Rating, VisitLog, VisitLogId, CONSISTENCY_RANGE, DEFAULT_FLUSH_FUNDS, MAX_DURATION_SECONDS,
};
