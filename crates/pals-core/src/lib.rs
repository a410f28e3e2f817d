//! pals-core - Core library for PoopyPals
//!
//! This crate contains the offline-first synchronization core shared by all
//! PoopyPals clients: the domain models, the durable local record store, the
//! pending-mutation queue, last-write-wins merging, retry with backoff, and
//! the sync engine that ties them to a remote service.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{
    Achievement, AchievementType, DeviceId, DeviceStats, EntityType, MutationAction, MutationId,
    MutationRecord, Rating, VisitLog, VisitLogId,
};
pub use state::SyncState;
