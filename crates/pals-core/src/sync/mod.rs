//! Offline-first synchronization core.
//!
//! Local writes land in the [`LocalRecordStore`](crate::db::LocalRecordStore)
//! and a [`MutationRecord`](crate::models::MutationRecord) is appended to the
//! [`SyncQueue`]. The [`SyncEngine`] drains the queue against a
//! [`RemoteService`], then downloads remote changes and merges them with
//! [`merge_collections`] (last-write-wins).

mod background;
mod clock;
mod engine;
mod http;
mod identity;
mod queue;
mod remote;
mod resolver;
mod retry;

#[cfg(test)]
pub(crate) mod test_support;

pub use background::BackgroundSync;
pub use clock::{Clock, SystemClock};
pub use engine::{SyncEngine, SyncEngineBuilder, SyncOutcome, SyncReport};
pub use http::HttpRemoteService;
pub use identity::{DerivedDeviceIdentity, DeviceIdentity, StaticDeviceIdentity};
pub use queue::{CommitSummary, SyncQueue, UploadOutcome};
pub use remote::{FetchFilter, RemoteError, RemoteResult, RemoteService};
pub use resolver::{merge, merge_collections, resolve, LastWriteWins};
pub use retry::{retry, RetryPolicy};
