//! Local durable storage for PoopyPals

mod connection;
mod kv_repository;
mod migrations;
mod record_store;

pub use connection::Database;
pub use kv_repository::{KeyValueStore, LibSqlKeyValueStore, MemoryKeyValueStore};
pub use record_store::{LocalRecordStore, LocalWrite, StorageKey, StoredCollection};
