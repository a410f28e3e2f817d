//! Key-value record repository implementations

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::error::{Error, Result};

/// Durable string storage addressed by key
///
/// Each call is atomic per key. Read-modify-write sequences are serialized
/// one level up, in [`super::LocalRecordStore`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace the value stored under `key`
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Insert or replace several keys at once; either all land or none do
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Delete `key` if present
    async fn remove(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `KeyValueStore`
#[derive(Clone)]
pub struct LibSqlKeyValueStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlKeyValueStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (or create) a store backed by the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }
}

#[async_trait]
impl KeyValueStore for LibSqlKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query("SELECT value FROM records WHERE key = ?", libsql::params![key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT OR REPLACE INTO records (key, value, updated_at) VALUES (?, ?, ?)",
                libsql::params![key, value, now],
            )
            .await?;
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        for (key, value) in entries {
            if let Err(error) = conn
                .execute(
                    "INSERT OR REPLACE INTO records (key, value, updated_at) VALUES (?, ?, ?)",
                    libsql::params![*key, *value, now],
                )
                .await
            {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(error.into());
            }
        }
        conn.execute("COMMIT", ()).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute("DELETE FROM records WHERE key = ?", libsql::params![key])
            .await?;
        Ok(())
    }
}

/// Non-durable `KeyValueStore` for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: StdMutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut stored = self.entries()?;
        for (key, value) in entries {
            stored.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "current_thread")]
    async fn libsql_store_set_get_remove() {
        let store = LibSqlKeyValueStore::open_in_memory().await.unwrap();

        assert_eq!(store.get("visit_logs").await.unwrap(), None);
        store.set("visit_logs", "[]").await.unwrap();
        store.set("visit_logs", "[1]").await.unwrap();
        assert_eq!(store.get("visit_logs").await.unwrap().as_deref(), Some("[1]"));

        store.remove("visit_logs").await.unwrap();
        assert_eq!(store.get("visit_logs").await.unwrap(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn libsql_store_persists_across_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("pals.db");

        {
            let store = LibSqlKeyValueStore::open(&path).await.unwrap();
            store.set("last_sync_date", "\"2026-01-01T00:00:00Z\"").await.unwrap();
        }

        let reopened = LibSqlKeyValueStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("last_sync_date").await.unwrap().as_deref(),
            Some("\"2026-01-01T00:00:00Z\"")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn libsql_store_set_many_writes_every_key() {
        let store = LibSqlKeyValueStore::open_in_memory().await.unwrap();
        store.set("sync_queue", "[]").await.unwrap();

        store
            .set_many(&[("visit_logs", "[1]"), ("sync_queue", "[2]")])
            .await
            .unwrap();

        assert_eq!(store.get("visit_logs").await.unwrap().as_deref(), Some("[1]"));
        assert_eq!(store.get("sync_queue").await.unwrap().as_deref(), Some("[2]"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn memory_store_set_get_remove() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
