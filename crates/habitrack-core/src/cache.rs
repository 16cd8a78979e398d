//! Local cache collaborator.
//!
//! A key-value string store used only for stale-while-revalidate reads.
//! The remote store stays the source of truth; a broken or missing entry is
//! always treated as a miss.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::storage::Database;

/// Cache key holding a user's habit list.
pub fn habits_key(user_id: &str) -> String {
    format!("habits_{user_id}")
}

/// Cache key holding a user's recent completion records.
pub fn logs_key(user_id: &str) -> String {
    format!("logs_{user_id}")
}

#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Drop every entry.
    async fn clear(&self) -> Result<()>;
}

/// Read and decode a cached value. Errors and corrupt payloads are misses.
pub async fn read_json<T: DeserializeOwned>(cache: &dyn LocalCache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::debug!(key, "cache miss");
            return None;
        }
        Err(e) => {
            tracing::warn!(key, "cache read failed, treating as miss: {e}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => {
            tracing::debug!(key, "cache hit");
            Some(value)
        }
        Err(e) => {
            tracing::warn!(key, "discarding unparseable cache entry: {e}");
            None
        }
    }
}

/// Encode and store a value.
pub async fn write_json<T: Serialize + ?Sized>(
    cache: &dyn LocalCache,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw).await
}

/// Cache persisted in the device database's `kv` table.
pub struct SqliteCache {
    db: Mutex<Database>,
}

impl SqliteCache {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> rusqlite::Result<T>) -> Result<T> {
        let db = self
            .db
            .lock()
            .map_err(|e| CoreError::Cache(format!("lock error: {e}")))?;
        Ok(f(&db)?)
    }
}

#[async_trait]
impl LocalCache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_db(|db| db.kv_get(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_db(|db| db.kv_set(key, value))
    }

    async fn clear(&self) -> Result<()> {
        let removed = self.with_db(|db| db.kv_clear())?;
        tracing::info!(removed, "cache cleared");
        Ok(())
    }
}

/// Process-local cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries().clear();
        Ok(())
    }
}
