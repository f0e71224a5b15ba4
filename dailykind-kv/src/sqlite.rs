//! SQLite-backed durable store.
//!
//! One database file holds both scalar entries and sets. Expiry is stored as
//! an absolute epoch-millisecond deadline; expired rows are filtered on read
//! and deleted lazily.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::schema::apply_schema;
use crate::KvStore;

/// Durable [`KvStore`] backed by a single SQLite file.
///
/// Thread-safe via an internal `Mutex<Connection>`. Every operation is a
/// single short statement, so they run inline rather than on a blocking pool.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete every expired scalar entry. Returns the number of rows removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now_epoch_millis()],
        )?;
        Ok(removed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let now = now_epoch_millis();
        let row: Option<(String, Option<i64>)> = conn
            .query_row(
                "SELECT value, expires_at FROM kv_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((_, Some(expires_at))) if expires_at <= now => {
                conn.execute(
                    "DELETE FROM kv_entries WHERE key = ?1 AND expires_at <= ?2",
                    params![key, now],
                )?;
                Ok(None)
            }
            Some((raw, _)) => Ok(Some(serde_json::from_str(&raw)?)),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let raw = serde_json::to_string(&value)?;
        let expires_at = ttl.map(|ttl| {
            let ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            now_epoch_millis().saturating_add(ms)
        });
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, raw, expires_at],
        )?;
        Ok(())
    }

    async fn sadd(&self, set_key: &str, member: &str) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO kv_set_members (set_key, member) VALUES (?1, ?2)",
            params![set_key, member],
        )?;
        Ok(inserted > 0)
    }

    async fn sismember(&self, set_key: &str, member: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM kv_set_members WHERE set_key = ?1 AND member = ?2",
                params![set_key, member],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Current epoch time in milliseconds.
fn now_epoch_millis() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}
