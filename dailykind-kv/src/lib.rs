//! # dailykind-kv
//!
//! The shared key-value store behind the DailyKind task service.
//!
//! The service keeps no authoritative state in process memory: the master
//! list, its creation timestamp, the task history set and the per-day slices
//! all live here and are touched only through single-key operations.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: in-process expiring map on [`moka`], used by tests and
//!   single-instance deployments
//! - [`SqliteStore`]: durable single-file store on `rusqlite`
//!
//! Both satisfy the same [`KvStore`] contract, so callers never branch on the
//! backend.

pub mod config;
pub mod error;
pub mod memory;
mod schema;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use config::{StoreBackend, StoreConfig};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Minimal expiring key-value store with sets.
///
/// Each method is atomic on its own; sequences of calls are not.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Backend name (e.g. `"memory"`, `"sqlite"`).
    fn name(&self) -> &str;

    /// Read a scalar value. Expired and missing keys both return `None`.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a scalar value, replacing any previous value and TTL.
    ///
    /// `ttl = None` keeps the value until it is overwritten.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Add `member` to the set at `set_key`. Returns `true` if it was not
    /// already present.
    async fn sadd(&self, set_key: &str, member: &str) -> Result<bool>;

    /// Whether `member` is in the set at `set_key`.
    async fn sismember(&self, set_key: &str, member: &str) -> Result<bool>;
}

/// Open the store described by `config`.
///
/// # Errors
///
/// Returns [`StoreError::Config`] for an invalid config, or the backend's
/// error if a durable store cannot be opened.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>> {
    config.validate()?;
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new(config.memory_capacity))),
        StoreBackend::Sqlite => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| StoreError::Config("sqlite backend requires a path".into()))?;
            Ok(Arc::new(SqliteStore::open(path)?))
        }
    }
}
