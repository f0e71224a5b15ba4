//! Store configuration with sensible defaults.
//!
//! [`StoreConfig`] selects the backend and its parameters. It is embedded in
//! the service's TOML configuration under `[store]`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Which backend holds the shared task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local expiring map. State is lost on restart.
    #[default]
    Memory,
    /// Single-file SQLite database. State survives restarts.
    Sqlite,
}

/// Configuration for opening a [`KvStore`](crate::KvStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to open.
    pub backend: StoreBackend,
    /// Database file for the SQLite backend. Ignored by the memory backend.
    pub path: Option<PathBuf>,
    /// Upper bound on scalar entries held by the memory backend.
    pub memory_capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            memory_capacity: 10_000,
        }
    }
}

impl StoreConfig {
    /// Config for a SQLite store at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - the SQLite backend has a `path`
    /// - `memory_capacity` is greater than 0
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.backend == StoreBackend::Sqlite && self.path.is_none() {
            return Err(StoreError::Config(
                "sqlite backend requires a path".into(),
            ));
        }
        if self.memory_capacity == 0 {
            return Err(StoreError::Config(
                "memory_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
