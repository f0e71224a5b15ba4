//! Error types for the dailykind-kv crate.
//!
//! Messages are stable and never include stored values, only keys.

/// Errors that can occur while reading or writing the key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The SQLite backend reported an error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem error while opening a durable store.
    #[error("I/O error: {0}")]
    Io(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Lock(String),

    /// Invalid store configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
