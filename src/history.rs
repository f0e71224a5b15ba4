//! Append-only record of every task ever accepted into a master list.
//!
//! Stored as a set of canonical forms with no expiry. Entries are never
//! removed, so a task can appear in at most one master list over the
//! lifetime of the store.

use std::sync::Arc;

use dailykind_kv::KvStore;

use crate::error::Result;

/// Store key of the history set.
pub const HISTORY_KEY: &str = "task-history";

/// Thin typed view over the history set.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KvStore>,
}

impl HistoryStore {
    /// History backed by `store`.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Whether `canonical` has ever been accepted.
    pub async fn contains(&self, canonical: &str) -> Result<bool> {
        Ok(self.store.sismember(HISTORY_KEY, canonical).await?)
    }

    /// Record `canonical` as accepted. Adding an existing entry is a no-op.
    pub async fn add(&self, canonical: &str) -> Result<()> {
        self.store.sadd(HISTORY_KEY, canonical).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use dailykind_kv::MemoryStore;

    #[tokio::test]
    async fn add_then_contains() {
        let history = HistoryStore::new(Arc::new(MemoryStore::default()));
        assert!(!history.contains("smile at a stranger.").await.unwrap());
        history.add("smile at a stranger.").await.unwrap();
        assert!(history.contains("smile at a stranger.").await.unwrap());
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let store = Arc::new(MemoryStore::default());
        let history = HistoryStore::new(store.clone());
        history.add("x").await.unwrap();
        history.add("x").await.unwrap();
        assert_eq!(store.set_len(HISTORY_KEY).await, 1);
    }
}
