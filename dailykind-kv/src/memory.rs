//! In-process expiring store.
//!
//! Scalar keys are held in a [`moka`] cache whose per-entry expiry comes from
//! the TTL passed to [`KvStore::set`]. Sets are plain hash sets behind an
//! async `RwLock` and never expire.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::KvStore;

/// A stored scalar together with the TTL it was written with.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    ttl: Option<Duration>,
}

/// Expiry policy: every write (create or overwrite) restarts the clock with
/// the entry's own TTL, matching `SET key value EX ttl` semantics.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// Process-local [`KvStore`]. Suitable for tests and single-instance deployments.
pub struct MemoryStore {
    entries: Cache<String, Entry>,
    sets: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` scalar entries.
    pub fn new(capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .expire_after(EntryExpiry)
            .build();
        Self {
            entries,
            sets: RwLock::new(HashMap::new()),
        }
    }

    /// Number of members currently in `set_key`.
    pub async fn set_len(&self, set_key: &str) -> usize {
        self.sets
            .read()
            .await
            .get(set_key)
            .map_or(0, HashSet::len)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.entries
            .insert(key.to_owned(), Entry { value, ttl })
            .await;
        Ok(())
    }

    async fn sadd(&self, set_key: &str, member: &str) -> Result<bool> {
        let mut sets = self.sets.write().await;
        Ok(sets
            .entry(set_key.to_owned())
            .or_default()
            .insert(member.to_owned()))
    }

    async fn sismember(&self, set_key: &str, member: &str) -> Result<bool> {
        let sets = self.sets.read().await;
        Ok(sets.get(set_key).is_some_and(|s| s.contains(member)))
    }
}
