//! Master list lifecycle: inspect, reuse while fresh, rebuild when absent or stale.
//!
//! # State machine
//!
//! ```text
//! ┌────────┐                  ┌────────────┐  success   ┌───────┐
//! │ Absent ├─────────────────►│ Rebuilding ├───────────►│ Fresh │
//! └────────┘                  └─────▲──────┘            └───┬───┘
//!                                   │                       │ age >= freshness
//!                             ┌─────┴─┐                     │
//!                             │ Stale │◄────────────────────┘
//!                             └───────┘
//! ```
//!
//! Rebuilding is never persisted. Concurrent requests that both observe
//! `Absent`/`Stale` both rebuild; the last write wins and each write is a
//! complete, valid list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dailykind_kv::KvStore;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::canon::canon;
use crate::config::RotationConfig;
use crate::error::{DailyKindError, Result};
use crate::generator::CandidateGenerator;
use crate::generator::validation::validate_list;
use crate::history::HistoryStore;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Store key of the master list for `count`.
pub fn master_key(count: usize) -> String {
    format!("tasks:{count}")
}

/// Store key of the master list creation timestamp for `count`.
pub fn created_key(count: usize) -> String {
    format!("tasks:{count}:created")
}

/// Number of candidates to request when `missing` tasks are still needed.
///
/// `ceil(missing * factor)`, at least 1. A tiny epsilon absorbs float
/// artefacts such as `10 * 1.4 = 14.000000000000002`.
pub fn oversampled(missing: usize, factor: f64) -> usize {
    let wanted = (missing as f64 * factor - 1e-9).ceil();
    (wanted as usize).max(1)
}

/// A complete master list and when it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterList {
    /// Tasks in rotation order.
    pub tasks: Vec<String>,
    /// Creation time, millisecond precision.
    pub created_at: DateTime<Utc>,
}

/// What the store currently holds for a given list size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterListState {
    /// No usable list (missing, malformed, wrong size, or no timestamp).
    Absent,
    /// A list younger than the freshness window.
    Fresh(MasterList),
    /// A list at or past the freshness window.
    Stale(MasterList),
}

/// Ensures a fresh master list exists, rebuilding it from the generator when needed.
pub struct MasterListManager {
    store: Arc<dyn KvStore>,
    history: HistoryStore,
    generator: CandidateGenerator,
    rotation: RotationConfig,
}

impl std::fmt::Debug for MasterListManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterListManager")
            .field("store", &self.store.name())
            .field("generator", &self.generator)
            .field("rotation", &self.rotation)
            .finish()
    }
}

impl MasterListManager {
    /// Create a manager. History lives in the same store as the list.
    pub fn new(store: Arc<dyn KvStore>, generator: CandidateGenerator, rotation: RotationConfig) -> Self {
        Self {
            history: HistoryStore::new(store.clone()),
            store,
            generator,
            rotation,
        }
    }

    /// Rotation parameters in effect.
    pub fn rotation(&self) -> &RotationConfig {
        &self.rotation
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Classify what the store holds for `count` at time `now`.
    pub async fn inspect(&self, count: usize, now: DateTime<Utc>) -> Result<MasterListState> {
        let Some(raw_list) = self.store.get(&master_key(count)).await? else {
            return Ok(MasterListState::Absent);
        };
        let tasks: Vec<String> = match serde_json::from_value(raw_list) {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(count, error = %e, "stored master list is malformed, treating as absent");
                return Ok(MasterListState::Absent);
            }
        };
        if tasks.len() != count {
            warn!(count, stored = tasks.len(), "stored master list has wrong size, treating as absent");
            return Ok(MasterListState::Absent);
        }

        let created_ms = self
            .store
            .get(&created_key(count))
            .await?
            .as_ref()
            .and_then(timestamp_millis)
            .filter(|ms| *ms > 0);
        let Some(created_at) = created_ms.and_then(DateTime::from_timestamp_millis) else {
            debug!(count, "master list has no usable timestamp, treating as absent");
            return Ok(MasterListState::Absent);
        };

        let list = MasterList { tasks, created_at };
        if now - created_at >= self.freshness() {
            Ok(MasterListState::Stale(list))
        } else {
            Ok(MasterListState::Fresh(list))
        }
    }

    /// Return a fresh list of exactly `count` tasks, rebuilding if needed.
    pub async fn ensure_master_list(&self, count: usize, cancel: &CancellationToken) -> Result<MasterList> {
        self.ensure_master_list_at(count, Utc::now(), cancel).await
    }

    /// [`ensure_master_list`](Self::ensure_master_list) with an explicit clock.
    ///
    /// # Errors
    ///
    /// - [`DailyKindError::Config`] if `count` is 0
    /// - [`DailyKindError::GenerationExhausted`] if one generation call fails
    ///   every attempt; the rebuild is abandoned
    /// - [`DailyKindError::InsufficientUniqueTasks`] if the iteration budget
    ///   runs out before `count` unique tasks are collected
    pub async fn ensure_master_list_at(
        &self,
        count: usize,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<MasterList> {
        if count == 0 {
            return Err(DailyKindError::Config("count must be at least 1".into()));
        }
        match self.inspect(count, now).await? {
            MasterListState::Fresh(list) => {
                debug!(count, created_at = %list.created_at, "master list is fresh");
                Ok(list)
            }
            MasterListState::Stale(list) => {
                info!(count, created_at = %list.created_at, "master list is stale, rebuilding");
                self.rebuild(count, now, cancel).await
            }
            MasterListState::Absent => {
                info!(count, "no master list, building");
                self.rebuild(count, now, cancel).await
            }
        }
    }

    /// Build and persist a brand-new list of `count` tasks.
    ///
    /// History additions made before a failure are kept.
    async fn rebuild(&self, count: usize, now: DateTime<Utc>, cancel: &CancellationToken) -> Result<MasterList> {
        let mut accepted: Vec<String> = Vec::with_capacity(count);
        let mut accepted_canon: HashSet<String> = HashSet::with_capacity(count);
        let mut iterations = 0;

        while accepted.len() < count && iterations < self.rotation.max_iterations {
            iterations += 1;
            let pull = oversampled(count - accepted.len(), self.rotation.oversample_factor);
            let batch = self.generator.generate(pull, cancel).await?;
            let received = batch.len();
            let before = accepted.len();

            for idea in batch {
                if accepted.len() == count {
                    break;
                }
                let canonical = canon(&idea);
                if accepted_canon.contains(&canonical) {
                    debug!(iteration = iterations, "candidate duplicates this rebuild, skipped");
                    continue;
                }
                if self.history.contains(&canonical).await? {
                    debug!(iteration = iterations, "candidate already in history, skipped");
                    continue;
                }
                self.history.add(&canonical).await?;
                accepted_canon.insert(canonical);
                accepted.push(idea);
            }

            info!(
                count,
                iteration = iterations,
                requested = pull,
                received,
                accepted = accepted.len() - before,
                total = accepted.len(),
                "rebuild iteration finished"
            );
        }

        if accepted.len() < count {
            warn!(count, accepted = accepted.len(), iterations, "rebuild abandoned");
            return Err(DailyKindError::InsufficientUniqueTasks {
                requested: count,
                accepted: accepted.len(),
                iterations,
            });
        }

        validate_list(&accepted, count, self.generator.constraints().max_words)?;

        let created_ms = now.timestamp_millis();
        let retention = Some(Duration::from_secs(
            u64::from(self.rotation.retention_days) * SECS_PER_DAY,
        ));
        self.store
            .set(&master_key(count), Value::from(accepted.clone()), retention)
            .await?;
        self.store
            .set(&created_key(count), Value::from(created_ms), retention)
            .await?;

        info!(count, iterations, "master list rebuilt");
        Ok(MasterList {
            tasks: accepted,
            created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or(now),
        })
    }

    fn freshness(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.rotation.freshness_days))
    }
}

/// Read an epoch-millisecond timestamp stored as a JSON number or numeric string.
fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
