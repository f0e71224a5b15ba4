//! Daily slice selection over the current master list.
//!
//! Day `d` (counted in whole 24h periods since the master list was created,
//! clamped to the last window) gets tasks `[d * window, (d + 1) * window)`.
//! The chosen slice is cached under `daily:YYYY-MM-DD` until the next UTC
//! midnight so every request on one UTC day sees the same tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use dailykind_kv::KvStore;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::master::MasterListManager;

const MILLIS_PER_DAY: i64 = 86_400_000;
const SECS_PER_DAY: i64 = 86_400;

/// Which window of the master list is active at `now`.
///
/// `floor(elapsed_ms / 86_400_000)` clamped to `0..window_count`. A
/// creation time in the future yields 0.
pub fn day_index(created_at: DateTime<Utc>, now: DateTime<Utc>, window_count: usize) -> usize {
    let elapsed_days = (now - created_at).num_milliseconds().div_euclid(MILLIS_PER_DAY);
    let last = window_count.saturating_sub(1) as i64;
    elapsed_days.clamp(0, last) as usize
}

/// Whole seconds from `now` until the next UTC midnight, in `0..86_400`.
pub fn seconds_until_next_utc_midnight(now: DateTime<Utc>) -> u64 {
    let tomorrow = now.date_naive() + TimeDelta::days(1);
    let midnight = tomorrow.and_time(NaiveTime::MIN).and_utc();
    let secs = (midnight - now).num_milliseconds() / 1000;
    secs.clamp(0, SECS_PER_DAY - 1) as u64
}

/// Cache key of the slice served on the UTC date of `now`.
pub fn daily_key(now: DateTime<Utc>) -> String {
    format!("daily:{}", now.format("%Y-%m-%d"))
}

/// The `index`-th window of `window` tasks, truncated at the end of `tasks`.
pub fn slice_window(tasks: &[String], index: usize, window: usize) -> Vec<String> {
    let start = index.saturating_mul(window).min(tasks.len());
    let end = start.saturating_add(window).min(tasks.len());
    tasks[start..end].to_vec()
}

/// Serves today's window of the master list, cached per UTC day.
pub struct DailySliceRotator {
    manager: Arc<MasterListManager>,
}

impl std::fmt::Debug for DailySliceRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailySliceRotator")
            .field("manager", &self.manager)
            .finish()
    }
}

impl DailySliceRotator {
    /// Rotator over `manager`'s lists, caching in the manager's store.
    pub fn new(manager: Arc<MasterListManager>) -> Self {
        Self { manager }
    }

    /// The underlying master list manager.
    pub fn manager(&self) -> &Arc<MasterListManager> {
        &self.manager
    }

    /// Today's tasks from a master list of `count` tasks.
    pub async fn today_slice(&self, count: usize, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.today_slice_at(count, Utc::now(), cancel).await
    }

    /// [`today_slice`](Self::today_slice) with an explicit clock.
    ///
    /// A cached slice for the current UTC date is returned as-is. Otherwise
    /// the master list is ensured (possibly rebuilding it), the active
    /// window is cut and cached until the next UTC midnight.
    ///
    /// # Errors
    ///
    /// Propagates every error of
    /// [`MasterListManager::ensure_master_list_at`] and store failures.
    pub async fn today_slice_at(
        &self,
        count: usize,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let key = daily_key(now);
        let store = self.manager.store();
        let rotation = self.manager.rotation();

        if let Some(cached) = store.get(&key).await? {
            match serde_json::from_value::<Vec<String>>(cached) {
                Ok(slice) if !slice.is_empty() => {
                    debug!(key, "serving cached daily slice");
                    return Ok(slice);
                }
                Ok(_) => debug!(key, "cached daily slice is empty, recomputing"),
                Err(e) => warn!(key, error = %e, "cached daily slice is malformed, recomputing"),
            }
        }

        let master = self.manager.ensure_master_list_at(count, now, cancel).await?;
        let index = day_index(master.created_at, now, rotation.window_count);
        let slice = slice_window(&master.tasks, index, rotation.window_size);

        let ttl = seconds_until_next_utc_midnight(now);
        if ttl > 0 {
            store
                .set(&key, Value::from(slice.clone()), Some(Duration::from_secs(ttl)))
                .await?;
        }
        info!(key, day_index = index, tasks = slice.len(), ttl_secs = ttl, "daily slice selected");
        Ok(slice)
    }
}
