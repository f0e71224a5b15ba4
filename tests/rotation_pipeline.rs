//! End-to-end rotation scenarios with scripted providers.
//!
//! Each test wires a real store (memory or SQLite) to the master list
//! manager and daily rotator, with a provider whose batches are produced
//! by a closure so rebuild behaviour can be driven precisely.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use dailykind::config::RotationConfig;
use dailykind::error::{DailyKindError, Result};
use dailykind::history::HISTORY_KEY;
use dailykind::master::{created_key, master_key};
use dailykind::rotation::daily_key;
use dailykind::{
    CandidateGenerator, DailySliceRotator, GenerationConstraints, MasterListManager, RetryPolicy,
    TaskProvider,
};
use dailykind_kv::{KvStore, MemoryStore, StoreConfig, open_store};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

type BatchFn = dyn Fn(usize, usize) -> Result<Value> + Send + Sync;

/// Provider whose `k`-th call (0-based) for `n` items returns `script(n, k)`.
struct ScriptProvider {
    script: Box<BatchFn>,
    calls: AtomicUsize,
    sizes: Mutex<Vec<usize>>,
}

impl ScriptProvider {
    fn new(script: impl Fn(usize, usize) -> Result<Value> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            sizes: Mutex::new(Vec::new()),
        })
    }

    fn sizes(&self) -> Vec<usize> {
        self.sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskProvider for ScriptProvider {
    fn name(&self) -> &str {
        "script"
    }

    async fn request_batch(
        &self,
        n: usize,
        _constraints: &GenerationConstraints,
        _cancel: &CancellationToken,
    ) -> Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().unwrap().push(n);
        (self.script)(n, call)
    }
}

fn numbered(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("{prefix} {i}")).collect()
}

fn manager(store: Arc<dyn KvStore>, provider: Arc<ScriptProvider>) -> Arc<MasterListManager> {
    let generator = CandidateGenerator::new(
        provider,
        GenerationConstraints::default(),
        RetryPolicy::default().with_base_delay_ms(1).with_max_delay_ms(2),
    );
    Arc::new(MasterListManager::new(store, generator, RotationConfig::default()))
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap()
}

#[tokio::test]
async fn seventy_unique_candidates_fill_list_in_one_round() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&StoreConfig::sqlite(dir.path().join("kv.db"))).unwrap();
    let provider = ScriptProvider::new(|n, _| Ok(json!(numbered("Leave a kind note", 0..n))));
    let manager = manager(store.clone(), provider.clone());

    let list = manager
        .ensure_master_list_at(50, t0(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(list.tasks, numbered("Leave a kind note", 0..50));
    assert_eq!(provider.sizes(), vec![70]);
    assert_eq!(store.get(&master_key(50)).await.unwrap().unwrap(), json!(list.tasks));
    assert_eq!(
        store.get(&created_key(50)).await.unwrap().unwrap(),
        json!(t0().timestamp_millis())
    );
    for task in &list.tasks {
        assert!(store.sismember(HISTORY_KEY, &task.to_lowercase()).await.unwrap());
    }
    // Candidates beyond the 50th are not recorded.
    assert!(!store.sismember(HISTORY_KEY, "leave a kind note 50").await.unwrap());
}

#[tokio::test]
async fn short_and_repeated_batches_trigger_top_up_round() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
    let provider = ScriptProvider::new(|n, call| match call {
        0 => Ok(json!(numbered("Smile at someone", 0..40))),
        // Four repeats of accepted tasks in a different case, then new ideas.
        _ => {
            let mut batch = numbered("SMILE AT SOMEONE", 0..4);
            batch.extend(numbered("Compliment a stranger", 0..(n - 4)));
            Ok(json!(batch))
        }
    });
    let manager = manager(store, provider.clone());

    let list = manager
        .ensure_master_list_at(50, t0(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(list.tasks.len(), 50);
    assert_eq!(provider.sizes(), vec![70, 14]);
    assert_eq!(list.tasks[40], "Compliment a stranger 0");
    assert_eq!(list.tasks[49], "Compliment a stranger 9");
}

#[tokio::test]
async fn history_exhaustion_fails_after_five_rounds_without_persisting() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
    for i in 0..10 {
        store.sadd(HISTORY_KEY, &format!("hug a tree {i}")).await.unwrap();
    }
    let provider = ScriptProvider::new(|_, _| Ok(json!(numbered("Hug a tree", 0..10))));
    let manager = manager(store.clone(), provider.clone());

    let err = manager
        .ensure_master_list_at(50, t0(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        DailyKindError::InsufficientUniqueTasks {
            requested,
            accepted,
            iterations,
        } => {
            assert_eq!(requested, 50);
            assert_eq!(accepted, 0);
            assert_eq!(iterations, 5);
        }
        other => panic!("expected InsufficientUniqueTasks, got {other:?}"),
    }
    assert_eq!(provider.sizes(), vec![70; 5]);
    assert!(store.get(&master_key(50)).await.unwrap().is_none());
}

#[tokio::test]
async fn generation_failure_abandons_rebuild_but_keeps_history() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
    let provider = ScriptProvider::new(|n, call| match call {
        0 => Ok(json!(numbered("Call your mum", 0..(n / 2)))),
        _ => Err(DailyKindError::Provider("connection reset".into())),
    });
    let manager = manager(store.clone(), provider.clone());

    let err = manager
        .ensure_master_list_at(50, t0(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "GENERATION_EXHAUSTED");
    // One successful round plus three failed attempts of the second round.
    assert_eq!(provider.sizes().len(), 4);
    assert!(store.get(&master_key(50)).await.unwrap().is_none());
    assert!(store.sismember(HISTORY_KEY, "call your mum 0").await.unwrap());
}

#[tokio::test]
async fn stale_rebuild_never_repeats_previous_tasks() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
    // The model keeps suggesting everything it ever suggested, plus new ideas.
    let provider = ScriptProvider::new(|n, call| {
        let fresh_start = call * 100;
        let mut batch = numbered("Plant a seed", 0..fresh_start.min(60));
        batch.extend(numbered("Plant a seed", fresh_start..fresh_start + n));
        Ok(json!(batch))
    });
    let manager = manager(store, provider);
    let cancel = CancellationToken::new();

    let first = manager.ensure_master_list_at(50, t0(), &cancel).await.unwrap();
    let later = t0() + TimeDelta::days(5) + TimeDelta::minutes(1);
    let second = manager.ensure_master_list_at(50, later, &cancel).await.unwrap();

    assert_eq!(second.created_at, later);
    for task in &second.tasks {
        assert!(!first.tasks.contains(task), "{task} was served twice");
    }
}

#[tokio::test]
async fn daily_windows_advance_each_day_and_clamp() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
    let provider = ScriptProvider::new(|n, _| Ok(json!(numbered("Share a snack", 0..n))));
    let rotator = DailySliceRotator::new(manager(store.clone(), provider.clone()));
    let cancel = CancellationToken::new();

    let day0 = rotator.today_slice_at(50, t0(), &cancel).await.unwrap();
    assert_eq!(day0, numbered("Share a snack", 0..10));

    let day3 = t0() + TimeDelta::days(3) + TimeDelta::hours(1);
    let slice = rotator.today_slice_at(50, day3, &cancel).await.unwrap();
    assert_eq!(slice, numbered("Share a snack", 30..40));

    let day4 = t0() + TimeDelta::days(4) + TimeDelta::hours(20);
    let slice = rotator.today_slice_at(50, day4, &cancel).await.unwrap();
    assert_eq!(slice, numbered("Share a snack", 40..50));
    assert!(store.get(&daily_key(day4)).await.unwrap().is_some());

    assert_eq!(provider.sizes().len(), 1);
}

#[tokio::test]
async fn same_day_requests_share_the_cached_slice() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
    let provider = ScriptProvider::new(|n, _| Ok(json!(numbered("Write a thank-you", 0..n))));
    let rotator = DailySliceRotator::new(manager(store.clone(), provider));
    let cancel = CancellationToken::new();

    let morning = rotator.today_slice_at(50, t0(), &cancel).await.unwrap();
    // Replace the master list behind the rotator's back; the cache must win.
    store
        .set(&master_key(50), json!(numbered("other", 0..50)), None)
        .await
        .unwrap();
    let evening = rotator
        .today_slice_at(50, t0() + TimeDelta::hours(10), &cancel)
        .await
        .unwrap();
    assert_eq!(morning, evening);
}
