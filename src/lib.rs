//! DailyKind: a rotating list of small daily kindness tasks.
//!
//! A master list of unique tasks is generated by a language model, kept for
//! a few days, and served ten tasks at a time, one window per UTC day.
//!
//! # Architecture
//!
//! Requests flow one way through independent layers:
//! - **Edge**: axum handlers for `POST /generate` and `GET /daily` ([`server`])
//! - **Rotation**: picks and caches today's window ([`rotation`])
//! - **Master list**: reuses a fresh list or rebuilds one ([`master`])
//! - **Generation**: validated, retried provider calls ([`generator`])
//! - **History**: every task ever accepted, by canonical form ([`history`], [`canon`])
//!
//! State lives in a [`dailykind_kv::KvStore`] (in-memory or SQLite).

pub mod canon;
pub mod config;
pub mod error;
pub mod generator;
pub mod history;
pub mod master;
pub mod rotation;
pub mod server;

pub use config::ServiceConfig;
pub use error::{DailyKindError, Result};
pub use generator::{CandidateGenerator, GenerationConstraints, RetryPolicy, TaskProvider};
pub use history::HistoryStore;
pub use master::{MasterList, MasterListManager, MasterListState};
pub use rotation::DailySliceRotator;
pub use server::{AppState, TaskServer};
