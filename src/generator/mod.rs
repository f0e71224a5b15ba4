//! Candidate generation with validation and retry.
//!
//! [`CandidateGenerator`] issues one request for `n` tasks to a
//! [`TaskProvider`], validates the payload, and retries any failure with
//! exponential backoff. It knows nothing about task history.

pub mod openai;
pub mod provider;
pub mod retry;
pub mod validation;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{DailyKindError, Result};

pub use provider::{GenerationConstraints, TaskProvider};
pub use retry::RetryPolicy;
pub use validation::validate_tasks;

/// Validating, retrying front end to a [`TaskProvider`].
#[derive(Clone)]
pub struct CandidateGenerator {
    provider: Arc<dyn TaskProvider>,
    constraints: GenerationConstraints,
    retry: RetryPolicy,
}

impl std::fmt::Debug for CandidateGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateGenerator")
            .field("provider", &self.provider.name())
            .field("constraints", &self.constraints)
            .field("retry", &self.retry)
            .finish()
    }
}

impl CandidateGenerator {
    /// Create a generator over `provider`.
    pub fn new(
        provider: Arc<dyn TaskProvider>,
        constraints: GenerationConstraints,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            constraints,
            retry,
        }
    }

    /// The constraints sent with every request.
    pub fn constraints(&self) -> &GenerationConstraints {
        &self.constraints
    }

    /// Generate `n` candidate tasks.
    ///
    /// The batch length is not enforced; the caller filters and tops up.
    ///
    /// # Errors
    ///
    /// - [`DailyKindError::Config`] if `n` is 0
    /// - [`DailyKindError::Cancelled`] if `cancel` fires
    /// - [`DailyKindError::GenerationExhausted`] once every attempt has failed
    pub async fn generate(&self, n: usize, cancel: &CancellationToken) -> Result<Vec<String>> {
        if n == 0 {
            return Err(DailyKindError::Config(
                "batch size must be at least 1".into(),
            ));
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.attempt(n, cancel).await {
                Ok(tasks) => {
                    debug!(provider = self.provider.name(), requested = n, received = tasks.len(), attempt, "batch generated");
                    return Ok(tasks);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(provider = self.provider.name(), attempts = attempt, error = %err, "generation attempts exhausted");
                return Err(DailyKindError::GenerationExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = self.retry.delay_after_attempt(attempt);
            warn!(
                provider = self.provider.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "generation attempt failed, backing off"
            );
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(DailyKindError::Cancelled("cancelled during generation backoff".into()));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn attempt(&self, n: usize, cancel: &CancellationToken) -> Result<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(DailyKindError::Cancelled("cancelled before generation".into()));
        }
        let payload = self
            .provider
            .request_batch(n, &self.constraints, cancel)
            .await?;
        validate_tasks(&payload, None, self.constraints.max_words)
    }
}
