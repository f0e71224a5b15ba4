//! Exponential backoff between generation attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DailyKindError, Result};

/// Default number of attempts per generation call, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt.
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Default cap on a single delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 2000;

/// Default growth factor between consecutive delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Retry policy for one generation call.
///
/// # Examples
///
/// ```
/// use dailykind::generator::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay_after_attempt(1), Duration::from_millis(500));
/// assert_eq!(policy.delay_after_attempt(2), Duration::from_millis(1000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Delay in milliseconds after the first failed attempt.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth).
    pub max_delay_ms: u64,
    /// Backoff multiplier (2.0 for doubling).
    pub backoff_multiplier: f64,
    /// Random extra delay as a fraction of the computed delay (0.0 disables).
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_ratio: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Set the total number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay in milliseconds.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the maximum delay in milliseconds.
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Set the jitter ratio.
    pub fn with_jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-based) before the next one.
    ///
    /// Formula: `min(base * multiplier^(attempt - 1), max_delay)` plus up to
    /// `jitter_ratio` of that value at random.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.base_delay_ms as f64;
        let exp = self
            .backoff_multiplier
            .powi(i32::try_from(attempt - 1).unwrap_or(i32::MAX));
        let delay = (base * exp).min(self.max_delay_ms as f64);

        let jitter = if self.jitter_ratio > 0.0 {
            delay * rand::random::<f64>() * self.jitter_ratio
        } else {
            0.0
        };

        Duration::from_millis((delay + jitter) as u64)
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DailyKindError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(DailyKindError::Config(
                "retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(DailyKindError::Config(
                "retry.jitter_ratio must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }
}
