//! Error types for the task service.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output, returned in HTTP error bodies, and
//! accessible via [`DailyKindError::code()`].

use dailykind_kv::StoreError;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Generator output was malformed or violated the task schema.
    pub const SCHEMA_INVALID: &str = "SCHEMA_INVALID";

    /// The generation provider could not be reached or returned an HTTP error.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";

    /// Every attempt of one generation call failed.
    pub const GENERATION_EXHAUSTED: &str = "GENERATION_EXHAUSTED";

    /// A rebuild ran out of iterations before collecting enough unique tasks.
    pub const INSUFFICIENT_UNIQUE_TASKS: &str = "INSUFFICIENT_UNIQUE_TASKS";

    /// The HTTP verb is not accepted by the endpoint.
    pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";

    /// The key-value store failed.
    pub const STORE_ERROR: &str = "STORE_ERROR";

    /// Invalid configuration or argument.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// The operation was cancelled before it completed.
    pub const CANCELLED: &str = "CANCELLED";
}

/// Errors produced by the task generation and rotation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DailyKindError {
    /// Generator output was malformed or violated the task schema.
    #[error("[{}] {}", error_codes::SCHEMA_INVALID, .0)]
    Schema(String),

    /// Network or HTTP failure talking to the generation provider.
    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    Provider(String),

    /// All attempts of one generation call failed; carries the last failure.
    #[error(
        "[{}] generation failed after {attempts} attempts: {last_error}",
        error_codes::GENERATION_EXHAUSTED
    )]
    GenerationExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Display form of the final attempt's error.
        last_error: String,
    },

    /// The rebuild loop bound was reached short of the target size.
    #[error(
        "[{}] could not generate enough unique tasks: {accepted}/{requested} after {iterations} iterations",
        error_codes::INSUFFICIENT_UNIQUE_TASKS
    )]
    InsufficientUniqueTasks {
        /// Target list size.
        requested: usize,
        /// Unique tasks accepted before giving up.
        accepted: usize,
        /// Generation rounds performed.
        iterations: u32,
    },

    /// Wrong HTTP verb for an endpoint.
    #[error("[{}] only {allowed} requests are supported, got {method}", error_codes::METHOD_NOT_ALLOWED)]
    MethodNotAllowed {
        /// The verb that was received.
        method: String,
        /// The verb the endpoint accepts.
        allowed: &'static str,
    },

    /// Key-value store failure.
    #[error("[{}] {}", error_codes::STORE_ERROR, .0)]
    Store(#[from] StoreError),

    /// Invalid configuration or argument.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// Cancelled via a cancellation token.
    #[error("[{}] {}", error_codes::CANCELLED, .0)]
    Cancelled(String),
}

impl DailyKindError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema(_) => error_codes::SCHEMA_INVALID,
            Self::Provider(_) => error_codes::PROVIDER_ERROR,
            Self::GenerationExhausted { .. } => error_codes::GENERATION_EXHAUSTED,
            Self::InsufficientUniqueTasks { .. } => error_codes::INSUFFICIENT_UNIQUE_TASKS,
            Self::MethodNotAllowed { .. } => error_codes::METHOD_NOT_ALLOWED,
            Self::Store(_) => error_codes::STORE_ERROR,
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Cancelled(_) => error_codes::CANCELLED,
        }
    }

    /// Returns true if a generation attempt failing with this error may be retried.
    ///
    /// Schema violations are retried like transport failures. Only
    /// cancellation stops the retry loop.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled(_))
    }

    /// HTTP status for this error when surfaced by an edge handler.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MethodNotAllowed { .. } => 405,
            Self::Config(_) => 400,
            _ => 500,
        }
    }
}

/// Convenience alias for service results.
pub type Result<T> = std::result::Result<T, DailyKindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_code_and_display() {
        let err = DailyKindError::Schema("Item exceeds 15 words".into());
        assert_eq!(err.code(), "SCHEMA_INVALID");
        assert_eq!(err.to_string(), "[SCHEMA_INVALID] Item exceeds 15 words");
    }

    #[test]
    fn exhausted_carries_last_error() {
        let err = DailyKindError::GenerationExhausted {
            attempts: 3,
            last_error: "[PROVIDER_ERROR] connection refused".into(),
        };
        assert_eq!(err.code(), "GENERATION_EXHAUSTED");
        let display = err.to_string();
        assert!(display.contains("3 attempts"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn insufficient_unique_display() {
        let err = DailyKindError::InsufficientUniqueTasks {
            requested: 50,
            accepted: 41,
            iterations: 5,
        };
        assert_eq!(
            err.to_string(),
            "[INSUFFICIENT_UNIQUE_TASKS] could not generate enough unique tasks: 41/50 after 5 iterations"
        );
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn method_not_allowed_maps_to_405() {
        let err = DailyKindError::MethodNotAllowed {
            method: "GET".into(),
            allowed: "POST",
        };
        assert_eq!(err.status_code(), 405);
        assert!(err.to_string().contains("only POST requests"));
    }

    #[test]
    fn store_error_converts() {
        let err: DailyKindError = StoreError::Lock("poisoned".into()).into();
        assert_eq!(err.code(), "STORE_ERROR");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn only_cancellation_is_not_retryable() {
        assert!(DailyKindError::Schema("x".into()).is_retryable());
        assert!(DailyKindError::Provider("x".into()).is_retryable());
        assert!(DailyKindError::Config("x".into()).is_retryable());
        assert!(!DailyKindError::Cancelled("shutdown".into()).is_retryable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DailyKindError>();
    }
}
