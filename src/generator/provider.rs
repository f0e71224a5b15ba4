//! Provider trait for the external text-generation capability.
//!
//! A [`TaskProvider`] turns "give me `n` tasks under these constraints" into
//! a raw JSON payload. It does not validate the payload; the
//! [`CandidateGenerator`](super::CandidateGenerator) does.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Constraints every generated batch must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConstraints {
    /// Word limit per item.
    pub max_words: usize,
    /// Name the model is asked to write as.
    pub persona: String,
}

impl Default for GenerationConstraints {
    fn default() -> Self {
        Self {
            max_words: 15,
            persona: "DailyKind".to_owned(),
        }
    }
}

impl GenerationConstraints {
    /// Constraints with the given word limit.
    pub fn with_max_words(max_words: usize) -> Self {
        Self {
            max_words,
            ..Default::default()
        }
    }

    /// System prompt demanding exactly `n` items under these constraints.
    pub fn system_prompt(&self, n: usize) -> String {
        format!(
            "You are {persona}, a generator of concise, real-world kindness acts.\n\
             \n\
             Return an object whose single key is \"tasks\" and whose value is a JSON\n\
             array that obeys ALL of these rules:\n\
             \n\
             - Exactly {n} DIFFERENT items, nothing more, nothing less.\n\
             - Each item at most {max_words} words.\n\
             - Doable by anyone (no money, no special skills).\n\
             - No duplicates or near-duplicates (case-insensitive).\n\
             - Plain sentences only (no numbering, no bullets).\n\
             \n\
             Output ONLY the JSON object: no markdown, no additional keys.",
            persona = self.persona,
            max_words = self.max_words,
        )
    }
}

/// The external generation capability.
#[async_trait]
pub trait TaskProvider: Send + Sync {
    /// Returns the provider name (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Request `n` candidate tasks.
    ///
    /// Returns the decoded payload as-is. Implementations must return
    /// [`Cancelled`](crate::error::DailyKindError::Cancelled) promptly once
    /// `cancel` fires.
    async fn request_batch(
        &self,
        n: usize,
        constraints: &GenerationConstraints,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value>;
}
