//! OpenAI Chat Completions task provider.
//!
//! Sends one non-streaming `/v1/chat/completions` request in JSON mode and
//! returns the value of the `tasks` key from the model's JSON reply.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dailykind::config::ProviderConfig;
//! use dailykind::generator::openai::OpenAiTaskProvider;
//! use dailykind::generator::{GenerationConstraints, TaskProvider};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> dailykind::Result<()> {
//! let provider = OpenAiTaskProvider::new(ProviderConfig::default(), "sk-...")?;
//! let payload = provider
//!     .request_batch(10, &GenerationConstraints::default(), &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderConfig;
use crate::error::{DailyKindError, Result};
use crate::generator::provider::{GenerationConstraints, TaskProvider};

/// User turn sent after the system prompt.
const USER_PROMPT: &str = "Generate the list now.";

// ── Response types ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Request building ──────────────────────────────────────────

/// Build the JSON request body for a batch of `n` tasks.
pub fn build_batch_request(
    config: &ProviderConfig,
    n: usize,
    constraints: &GenerationConstraints,
) -> Value {
    let mut body = serde_json::json!({
        "model": config.model,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": constraints.system_prompt(n) },
            { "role": "user", "content": USER_PROMPT },
        ],
    });
    if let Some(seed) = config.seed
        && let Some(obj) = body.as_object_mut()
    {
        obj.insert("seed".into(), serde_json::json!(seed));
    }
    body
}

/// Extract the `tasks` payload from a chat completion response body.
///
/// # Errors
///
/// Returns [`DailyKindError::Schema`] if the body is not a completion, has
/// no content, the content is not JSON, or the JSON has no `tasks` key.
pub fn extract_tasks_payload(body: &str) -> Result<Value> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| DailyKindError::Schema(format!("malformed completion: {e}")))?;
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| DailyKindError::Schema("completion has no content".into()))?;
    let mut reply: Value = serde_json::from_str(&content)
        .map_err(|e| DailyKindError::Schema(format!("content is not JSON: {e}")))?;
    reply
        .get_mut("tasks")
        .map(Value::take)
        .ok_or_else(|| DailyKindError::Schema("reply has no \"tasks\" key".into()))
}

/// Extract an error message from an OpenAI error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

// ── Provider ──────────────────────────────────────────────────

/// [`TaskProvider`] backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiTaskProvider {
    config: ProviderConfig,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiTaskProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTaskProvider")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl OpenAiTaskProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns [`DailyKindError::Config`] if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DailyKindError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| DailyKindError::Provider(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DailyKindError::Provider(format!("OpenAI response read failed: {e}")))?;
        if !status.is_success() {
            return Err(DailyKindError::Provider(format!(
                "OpenAI HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&text)
            )));
        }
        extract_tasks_payload(&text)
    }
}

#[async_trait]
impl TaskProvider for OpenAiTaskProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn request_batch(
        &self,
        n: usize,
        constraints: &GenerationConstraints,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let body = build_batch_request(&self.config, n, constraints);
        tokio::select! {
            () = cancel.cancelled() => Err(DailyKindError::Cancelled("generation request cancelled".into())),
            result = self.send(&body) => result,
        }
    }
}
