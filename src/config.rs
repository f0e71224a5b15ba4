//! Configuration types for the task service.

use std::path::PathBuf;

use dailykind_kv::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DailyKindError, Result};
use crate::generator::retry::RetryPolicy;

/// Environment variable consulted when `provider.api_key` is unset.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Generation provider settings.
    pub provider: ProviderConfig,
    /// Retry policy for one generation call.
    pub retry: RetryPolicy,
    /// Master list sizing and rotation cadence.
    pub rotation: RotationConfig,
    /// Shared key-value store.
    pub store: StoreConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind. `0` lets the OS pick one.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8787,
        }
    }
}

/// OpenAI-compatible chat completions provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL without the `/v1/...` suffix.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API key. Falls back to [`API_KEY_ENV`] when `None`.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token budget. A 70-item batch needs a few thousand.
    pub max_tokens: u32,
    /// Sampling seed, for providers that honour one.
    pub seed: Option<u64>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_owned(),
            model: "gpt-4.1-mini".to_owned(),
            api_key: None,
            temperature: 0.8,
            max_tokens: 8000,
            seed: Some(42),
            timeout_secs: 60,
        }
    }
}

impl ProviderConfig {
    /// The configured API key, or the value of [`API_KEY_ENV`].
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

/// Sizing of the master list and its daily windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Tasks in a full master list.
    pub master_size: usize,
    /// Tasks served per day.
    pub window_size: usize,
    /// Days one master list covers.
    pub window_count: usize,
    /// Age in days at which a master list is stale.
    pub freshness_days: u32,
    /// Store TTL in days for the master list and its timestamp.
    pub retention_days: u32,
    /// Candidates requested per missing task.
    pub oversample_factor: f64,
    /// Generation rounds per rebuild before giving up.
    pub max_iterations: u32,
    /// Word limit per task.
    pub max_words: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            master_size: 50,
            window_size: 10,
            window_count: 5,
            freshness_days: 5,
            retention_days: 6,
            oversample_factor: 1.4,
            max_iterations: 5,
            max_words: 15,
        }
    }
}

impl RotationConfig {
    /// Validates the rotation parameters.
    ///
    /// Checks:
    /// - all counts are at least 1
    /// - the windows exactly tile the master list
    /// - retention outlives freshness
    /// - `oversample_factor` is finite and at least 1.0
    pub fn validate(&self) -> Result<()> {
        if self.master_size == 0
            || self.window_size == 0
            || self.window_count == 0
            || self.max_iterations == 0
            || self.max_words == 0
            || self.freshness_days == 0
        {
            return Err(DailyKindError::Config(
                "rotation sizes, iterations, word limit and freshness must be at least 1".into(),
            ));
        }
        if self.window_size.saturating_mul(self.window_count) != self.master_size {
            return Err(DailyKindError::Config(format!(
                "window_size * window_count must equal master_size ({} * {} != {})",
                self.window_size, self.window_count, self.master_size
            )));
        }
        if self.retention_days <= self.freshness_days {
            return Err(DailyKindError::Config(
                "retention_days must be greater than freshness_days".into(),
            ));
        }
        if !self.oversample_factor.is_finite() || self.oversample_factor < 1.0 {
            return Err(DailyKindError::Config(
                "oversample_factor must be at least 1.0".into(),
            ));
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DailyKindError::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| DailyKindError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DailyKindError::Config(format!("create {}: {e}", parent.display())))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DailyKindError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| DailyKindError::Config(format!("write {}: {e}", path.display())))
    }

    /// Returns the default config file path: `<config dir>/dailykind/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("dailykind")
            .join("config.toml")
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.rotation.validate()?;
        self.retry.validate()?;
        self.store
            .validate()
            .map_err(|e| DailyKindError::Config(e.to_string()))?;
        if self.provider.timeout_secs == 0 {
            return Err(DailyKindError::Config(
                "provider.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
