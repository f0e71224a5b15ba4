//! DailyKind HTTP server binary.
//!
//! Configuration is read from the TOML file named by `DAILYKIND_CONFIG`,
//! else from the default config path if it exists, else built-in defaults.
//! The provider API key comes from the config or `OPENAI_API_KEY`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dailykind::config::API_KEY_ENV;
use dailykind::generator::openai::OpenAiTaskProvider;
use dailykind::{
    AppState, CandidateGenerator, DailySliceRotator, GenerationConstraints, MasterListManager,
    ServiceConfig, TaskServer,
};
use tokio_util::sync::CancellationToken;

const CONFIG_ENV: &str = "DAILYKIND_CONFIG";

fn load_config() -> anyhow::Result<ServiceConfig> {
    let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let path = explicit.clone().unwrap_or_else(ServiceConfig::default_config_path);
    if explicit.is_some() || path.exists() {
        tracing::info!(path = %path.display(), "loading config");
        return ServiceConfig::from_file(&path).with_context(|| format!("loading {}", path.display()));
    }
    tracing::info!("no config file, using defaults");
    Ok(ServiceConfig::default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    config.validate().context("invalid configuration")?;

    let store = dailykind_kv::open_store(&config.store).context("opening store")?;
    tracing::info!(backend = store.name(), "store ready");

    let api_key = config
        .provider
        .resolve_api_key()
        .with_context(|| format!("no provider API key: set provider.api_key or {API_KEY_ENV}"))?;
    let provider = OpenAiTaskProvider::new(config.provider.clone(), api_key)?;

    let generator = CandidateGenerator::new(
        Arc::new(provider),
        GenerationConstraints::with_max_words(config.rotation.max_words),
        config.retry.clone(),
    );
    let manager = MasterListManager::new(store, generator, config.rotation.clone());
    let rotator = Arc::new(DailySliceRotator::new(Arc::new(manager)));

    let cancel = CancellationToken::new();
    let mut server = TaskServer::start(AppState::new(rotator), &config.server, cancel.clone()).await?;

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    tracing::info!("shutting down");
    cancel.cancel();
    server.stopped().await;

    tracing::info!("dailykind-server shut down cleanly");
    Ok(())
}
