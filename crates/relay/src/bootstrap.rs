//! AppState construction shared by `serve` and `run`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use pr_domain::config::{Config, ConfigSeverity};
use pr_providers::{HuggingFaceProvider, InferenceProvider, RetryPolicy, RetryingProvider};

use crate::runtime::{ConversationStore, Summarizer, TurnConfig, TurnProcessor};
use crate::state::AppState;

const LOCK_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

/// Validate config, build the inference client and return a fully-wired
/// [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Inference client ─────────────────────────────────────────────
    let hf = HuggingFaceProvider::from_config(&config.inference)
        .context("initializing Hugging Face provider")?;
    let policy = RetryPolicy::from_config(&config.inference);
    tracing::info!(
        base_url = %config.inference.base_url,
        chat_model = %config.inference.chat_model,
        max_attempts = policy.max_attempts,
        "inference provider ready"
    );
    let provider: Arc<dyn InferenceProvider> =
        Arc::new(RetryingProvider::new(Arc::new(hf), policy));

    Ok(build_with_provider(config, provider))
}

/// Wire the runtime around an already-built provider.
pub fn build_with_provider(config: Arc<Config>, provider: Arc<dyn InferenceProvider>) -> AppState {
    let registry = Arc::new(config.persona.registry());

    let summarizer = Arc::new(Summarizer::new(
        provider.clone(),
        config.inference.summary_model.clone(),
        config.memory.summary_placeholder.clone(),
    ));
    let store = Arc::new(ConversationStore::new(
        config.memory.clone(),
        registry.default_mode(),
        summarizer,
    ));
    tracing::debug!(
        max_recent = config.memory.max_recent,
        keep_recent = config.memory.keep_recent,
        default_mode = %registry.default_mode(),
        "conversation store ready"
    );

    let processor = Arc::new(TurnProcessor::new(
        store,
        registry,
        provider,
        TurnConfig::from_config(&config),
    ));

    AppState { config, processor }
}

/// Periodic housekeeping for long-running mode.
pub fn spawn_background_tasks(state: &AppState) {
    let processor = state.processor.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LOCK_PRUNE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let pruned = processor.locks().prune_idle();
            tracing::debug!(
                pruned,
                users = processor.store().len(),
                "pruned idle user locks"
            );
        }
    });
}
