mod inference;
mod memory;
mod observability;
mod persona;
mod telegram;

pub use inference::*;
pub use memory::*;
pub use observability::*;
pub use persona::*;
pub use telegram::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Env vars that override the model identifiers, one per model role.
pub const ENV_CHAT_MODEL: &str = "HF_CHAT_MODEL";
pub const ENV_SUMMARY_MODEL: &str = "HF_SUMMARY_MODEL";
pub const ENV_ASR_MODEL: &str = "HF_ASR_MODEL";

impl Config {
    /// Apply model overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply model overrides from an arbitrary lookup. Empty values are
    /// ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(model) = get(ENV_CHAT_MODEL) {
            self.inference.chat_model = model;
        }
        if let Some(model) = get(ENV_SUMMARY_MODEL) {
            self.inference.summary_model = model;
        }
        if let Some(model) = get(ENV_ASR_MODEL) {
            self.inference.transcription_model = model;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: &str| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message: message.into(),
            });
        };

        if self.memory.max_recent == 0 {
            push(
                ConfigSeverity::Error,
                "memory.max_recent",
                "max_recent must be greater than 0",
            );
        }
        if self.memory.keep_recent > self.memory.max_recent {
            push(
                ConfigSeverity::Error,
                "memory.keep_recent",
                "keep_recent must not exceed max_recent",
            );
        } else if self.memory.keep_recent == self.memory.max_recent {
            push(
                ConfigSeverity::Warning,
                "memory.keep_recent",
                "keep_recent equals max_recent; each compaction evicts a single turn",
            );
        }
        if self.memory.summary_placeholder.trim().is_empty() {
            push(
                ConfigSeverity::Error,
                "memory.summary_placeholder",
                "placeholder must not be empty",
            );
        }

        if self.inference.base_url.is_empty() {
            push(
                ConfigSeverity::Error,
                "inference.base_url",
                "base_url must not be empty",
            );
        }
        for (field, model) in [
            ("inference.chat_model", &self.inference.chat_model),
            ("inference.summary_model", &self.inference.summary_model),
            ("inference.transcription_model", &self.inference.transcription_model),
        ] {
            if model.trim().is_empty() {
                push(ConfigSeverity::Error, field, "model identifier must not be empty");
            }
        }
        if self.inference.max_attempts == 0 {
            push(
                ConfigSeverity::Error,
                "inference.max_attempts",
                "max_attempts must be at least 1",
            );
        }
        if self.inference.request_timeout_ms == 0 {
            push(
                ConfigSeverity::Error,
                "inference.request_timeout_ms",
                "request timeout must be greater than 0",
            );
        }
        if self.inference.auth.key.is_some() {
            push(
                ConfigSeverity::Warning,
                "inference.auth.key",
                "API key stored in plaintext config; prefer auth.env",
            );
        }

        let attempts = u64::from(self.inference.max_attempts);
        let worst_case = self
            .inference
            .request_timeout_ms
            .saturating_mul(attempts)
            .saturating_add(
                self.inference
                    .backoff_ms
                    .saturating_mul(attempts.saturating_sub(1)),
            );
        if self.replies.turn_timeout_ms < worst_case {
            push(
                ConfigSeverity::Warning,
                "replies.turn_timeout_ms",
                "turn timeout is shorter than the inference retry budget; late attempts will be cut off",
            );
        }

        if self.telegram.token.is_some() {
            push(
                ConfigSeverity::Warning,
                "telegram.token",
                "bot token stored in plaintext config; prefer telegram.token_env",
            );
        }

        errors
    }
}
