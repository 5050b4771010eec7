//! Bounded retry for inference calls.
//!
//! [`RetryingProvider`] wraps any [`InferenceProvider`] and re-issues a
//! failed call up to `max_attempts` times with a fixed backoff. Every
//! attempt is bounded by `attempt_timeout`, so a hung connection surfaces
//! as [`Error::Timeout`] instead of stalling the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pr_domain::config::InferenceConfig;
use pr_domain::error::{Error, Result};
use pr_domain::trace::TraceEvent;

use crate::traits::{GenerateRequest, InferenceProvider, TranscribeRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Treated as at least 1.
    pub max_attempts: u32,
    /// Sleep between attempts.
    pub backoff: Duration,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &InferenceConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff: Duration::from_millis(cfg.backoff_ms),
            attempt_timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }

    /// Determine if an error is worth another attempt (timeouts, network
    /// failures, rate limiting and 5xx responses).
    pub fn is_retriable(err: &Error) -> bool {
        match err {
            Error::Timeout(_) | Error::Http(_) => true,
            Error::Provider { message, .. } => {
                message.starts_with("HTTP 5")
                    || message.starts_with("HTTP 429")
                    || message.contains("currently loading")
            }
            _ => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&InferenceConfig::default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Decorator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RetryingProvider {
    inner: Arc<dyn InferenceProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn InferenceProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn with_retries<F, Fut>(&self, model: &str, mut call: F) -> Result<String>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<String>> + Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            let result = match tokio::time::timeout(self.policy.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "provider '{}' timed out after {}ms",
                    self.inner.provider_id(),
                    self.policy.attempt_timeout.as_millis()
                ))),
            };

            TraceEvent::InferenceRequest {
                provider: self.inner.provider_id().to_string(),
                model: model.to_string(),
                attempt,
                duration_ms: start.elapsed().as_millis() as u64,
                ok: result.is_ok(),
            }
            .emit();

            match result {
                Ok(text) => return Ok(text),
                Err(e) if attempt < max_attempts && RetryPolicy::is_retriable(&e) => {
                    tracing::warn!(
                        provider = %self.inner.provider_id(),
                        attempt,
                        max_attempts,
                        error = %e,
                        "inference attempt failed, retrying"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait::async_trait]
impl InferenceProvider for RetryingProvider {
    async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        let model = req.model.clone().unwrap_or_default();
        self.with_retries(&model, || self.inner.generate(req)).await
    }

    async fn transcribe(&self, req: &TranscribeRequest) -> Result<String> {
        let model = req.model.clone().unwrap_or_default();
        self.with_retries(&model, || self.inner.transcribe(req)).await
    }

    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }
}
