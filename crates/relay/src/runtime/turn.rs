//! Turn processing: one user message in, one reply out.
//!
//! A turn moves `Received → ContextBuilt → InferencePending` and ends in
//! either `Succeeded` or `Failed`. Memory is written only on success, and
//! then always as a user turn immediately followed by its assistant turn.
//! A failed turn leaves the user's conversation exactly as it was.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pr_domain::config::{Config, PayloadShape};
use pr_domain::error::{Error, Result};
use pr_domain::persona::{Mode, PersonaRegistry};
use pr_domain::trace::TraceEvent;
use pr_domain::{TurnRole, UserId};
use pr_providers::{GenerateRequest, InferenceProvider, TranscribeRequest};

use super::compact::Compaction;
use super::context;
use super::store::{ConversationStore, ModeSwitch};
use super::user_lock::UserLockMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub chat_model: String,
    pub transcription_model: String,
    pub payload_shape: PayloadShape,
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Upper bound on the whole inference step, retries included.
    pub turn_timeout: Duration,
    /// Sent in place of a reply when the turn fails.
    pub fallback_reply: String,
}

impl TurnConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            chat_model: cfg.inference.chat_model.clone(),
            transcription_model: cfg.inference.transcription_model.clone(),
            payload_shape: cfg.inference.payload_shape,
            max_new_tokens: Some(cfg.inference.max_new_tokens).filter(|n| *n > 0),
            temperature: cfg.inference.temperature,
            turn_timeout: Duration::from_millis(cfg.replies.turn_timeout_ms),
            fallback_reply: cfg.replies.fallback.clone(),
        }
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Received,
    ContextBuilt,
    InferencePending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn_id: String,
    pub state: TurnState,
    /// Model reply on success, the fallback text on failure.
    pub reply: String,
    pub error: Option<String>,
    /// Compactions triggered while committing the turn.
    pub compactions: Vec<Compaction>,
}

impl TurnOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == TurnState::Succeeded
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Processor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TurnProcessor {
    store: Arc<ConversationStore>,
    registry: Arc<PersonaRegistry>,
    provider: Arc<dyn InferenceProvider>,
    locks: UserLockMap,
    config: TurnConfig,
}

impl TurnProcessor {
    pub fn new(
        store: Arc<ConversationStore>,
        registry: Arc<PersonaRegistry>,
        provider: Arc<dyn InferenceProvider>,
        config: TurnConfig,
    ) -> Self {
        Self {
            store,
            registry,
            provider,
            locks: UserLockMap::new(),
            config,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    pub fn locks(&self) -> &UserLockMap {
        &self.locks
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Run one turn for `user_id`. Never returns an error: failures are
    /// reported through [`TurnOutcome::state`] with the fallback reply.
    pub async fn process(&self, user_id: UserId, input: &str) -> TurnOutcome {
        let turn_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();
        transition(&turn_id, user_id, TurnState::Received);

        let _permit = match self.locks.acquire(user_id).await {
            Ok(permit) => permit,
            Err(e) => return self.fail(turn_id, user_id, start, Error::Other(e.to_string())),
        };

        // ── Build context ────────────────────────────────────────────
        let conv = self.store.get(user_id).await;
        let prompt = context::build(&conv, &self.registry, input, self.config.payload_shape);
        TraceEvent::ContextBuilt {
            user_id,
            mode: conv.mode.to_string(),
            summary_chars: conv.summary.chars().count(),
            recent_turns: conv.recent.len(),
            shape: format!("{:?}", self.config.payload_shape).to_lowercase(),
        }
        .emit();
        transition(&turn_id, user_id, TurnState::ContextBuilt);

        // ── Inference ────────────────────────────────────────────────
        let req = GenerateRequest {
            prompt,
            model: Some(self.config.chat_model.clone()),
            max_new_tokens: self.config.max_new_tokens,
            temperature: self.config.temperature,
            return_full_text: Some(false),
        };
        transition(&turn_id, user_id, TurnState::InferencePending);

        let reply = match self.generate(&req).await {
            Ok(reply) => reply,
            Err(e) => return self.fail(turn_id, user_id, start, e),
        };

        // ── Commit ───────────────────────────────────────────────────
        let mut compactions = Vec::new();
        compactions.extend(self.store.append_turn(user_id, TurnRole::User, input).await);
        compactions.extend(
            self.store
                .append_turn(user_id, TurnRole::Assistant, reply.clone())
                .await,
        );

        transition(&turn_id, user_id, TurnState::Succeeded);
        TraceEvent::TurnCommitted {
            user_id,
            turn_id: turn_id.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            reply_chars: reply.chars().count(),
        }
        .emit();

        TurnOutcome {
            turn_id,
            state: TurnState::Succeeded,
            reply,
            error: None,
            compactions,
        }
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        let reply = tokio::time::timeout(self.config.turn_timeout, self.provider.generate(req))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "turn exceeded {}ms",
                    self.config.turn_timeout.as_millis()
                ))
            })??;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Error::Provider {
                provider: self.provider.provider_id().to_string(),
                message: "chat model returned an empty reply".into(),
            });
        }
        Ok(reply.to_string())
    }

    fn fail(&self, turn_id: String, user_id: UserId, start: Instant, err: Error) -> TurnOutcome {
        transition(&turn_id, user_id, TurnState::Failed);
        tracing::warn!(user_id, turn_id = %turn_id, error = %err, "turn failed, memory untouched");
        TraceEvent::TurnFailed {
            user_id,
            turn_id: turn_id.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: err.to_string(),
        }
        .emit();

        TurnOutcome {
            turn_id,
            state: TurnState::Failed,
            reply: self.config.fallback_reply.clone(),
            error: Some(err.to_string()),
            compactions: Vec::new(),
        }
    }

    /// Switch the user's persona, serialized with any in-flight turn.
    pub async fn switch_mode(&self, user_id: UserId, mode: Mode) -> Result<ModeSwitch> {
        let _permit = self
            .locks
            .acquire(user_id)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(self.store.set_mode(user_id, mode).await)
    }

    /// Parse `name` and switch to it. Unknown names are rejected and the
    /// stored mode is left alone.
    pub async fn switch_mode_by_name(&self, user_id: UserId, name: &str) -> Result<ModeSwitch> {
        let mode: Mode = name.parse()?;
        self.switch_mode(user_id, mode).await
    }

    /// Erase summary and recent turns; the persona is kept.
    pub async fn clear(&self, user_id: UserId) -> Result<()> {
        let _permit = self
            .locks
            .acquire(user_id)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        self.store.clear(user_id, false).await;
        Ok(())
    }

    /// Speech-to-text with the configured transcription model.
    pub async fn transcribe(&self, audio: Vec<u8>, file_name: Option<String>) -> Result<String> {
        let req = TranscribeRequest {
            audio,
            file_name,
            model: Some(self.config.transcription_model.clone()),
        };
        let text = self.provider.transcribe(&req).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Provider {
                provider: self.provider.provider_id().to_string(),
                message: "transcription was empty".into(),
            });
        }
        Ok(text.to_string())
    }
}

fn transition(turn_id: &str, user_id: UserId, state: TurnState) {
    tracing::debug!(turn_id, user_id, state = ?state, "turn state");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::compact::Summarizer;
    use crate::runtime::testing::{ScriptedProvider, Step};
    use pr_domain::config::MemoryConfig;
    use pr_providers::Prompt;

    fn processor(provider: ScriptedProvider) -> (Arc<TurnProcessor>, Arc<ScriptedProvider>) {
        processor_with(provider, MemoryConfig::default())
    }

    fn processor_with(
        provider: ScriptedProvider,
        memory: MemoryConfig,
    ) -> (Arc<TurnProcessor>, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let summarizer = Arc::new(Summarizer::new(
            provider.clone(),
            "sum-model",
            memory.summary_placeholder.clone(),
        ));
        let store = Arc::new(ConversationStore::new(memory, Mode::Neo, summarizer));
        let config = TurnConfig {
            turn_timeout: Duration::from_secs(30),
            ..TurnConfig::default()
        };
        let p = TurnProcessor::new(
            store,
            Arc::new(PersonaRegistry::builtin()),
            provider.clone(),
            config,
        );
        (Arc::new(p), provider)
    }

    fn prompt_text(p: &Prompt) -> &str {
        match p {
            Prompt::Text(t) => t,
            other => panic!("expected text prompt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_commits_user_then_assistant() {
        let (p, provider) = processor(ScriptedProvider::new("  follow the white rabbit "));

        let out = p.process(1, "where do I go?").await;
        assert!(out.succeeded());
        assert_eq!(out.reply, "follow the white rabbit");
        assert!(out.error.is_none());

        let conv = p.store().get(1).await;
        assert_eq!(conv.recent.len(), 2);
        assert_eq!(conv.recent[0].role, TurnRole::User);
        assert_eq!(conv.recent[0].content, "where do I go?");
        assert_eq!(conv.recent[1].role, TurnRole::Assistant);
        assert_eq!(conv.recent[1].content, "follow the white rabbit");

        let reqs = provider.requests.lock();
        assert_eq!(reqs[0].model.as_deref(), Some(p.config().chat_model.as_str()));
        assert_eq!(reqs[0].return_full_text, Some(false));
    }

    #[tokio::test]
    async fn failure_leaves_memory_untouched() {
        let (p, _) = processor(
            ScriptedProvider::new("ok")
                .then(Step::Reply("ok"))
                .then(Step::Fail),
        );
        p.process(2, "first").await;
        let before = p.store().get(2).await;

        let out = p.process(2, "second").await;
        assert_eq!(out.state, TurnState::Failed);
        assert_eq!(out.reply, p.config().fallback_reply);
        assert!(out.error.as_deref().unwrap_or_default().contains("HTTP 503"));

        let after = p.store().get(2).await;
        assert_eq!(after.recent, before.recent);
        assert_eq!(after.summary, before.summary);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_fallback_and_keeps_memory() {
        let (p, _) = processor(ScriptedProvider::new("ok").then(Step::Hang));

        let out = p.process(3, "are you there?").await;
        assert_eq!(out.state, TurnState::Failed);
        assert_eq!(out.reply, "Something in the Matrix is resisting. Try again.");
        assert!(out.error.as_deref().unwrap_or_default().contains("timeout"));

        let conv = p.store().get(3).await;
        assert!(conv.recent.is_empty());
        assert!(conv.summary.is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_a_failure() {
        let (p, _) = processor(ScriptedProvider::new("   "));
        let out = p.process(4, "hello").await;
        assert_eq!(out.state, TurnState::Failed);
        assert!(p.store().get(4).await.recent.is_empty());
    }

    #[tokio::test]
    async fn mode_switch_isolates_next_context() {
        let (p, provider) = processor(ScriptedProvider::new("reply"));
        p.process(5, "remember the spoon").await;
        p.store().ensure(5).lock().await.summary = "Talked about spoons.".into();

        p.switch_mode(5, Mode::Trinity).await.unwrap();
        p.process(5, "who are you now?").await;

        let reqs = provider.requests.lock();
        let last = prompt_text(&reqs.last().unwrap().prompt);
        assert!(last.contains(p.registry().lookup(Mode::Trinity)));
        assert!(last.contains("Talked about spoons."));
        assert!(!last.contains("Recent messages:"));
        assert!(!last.contains("remember the spoon"));
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let (p, _) = processor(ScriptedProvider::new("reply"));
        p.switch_mode(6, Mode::Morpheus).await.unwrap();

        let err = p.switch_mode_by_name(6, "smith").await.unwrap_err();
        assert!(matches!(err, Error::UnknownMode(_)));
        assert_eq!(p.store().get(6).await.mode, Mode::Morpheus);
    }

    #[tokio::test]
    async fn clear_keeps_mode() {
        let (p, _) = processor(ScriptedProvider::new("reply"));
        p.switch_mode(7, Mode::Morpheus).await.unwrap();
        p.process(7, "hi").await;

        p.clear(7).await.unwrap();
        let conv = p.store().get(7).await;
        assert_eq!(conv.mode, Mode::Morpheus);
        assert!(conv.recent.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn same_user_turns_are_serialized() {
        let (p, provider) = processor(
            ScriptedProvider::new("second reply").then(Step::Delayed("first reply", 500)),
        );

        let first = {
            let p = p.clone();
            tokio::spawn(async move { p.process(8, "first message").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let p = p.clone();
            tokio::spawn(async move { p.process(8, "second message").await })
        };

        assert!(first.await.unwrap().succeeded());
        assert!(second.await.unwrap().succeeded());

        // The second turn was built after the first one committed.
        let reqs = provider.requests.lock();
        assert!(prompt_text(&reqs[1].prompt).contains("User: first message"));
        drop(reqs);

        let conv = p.store().get(8).await;
        let contents: Vec<&str> = conv.recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(
            contents,
            ["first message", "first reply", "second message", "second reply"]
        );
    }

    #[tokio::test]
    async fn commit_can_trigger_compaction() {
        let (p, _) = processor_with(
            ScriptedProvider::new("reply"),
            MemoryConfig {
                max_recent: 2,
                keep_recent: 1,
                ..Default::default()
            },
        );
        p.process(9, "one").await;
        let out = p.process(9, "two").await;

        assert_eq!(out.compactions.len(), 1);
        let conv = p.store().get(9).await;
        assert_eq!(conv.recent.len(), 2);
        assert!(!conv.summary.is_empty());
    }

    #[tokio::test]
    async fn transcribe_uses_transcription_model() {
        let (p, _) = processor(ScriptedProvider::new("reply"));
        let text = p.transcribe(vec![1, 2, 3], Some("voice.ogg".into())).await.unwrap();
        assert_eq!(text, "transcribed words");
    }
}
