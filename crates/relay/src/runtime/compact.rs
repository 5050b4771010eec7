//! Conversation compaction: folds turns evicted from the recent window into
//! the user's running summary so the prompt stays bounded.
//!
//! The summary only ever grows. When the summarizer fails, a fixed
//! placeholder is appended instead and the window is still truncated.

use std::sync::Arc;

use pr_domain::error::{Error, Result};
use pr_domain::{Turn, UserConversation};
use pr_providers::{GenerateRequest, InferenceProvider};

pub const SUMMARY_INSTRUCTION: &str = "Summarize the important details of this conversation \
     in a short paragraph, preserving only essential facts.";

/// Result of one compaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compaction {
    pub turns_compacted: usize,
    /// Length of the summary (in chars) after the fragment was appended.
    pub summary_len: usize,
    /// The placeholder was used because summarization failed.
    pub degraded: bool,
}

/// Render turns as `role: content` lines for the summary prompt.
pub fn format_turns(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.as_str(), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split the recent window into `(older, kept)` where `kept` holds the last
/// `keep` turns.
pub fn split_for_compaction(recent: &[Turn], keep: usize) -> (&[Turn], &[Turn]) {
    let keep = keep.min(recent.len());
    recent.split_at(recent.len() - keep)
}

pub struct Summarizer {
    provider: Arc<dyn InferenceProvider>,
    model: String,
    placeholder: String,
}

impl Summarizer {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        model: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Ask the summary model for a digest of `turns`. Blank output is an
    /// error.
    pub async fn compress(&self, turns: &[Turn]) -> Result<String> {
        let prompt = format!("{SUMMARY_INSTRUCTION}\n\n{}", format_turns(turns));
        let req = GenerateRequest::text(prompt, self.model.clone());
        let text = self.provider.generate(&req).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Provider {
                provider: self.provider.provider_id().to_string(),
                message: "summary model returned empty output".into(),
            });
        }
        Ok(text.to_string())
    }

    /// Like [`compress`](Self::compress) but never fails: errors degrade to
    /// the placeholder. The flag is `true` when degraded.
    pub async fn summarize_or_placeholder(&self, turns: &[Turn]) -> (String, bool) {
        match self.compress(turns).await {
            Ok(summary) => (summary, false),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    turns = turns.len(),
                    "summarization failed, appending placeholder"
                );
                (self.placeholder.clone(), true)
            }
        }
    }
}

/// Enforce the recent-window bound on `conv`.
///
/// No-op while `recent.len() <= max_recent`. Otherwise everything but the
/// last `keep` turns is summarized into `conv.summary` and dropped.
pub async fn apply_compaction(
    conv: &mut UserConversation,
    max_recent: usize,
    keep: usize,
    summarizer: &Summarizer,
) -> Option<Compaction> {
    if conv.recent.len() <= max_recent {
        return None;
    }

    let (older, kept) = split_for_compaction(&conv.recent, keep);
    let turns_compacted = older.len();
    let kept = kept.to_vec();
    let mut degraded = false;

    if !older.is_empty() {
        let (fragment, was_degraded) = summarizer.summarize_or_placeholder(older).await;
        degraded = was_degraded;
        conv.append_summary(&fragment);
    }
    conv.recent = kept;
    conv.touch();

    Some(Compaction {
        turns_compacted,
        summary_len: conv.summary.chars().count(),
        degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{ScriptedProvider, Step};
    use pr_providers::Prompt;

    fn turns(n: usize) -> Vec<Turn> {
        (1..=n)
            .map(|i| {
                if i % 2 == 1 {
                    Turn::user(format!("m{i}"))
                } else {
                    Turn::assistant(format!("m{i}"))
                }
            })
            .collect()
    }

    fn summarizer(provider: Arc<ScriptedProvider>) -> Summarizer {
        Summarizer::new(provider, "sum-model", "Older conversation summarized.")
    }

    #[test]
    fn format_uses_lowercase_roles() {
        let text = format_turns(&[Turn::user("hi"), Turn::assistant("hello")]);
        assert_eq!(text, "user: hi\nassistant: hello");
    }

    #[test]
    fn split_keeps_tail() {
        let recent = turns(7);
        let (older, kept) = split_for_compaction(&recent, 2);
        assert_eq!(older.len(), 5);
        assert_eq!(kept[0].content, "m6");
        assert_eq!(kept[1].content, "m7");
    }

    #[test]
    fn split_with_keep_larger_than_window() {
        let recent = turns(3);
        let (older, kept) = split_for_compaction(&recent, 10);
        assert!(older.is_empty());
        assert_eq!(kept.len(), 3);
    }

    #[tokio::test]
    async fn compress_sends_instruction_and_turns() {
        let provider = Arc::new(ScriptedProvider::new("  they talked about cats  "));
        let s = summarizer(provider.clone());

        let out = s.compress(&turns(2)).await.unwrap();
        assert_eq!(out, "they talked about cats");

        let reqs = provider.requests.lock();
        assert_eq!(reqs[0].model.as_deref(), Some("sum-model"));
        assert_eq!(reqs[0].return_full_text, None);
        match &reqs[0].prompt {
            Prompt::Text(p) => {
                assert!(p.starts_with(SUMMARY_INSTRUCTION));
                assert!(p.ends_with("\n\nuser: m1\nassistant: m2"));
            }
            other => panic!("expected text prompt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_summary_is_an_error() {
        let s = summarizer(Arc::new(ScriptedProvider::new("   ")));
        assert!(s.compress(&turns(2)).await.is_err());
    }

    #[tokio::test]
    async fn under_bound_is_noop() {
        let provider = Arc::new(ScriptedProvider::new("sum"));
        let s = summarizer(provider.clone());
        let mut conv = UserConversation::default();
        conv.recent = turns(6);

        assert!(apply_compaction(&mut conv, 6, 2, &s).await.is_none());
        assert_eq!(conv.recent.len(), 6);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn over_bound_appends_summary_and_truncates() {
        let s = summarizer(Arc::new(ScriptedProvider::new("second")));
        let mut conv = UserConversation::default();
        conv.summary = "first".into();
        conv.recent = turns(7);

        let c = apply_compaction(&mut conv, 6, 2, &s).await.unwrap();
        assert_eq!(c.turns_compacted, 5);
        assert!(!c.degraded);
        assert_eq!(conv.summary, "first\nsecond");
        assert_eq!(c.summary_len, "first\nsecond".len());
        assert_eq!(
            conv.recent.iter().map(|t| t.content.as_str()).collect::<Vec<_>>(),
            ["m6", "m7"]
        );
    }

    #[tokio::test]
    async fn failure_degrades_to_placeholder_and_still_truncates() {
        let provider = Arc::new(ScriptedProvider::new("unused").then(Step::Fail));
        let s = summarizer(provider);
        let mut conv = UserConversation::default();
        conv.recent = turns(7);

        let c = apply_compaction(&mut conv, 6, 2, &s).await.unwrap();
        assert!(c.degraded);
        assert_eq!(conv.summary, "Older conversation summarized.");
        assert_eq!(conv.recent.len(), 2);
    }

    #[tokio::test]
    async fn keep_zero_empties_window() {
        let s = summarizer(Arc::new(ScriptedProvider::new("all of it")));
        let mut conv = UserConversation::default();
        conv.recent = turns(3);

        let c = apply_compaction(&mut conv, 2, 0, &s).await.unwrap();
        assert_eq!(c.turns_compacted, 3);
        assert!(conv.recent.is_empty());
        assert_eq!(conv.summary, "all of it");
    }
}
