use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inference API
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hosted inference endpoint (Hugging Face Inference API by default).
///
/// The three model identifiers are independent so chat, summarization and
/// transcription can each be pointed at a different model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_auth")]
    pub auth: AuthConfig,
    /// Model used for conversational replies. Env: `HF_CHAT_MODEL`.
    #[serde(default = "d_chat_model")]
    pub chat_model: String,
    /// Model used to compress older turns. Env: `HF_SUMMARY_MODEL`.
    #[serde(default = "d_summary_model")]
    pub summary_model: String,
    /// Speech-to-text model for voice messages. Env: `HF_ASR_MODEL`.
    #[serde(default = "d_asr_model")]
    pub transcription_model: String,
    /// Shape of the chat payload sent to the chat model.
    #[serde(default)]
    pub payload_shape: PayloadShape,
    /// Per-attempt HTTP timeout.
    #[serde(default = "d_120000")]
    pub request_timeout_ms: u64,
    /// Total attempts per call (first try included).
    #[serde(default = "d_3")]
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    #[serde(default = "d_2000")]
    pub backoff_ms: u64,
    #[serde(default = "d_512")]
    pub max_new_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            auth: d_auth(),
            chat_model: d_chat_model(),
            summary_model: d_summary_model(),
            transcription_model: d_asr_model(),
            payload_shape: PayloadShape::Text,
            request_timeout_ms: 120_000,
            max_attempts: 3,
            backoff_ms: 2_000,
            max_new_tokens: 512,
            temperature: None,
        }
    }
}

/// How the conversation context is handed to the chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// One flattened prompt with labeled sections.
    #[default]
    Text,
    /// A role/content list prefixed by a system entry.
    Messages,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Header name. Defaults to `Authorization`.
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix. Defaults to `Bearer `.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (prefer `env`).
    #[serde(default)]
    pub key: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api-inference.huggingface.co".into()
}
fn d_auth() -> AuthConfig {
    AuthConfig {
        env: Some("HF_API_KEY".into()),
        ..Default::default()
    }
}
fn d_chat_model() -> String {
    "HuggingFaceH4/zephyr-7b-beta".into()
}
fn d_summary_model() -> String {
    "sshleifer/distilbart-cnn-12-6".into()
}
fn d_asr_model() -> String {
    "openai/whisper-large-v2".into()
}
fn d_120000() -> u64 {
    120_000
}
fn d_3() -> u32 {
    3
}
fn d_2000() -> u64 {
    2_000
}
fn d_512() -> u32 {
    512
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape_deserializes_snake_case() {
        let cfg: InferenceConfig = serde_json::from_str(r#"{"payload_shape": "messages"}"#).unwrap();
        assert_eq!(cfg.payload_shape, PayloadShape::Messages);
    }

    #[test]
    fn partial_auth_keeps_other_fields_default() {
        let cfg: InferenceConfig =
            serde_json::from_str(r#"{"auth": {"key": "hf_test"}}"#).unwrap();
        assert_eq!(cfg.auth.key.as_deref(), Some("hf_test"));
        assert!(cfg.auth.env.is_none());
        assert_eq!(cfg.max_attempts, 3);
    }
}
