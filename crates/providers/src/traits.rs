use pr_domain::error::Result;
use pr_domain::Message;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the model is asked to continue: either one flattened prompt or a
/// role-tagged message list.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Text(String),
    Messages(Vec<Message>),
}

impl Prompt {
    /// Total characters across the prompt (for logging).
    pub fn char_len(&self) -> usize {
        match self {
            Prompt::Text(t) => t.chars().count(),
            Prompt::Messages(msgs) => msgs.iter().map(|m| m.content.chars().count()).sum(),
        }
    }
}

/// A provider-agnostic text generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: Prompt,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
    /// Maximum tokens to generate. `None` lets the provider choose.
    pub max_new_tokens: Option<u32>,
    /// Sampling temperature. `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Whether text-generation models echo the prompt. Omitted when `None`;
    /// task models such as summarizers reject the parameter.
    pub return_full_text: Option<bool>,
}

impl GenerateRequest {
    /// Single-shot text request against `model`.
    pub fn text(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: Prompt::Text(prompt.into()),
            model: Some(model.into()),
            max_new_tokens: None,
            temperature: None,
            return_full_text: None,
        }
    }
}

/// A speech-to-text request.
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub audio: Vec<u8>,
    /// Original file name; its extension picks the content type.
    pub file_name: Option<String>,
    pub model: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A hosted inference service: something that turns a prompt into text, or
/// audio into a transcript, or fails.
#[async_trait::async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Generate text for the prompt and wait for the full response.
    async fn generate(&self, req: &GenerateRequest) -> Result<String>;

    /// Transcribe an audio clip.
    async fn transcribe(&self, req: &TranscribeRequest) -> Result<String>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
