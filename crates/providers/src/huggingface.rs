//! Hugging Face Inference API adapter.
//!
//! Text prompts go to the task endpoint (`/models/{model}` with
//! `{"inputs": ...}`); message prompts go to the OpenAI-compatible
//! `/models/{model}/v1/chat/completions` route. Audio is posted as the raw
//! request body to the speech-recognition model.

use std::time::Duration;

use pr_domain::config::InferenceConfig;
use pr_domain::error::{Error, Result};
use pr_domain::{Message, Role};
use serde_json::Value;

use crate::response::{extract_text, GENERATION_FIELDS, TRANSCRIPT_FIELDS};
use crate::traits::{GenerateRequest, InferenceProvider, Prompt, TranscribeRequest};
use crate::util::{from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HuggingFaceProvider {
    id: String,
    base_url: String,
    api_key: String,
    auth_header: String,
    auth_prefix: String,
    default_model: String,
    default_asr_model: String,
    client: reqwest::Client,
}

impl HuggingFaceProvider {
    /// Create a provider from the `[inference]` config section.
    ///
    /// The API key is resolved eagerly; a missing key fails construction.
    pub fn from_config(cfg: &InferenceConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "huggingface".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_header: cfg.auth.header.clone().unwrap_or_else(|| "Authorization".into()),
            auth_prefix: cfg.auth.prefix.clone().unwrap_or_else(|| "Bearer ".into()),
            default_model: cfg.chat_model.clone(),
            default_asr_model: cfg.transcription_model.clone(),
            client,
        })
    }

    // ── Internal: URLs and request builders ───────────────────────

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url, model)
    }

    fn chat_url(&self, model: &str) -> String {
        format!("{}/models/{}/v1/chat/completions", self.base_url, model)
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header(&self.auth_header, format!("{}{}", self.auth_prefix, self.api_key))
    }

    /// Send the request and decode a JSON body, mapping non-2xx statuses to
    /// [`Error::Provider`].
    async fn send_json(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let resp = builder.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        Ok(serde_json::from_str(&resp_text)?)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Body builders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Task-endpoint body for a flattened prompt.
pub fn build_text_body(prompt: &str, req: &GenerateRequest) -> Value {
    let mut parameters = serde_json::Map::new();
    if let Some(full) = req.return_full_text {
        parameters.insert("return_full_text".into(), Value::Bool(full));
    }
    if let Some(max) = req.max_new_tokens {
        parameters.insert("max_new_tokens".into(), serde_json::json!(max));
    }
    if let Some(temp) = req.temperature {
        parameters.insert("temperature".into(), serde_json::json!(temp));
    }

    let mut body = serde_json::json!({
        "inputs": prompt,
        "options": { "wait_for_model": true },
    });
    if !parameters.is_empty() {
        body["parameters"] = Value::Object(parameters);
    }
    body
}

/// Chat-completions body for a message list.
pub fn build_chat_body(model: &str, messages: &[Message], req: &GenerateRequest) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": role_to_str(m.role),
                "content": m.content,
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": false,
    });
    if let Some(max) = req.max_new_tokens {
        body["max_tokens"] = serde_json::json!(max);
    }
    if let Some(temp) = req.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Content type for an audio upload, guessed from the file extension.
/// Telegram voice notes are Ogg/Opus.
pub fn audio_content_type(file_name: Option<&str>) -> &'static str {
    let ext = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("ogg") | Some("oga") | Some("opus") | None => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("webm") => "audio/webm",
        Some(_) => "application/octet-stream",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl InferenceProvider for HuggingFaceProvider {
    async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        let model = req.model.as_deref().unwrap_or(&self.default_model);

        let (url, body) = match &req.prompt {
            Prompt::Text(prompt) => (self.model_url(model), build_text_body(prompt, req)),
            Prompt::Messages(messages) => {
                (self.chat_url(model), build_chat_body(model, messages, req))
            }
        };

        tracing::debug!(
            provider = %self.id,
            model = %model,
            prompt_chars = req.prompt.char_len(),
            "huggingface generate request"
        );

        let resp_json = self.send_json(self.authed_post(&url).json(&body)).await?;
        extract_text(&self.id, &resp_json, GENERATION_FIELDS)
    }

    async fn transcribe(&self, req: &TranscribeRequest) -> Result<String> {
        let model = req.model.as_deref().unwrap_or(&self.default_asr_model);
        let url = self.model_url(model);
        let content_type = audio_content_type(req.file_name.as_deref());

        tracing::debug!(
            provider = %self.id,
            model = %model,
            audio_bytes = req.audio.len(),
            content_type,
            "huggingface transcribe request"
        );

        let builder = self
            .authed_post(&url)
            .header("Content-Type", content_type)
            .body(req.audio.clone());
        let resp_json = self.send_json(builder).await?;
        extract_text(&self.id, &resp_json, TRANSCRIPT_FIELDS)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
