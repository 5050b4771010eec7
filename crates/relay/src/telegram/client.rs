//! Bot API client over HTTPS long polling.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;

use pr_domain::config::TelegramConfig;
use pr_domain::error::{Error, Result};

use super::types::{ChatAction, File, InlineKeyboardMarkup, Message, TelegramResponse, Update, User};

/// The subset of the Bot API the dispatcher talks to.
#[async_trait::async_trait]
pub trait BotApi: Send + Sync {
    /// Send a text message and return its message id.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()>;

    async fn answer_callback_query(&self, query_id: &str, text: Option<&str>) -> Result<()>;

    /// Resolve a file id and download its bytes.
    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile>;
}

#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    /// Server-side path, e.g. `voice/file_3.oga`.
    pub file_path: String,
}

pub struct TelegramClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
    api_timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, api_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            api_timeout,
        }
    }

    pub fn from_config(cfg: &TelegramConfig) -> Result<Self> {
        let token = cfg.resolve_token().ok_or_else(|| {
            Error::Config(format!(
                "no Telegram bot token: set telegram.token or the {} environment variable",
                cfg.token_env
            ))
        })?;
        Ok(Self::new(
            cfg.api_base.clone(),
            token,
            Duration::from_secs(cfg.api_timeout_secs),
        ))
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport(method, e))?;

        let status = resp.status();
        let body: TelegramResponse<T> = resp.json().await.map_err(|e| transport(method, e))?;
        if !body.ok {
            return Err(Error::Transport(format!(
                "{method} failed ({status}): {}",
                body.description.unwrap_or_default()
            )));
        }
        body.result
            .ok_or_else(|| Error::Transport(format!("{method} returned ok without a result")))
    }

    /// Identify the bot; used as a startup token check.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", json!({}), self.api_timeout).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let params = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call(
            "getUpdates",
            params,
            Duration::from_secs(timeout_secs) + self.api_timeout,
        )
        .await
    }
}

#[async_trait::async_trait]
impl BotApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64> {
        let mut params = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(id) = reply_to {
            params["reply_to_message_id"] = json!(id);
            params["allow_sending_without_reply"] = json!(true);
        }
        if let Some(kb) = keyboard {
            params["reply_markup"] = serde_json::to_value(kb)?;
        }
        let msg: Message = self.call("sendMessage", params, self.api_timeout).await?;
        Ok(msg.message_id)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let params = json!({ "chat_id": chat_id, "message_id": message_id });
        let _: bool = self.call("deleteMessage", params, self.api_timeout).await?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()> {
        let params = json!({ "chat_id": chat_id, "action": action.as_str() });
        let _: bool = self.call("sendChatAction", params, self.api_timeout).await?;
        Ok(())
    }

    async fn answer_callback_query(&self, query_id: &str, text: Option<&str>) -> Result<()> {
        let mut params = json!({ "callback_query_id": query_id });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", params, self.api_timeout).await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile> {
        let file: File = self
            .call("getFile", json!({ "file_id": file_id }), self.api_timeout)
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| Error::Transport(format!("file {} has no download path", file.file_id)))?;

        let resp = self
            .client
            .get(self.file_url(&file_path))
            .timeout(self.api_timeout)
            .send()
            .await
            .map_err(|e| transport("download", e))?;
        if !resp.status().is_success() {
            return Err(Error::Transport(format!(
                "download of {file_path} failed: HTTP {}",
                resp.status().as_u16()
            )));
        }
        let bytes = resp.bytes().await.map_err(|e| transport("download", e))?;
        tracing::debug!(file_path = %file_path, size = bytes.len(), "downloaded telegram file");

        Ok(DownloadedFile {
            bytes: bytes.to_vec(),
            file_path,
        })
    }
}

/// Network errors from the chat platform are transport failures, never
/// inference failures. The token is scrubbed from the message.
fn transport(method: &str, e: reqwest::Error) -> Error {
    Error::Transport(format!("{method}: {}", e.without_url()))
}
