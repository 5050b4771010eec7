//! Routes Telegram updates to the turn processor and sends the replies.
//!
//! Transport failures (sending, downloading) are logged and never touch
//! conversation memory. The user gets a short apology where one makes
//! sense.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use pr_domain::config::RepliesConfig;
use pr_domain::error::Error;
use pr_domain::UserId;

use crate::runtime::TurnProcessor;

use super::client::BotApi;
use super::commands::{mode_keyboard, parse_mode_callback, Command};
use super::types::{CallbackQuery, ChatAction, Message, Update};

pub const START_TEXT: &str = "You have entered the Matrix.\n\
     I am here to guide you. Choose a mode with /mode or use /neo /morpheus /trinity.\n\
     Send voice messages or text. Use /clear to erase memory.";
pub const CLEARED_TEXT: &str = "Memory cleared. Your slate is clean.";
pub const UNKNOWN_MODE_TEXT: &str = "Unknown mode.";
const PLACEHOLDER_TEXT: &str = "...";

pub struct Dispatcher {
    api: Arc<dyn BotApi>,
    processor: Arc<TurnProcessor>,
    replies: RepliesConfig,
    /// One serial queue per chat with pending work. The entry is removed by
    /// its worker, under this lock, once the queue is drained.
    chat_queues: Mutex<HashMap<i64, mpsc::UnboundedSender<Update>>>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn BotApi>, processor: Arc<TurnProcessor>, replies: RepliesConfig) -> Self {
        Self {
            api,
            processor,
            replies,
            chat_queues: Mutex::new(HashMap::new()),
        }
    }

    /// Queue an update behind earlier updates from the same chat. Different
    /// chats are handled concurrently.
    pub fn dispatch(self: &Arc<Self>, update: Update) {
        let Some(chat_id) = update.chat_id() else {
            let this = self.clone();
            tokio::spawn(async move { this.handle_update(update).await });
            return;
        };

        let mut queues = self.chat_queues.lock();
        let update = match queues.get(&chat_id) {
            Some(tx) => match tx.send(update) {
                Ok(()) => return,
                Err(mpsc::error::SendError(update)) => update,
            },
            None => update,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive until the worker spawned below exits.
        let _ = tx.send(update);
        queues.insert(chat_id, tx);
        drop(queues);

        let this = self.clone();
        tokio::spawn(async move { this.drain_chat(chat_id, rx).await });
    }

    async fn drain_chat(&self, chat_id: i64, mut rx: mpsc::UnboundedReceiver<Update>) {
        loop {
            let update = match rx.try_recv() {
                Ok(update) => update,
                Err(_) => {
                    let mut queues = self.chat_queues.lock();
                    match rx.try_recv() {
                        Ok(update) => update,
                        Err(_) => {
                            queues.remove(&chat_id);
                            return;
                        }
                    }
                }
            };
            self.handle_update(update).await;
        }
    }

    pub async fn handle_update(&self, update: Update) {
        if let Some(cq) = update.callback_query {
            self.handle_callback(cq).await;
        } else if let Some(msg) = update.message {
            self.handle_message(msg).await;
        } else {
            tracing::debug!(update_id = update.update_id, "ignoring update without message");
        }
    }

    async fn handle_message(&self, msg: Message) {
        if let Some(text) = msg.text.as_deref() {
            match Command::parse(text) {
                Some(cmd) => self.handle_command(&msg, cmd).await,
                None => self.handle_text(&msg, text).await,
            }
        } else if let Some((file_id, file_name)) = msg.audio_file() {
            self.handle_voice(&msg, file_id, file_name).await;
        } else {
            tracing::debug!(chat_id = msg.chat.id, "ignoring unsupported message");
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    async fn handle_command(&self, msg: &Message, cmd: Command) {
        let chat_id = msg.chat.id;
        tracing::debug!(chat_id, command = ?cmd, "command");

        match cmd {
            Command::Start => {
                self.processor.store().ensure(chat_id);
                self.send(chat_id, START_TEXT, Some(msg.message_id)).await;
                self.send_keyboard(chat_id, "Choose your mode:").await;
            }
            Command::Mode => {
                self.send_keyboard(chat_id, "Select a character mode:").await;
            }
            Command::Switch(name) => {
                let reply = match self.processor.switch_mode_by_name(chat_id, &name).await {
                    Ok(switch) => format!("Mode set to {}.", switch.to.label()),
                    Err(Error::UnknownMode(_)) => UNKNOWN_MODE_TEXT.to_string(),
                    Err(e) => {
                        tracing::error!(chat_id, error = %e, "mode switch failed");
                        self.replies.fallback.clone()
                    }
                };
                self.send(chat_id, &reply, Some(msg.message_id)).await;
                self.send_keyboard(chat_id, "Or tap a mode:").await;
            }
            Command::Clear => {
                let reply = match self.processor.clear(chat_id).await {
                    Ok(()) => CLEARED_TEXT.to_string(),
                    Err(e) => {
                        tracing::error!(chat_id, error = %e, "clear failed");
                        self.replies.fallback.clone()
                    }
                };
                self.send(chat_id, &reply, Some(msg.message_id)).await;
            }
        }
    }

    async fn handle_callback(&self, cq: CallbackQuery) {
        let user_id: UserId = cq.message.as_ref().map(|m| m.chat.id).unwrap_or(cq.from.id);

        let Some(name) = cq.data.as_deref().and_then(parse_mode_callback) else {
            self.answer(&cq.id, None).await;
            return;
        };

        match self.processor.switch_mode_by_name(user_id, name).await {
            Ok(switch) => {
                let label = switch.to.label();
                self.answer(&cq.id, Some(&format!("Mode set to {label}"))).await;
                self.send(user_id, &format!("Character switched to {label}."), None)
                    .await;
            }
            Err(Error::UnknownMode(_)) => self.answer(&cq.id, Some(UNKNOWN_MODE_TEXT)).await,
            Err(e) => {
                tracing::error!(user_id, error = %e, "mode switch from button failed");
                self.answer(&cq.id, None).await;
            }
        }
    }

    // ── Conversation ─────────────────────────────────────────────────

    async fn handle_voice(&self, msg: &Message, file_id: &str, file_name: Option<&str>) {
        let chat_id = msg.chat.id;
        self.action(chat_id, ChatAction::RecordVoice).await;

        let file = match self.api.download_file(file_id).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "audio download failed");
                self.send(chat_id, &self.replies.transport_apology, Some(msg.message_id))
                    .await;
                return;
            }
        };

        let name = file_name
            .map(str::to_string)
            .unwrap_or_else(|| file.file_path.clone());
        let transcript = match self.processor.transcribe(file.bytes, Some(name)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "transcription failed");
                self.send(chat_id, &self.replies.transport_apology, Some(msg.message_id))
                    .await;
                return;
            }
        };

        self.send(
            chat_id,
            &format!("Transcribed: {transcript}"),
            Some(msg.message_id),
        )
        .await;
        self.handle_text(msg, &transcript).await;
    }

    async fn handle_text(&self, msg: &Message, text: &str) {
        let chat_id = msg.chat.id;
        self.action(chat_id, ChatAction::Typing).await;

        let placeholder = match self.api.send_message(chat_id, PLACEHOLDER_TEXT, None, None).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!(chat_id, error = %e, "placeholder not sent");
                None
            }
        };

        let outcome = self.processor.process(chat_id, text).await;

        if let Some(id) = placeholder {
            if let Err(e) = self.api.delete_message(chat_id, id).await {
                tracing::debug!(chat_id, error = %e, "placeholder not deleted");
            }
        }

        self.send(chat_id, &outcome.reply, Some(msg.message_id)).await;
    }

    // ── Transport helpers (errors logged, never propagated) ──────────

    async fn send(&self, chat_id: i64, text: &str, reply_to: Option<i64>) {
        if let Err(e) = self.api.send_message(chat_id, text, reply_to, None).await {
            tracing::warn!(chat_id, error = %e, "send_message failed");
        }
    }

    async fn send_keyboard(&self, chat_id: i64, text: &str) {
        let kb = mode_keyboard();
        if let Err(e) = self.api.send_message(chat_id, text, None, Some(&kb)).await {
            tracing::warn!(chat_id, error = %e, "send_message with keyboard failed");
        }
    }

    async fn action(&self, chat_id: i64, action: ChatAction) {
        if let Err(e) = self.api.send_chat_action(chat_id, action).await {
            tracing::debug!(chat_id, error = %e, "chat action failed");
        }
    }

    async fn answer(&self, query_id: &str, text: Option<&str>) {
        if let Err(e) = self.api.answer_callback_query(query_id, text).await {
            tracing::warn!(error = %e, "answer_callback_query failed");
        }
    }
}
