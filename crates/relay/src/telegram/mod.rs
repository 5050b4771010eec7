//! Telegram Bot API transport: long polling in, text replies out.

pub mod client;
pub mod commands;
pub mod dispatcher;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

pub use client::{BotApi, TelegramClient};
pub use commands::{mode_keyboard, Command};
pub use dispatcher::Dispatcher;

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Poll `getUpdates` until `shutdown` is notified. Updates from one chat are
/// handled in arrival order; different chats run concurrently.
pub async fn run_polling(
    client: Arc<TelegramClient>,
    dispatcher: Arc<Dispatcher>,
    poll_timeout_secs: u64,
    shutdown: Arc<Notify>,
) {
    let mut offset: i64 = 0;
    tracing::info!(poll_timeout_secs, "telegram polling started");

    loop {
        let result = tokio::select! {
            _ = shutdown.notified() => break,
            result = client.get_updates(offset, poll_timeout_secs) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    dispatcher.dispatch(update);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "telegram polling error, backing off");
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                }
            }
        }
    }

    tracing::info!("telegram polling stopped");
}
