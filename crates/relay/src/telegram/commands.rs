//! Slash commands and the mode keyboard.

use pr_domain::persona::Mode;

use super::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Callback data prefix for mode buttons.
pub const MODE_CALLBACK_PREFIX: &str = "mode:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`: greeting plus mode buttons.
    Start,
    /// `/mode`: show mode buttons.
    Mode,
    /// `/neo`, `/morpheus`, `/trinity` or `/mode <name>`. The name is not
    /// validated here.
    Switch(String),
    /// `/clear`: wipe memory, keep the mode.
    Clear,
}

impl Command {
    /// Parse a message text. Anything that is not a known command (including
    /// unknown `/words`) returns `None` and is handled as plain text.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let head = words.next()?;
        // `/mode@my_bot` in group chats.
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        match name.as_str() {
            "start" => Some(Command::Start),
            "clear" => Some(Command::Clear),
            "mode" => match words.next() {
                Some(arg) => Some(Command::Switch(arg.to_ascii_lowercase())),
                None => Some(Command::Mode),
            },
            other if Mode::ALL.iter().any(|m| m.as_str() == other) => {
                Some(Command::Switch(other.to_string()))
            }
            _ => None,
        }
    }
}

/// Extract the mode name from button callback data (`mode:<name>`).
pub fn parse_mode_callback(data: &str) -> Option<&str> {
    data.strip_prefix(MODE_CALLBACK_PREFIX)
}

/// One row with a button per persona.
pub fn mode_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![Mode::ALL
            .iter()
            .map(|m| InlineKeyboardButton {
                text: m.label().to_string(),
                callback_data: format!("{MODE_CALLBACK_PREFIX}{}", m.as_str()),
            })
            .collect()],
    }
}
