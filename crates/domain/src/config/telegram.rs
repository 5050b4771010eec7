use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Telegram transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable holding the bot token from @BotFather.
    #[serde(default = "d_token_env")]
    pub token_env: String,
    /// Direct token (for config-only setups; prefer `token_env`).
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "d_api_base")]
    pub api_base: String,
    /// Long-polling timeout passed to `getUpdates`.
    #[serde(default = "d_30")]
    pub poll_timeout_secs: u64,
    /// Timeout for every other Bot API call.
    #[serde(default = "d_30")]
    pub api_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: d_token_env(),
            token: None,
            api_base: d_api_base(),
            poll_timeout_secs: 30,
            api_timeout_secs: 30,
        }
    }
}

impl TelegramConfig {
    /// Resolve the bot token: direct `token` first, then `token_env`.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(&self.token_env).ok().filter(|t| !t.is_empty()))
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_token_env() -> String {
    "TG_Token".into()
}
fn d_api_base() -> String {
    "https://api.telegram.org".into()
}
fn d_30() -> u64 {
    30
}
