use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::persona::{Mode, PersonaRegistry};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Personas
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonaConfig {
    /// Mode given to new conversations and used for unknown lookups.
    #[serde(default)]
    pub default_mode: Mode,
    /// Per-mode instruction overrides (key = mode name).
    #[serde(default)]
    pub instructions: HashMap<String, String>,
}

impl PersonaConfig {
    pub fn registry(&self) -> PersonaRegistry {
        PersonaRegistry::builtin()
            .with_default_mode(self.default_mode)
            .with_overrides(&self.instructions)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Canned replies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepliesConfig {
    /// Sent in place of a reply when inference fails.
    #[serde(default = "d_fallback")]
    pub fallback: String,
    /// Sent when the chat platform fails us (download, transcription).
    #[serde(default = "d_apology")]
    pub transport_apology: String,
    /// Upper bound on one turn, retries included.
    #[serde(default = "d_400000")]
    pub turn_timeout_ms: u64,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            fallback: d_fallback(),
            transport_apology: d_apology(),
            turn_timeout_ms: 400_000,
        }
    }
}

fn d_fallback() -> String {
    "Something in the Matrix is resisting. Try again.".into()
}
fn d_apology() -> String {
    "Sorry, I couldn't transcribe your audio.".into()
}
fn d_400000() -> u64 {
    400_000
}
