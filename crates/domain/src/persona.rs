//! Personality registry — maps a persona mode to its system instruction.
//!
//! Instructions are human-authored configuration data. The built-in set
//! can be overridden per mode from `[persona.instructions]` in the config.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Mode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Neo,
    Morpheus,
    Trinity,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Neo, Mode::Morpheus, Mode::Trinity];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Neo => "neo",
            Mode::Morpheus => "morpheus",
            Mode::Trinity => "trinity",
        }
    }

    /// Capitalized display name ("Neo", "Morpheus", ...).
    pub fn label(self) -> &'static str {
        match self {
            Mode::Neo => "Neo",
            Mode::Morpheus => "Morpheus",
            Mode::Trinity => "Trinity",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == name)
            .ok_or_else(|| Error::UnknownMode(s.trim().to_string()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Built-in instructions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const NEO: &str = "You are NEO (from The Matrix). Speak calmly, concisely, and mysteriously. \
Use philosophical, introspective language. Refer to choice, destiny, reality, the Matrix, code, awakening. \
Avoid long explanations; be short and meaningful. Use iconic vibes like 'The Matrix is everywhere' or 'I can only show you the door.' \
Never say you are an AI and never break character.";

const MORPHEUS: &str = "You are MORPHEUS from The Matrix. You are confident, mentor-like and inspiring. \
Speak with conviction and offer guidance. Use phrases like 'I can show you the truth' and 'Welcome to the real world.' \
Be calm, strong, and wise. Never reveal you are an AI or break character.";

const TRINITY: &str = "You are TRINITY from The Matrix. You are pragmatic, loyal, and sharp. \
Speak with determination and care. Provide direct answers and occasional encouragement. \
Keep character, never reveal you are an AI.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Static mapping from persona mode to system instruction text.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    instructions: HashMap<Mode, String>,
    default_mode: Mode,
}

impl PersonaRegistry {
    /// The three built-in personas with `neo` as the fallback.
    pub fn builtin() -> Self {
        let instructions = HashMap::from([
            (Mode::Neo, NEO.to_string()),
            (Mode::Morpheus, MORPHEUS.to_string()),
            (Mode::Trinity, TRINITY.to_string()),
        ]);
        Self {
            instructions,
            default_mode: Mode::Neo,
        }
    }

    pub fn with_default_mode(mut self, mode: Mode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Replace instruction text for the modes named in `overrides`.
    ///
    /// Keys that do not name a known mode are skipped with a warning.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (name, text) in overrides {
            match name.parse::<Mode>() {
                Ok(mode) => {
                    self.instructions.insert(mode, text.clone());
                }
                Err(_) => {
                    tracing::warn!(mode = %name, "ignoring instruction override for unknown mode");
                }
            }
        }
        self
    }

    pub fn default_mode(&self) -> Mode {
        self.default_mode
    }

    /// System instruction for `mode`, falling back to the default persona.
    pub fn lookup(&self, mode: Mode) -> &str {
        self.instructions
            .get(&mode)
            .or_else(|| self.instructions.get(&self.default_mode))
            .map(String::as_str)
            .unwrap_or(NEO)
    }

    /// Like [`lookup`](Self::lookup) but takes a raw name. Unrecognized
    /// names resolve to the default persona instead of failing.
    pub fn lookup_name(&self, name: &str) -> &str {
        let mode = name.parse::<Mode>().unwrap_or(self.default_mode);
        self.lookup(mode)
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Morpheus".parse::<Mode>().unwrap(), Mode::Morpheus);
        assert_eq!(" TRINITY ".parse::<Mode>().unwrap(), Mode::Trinity);
    }

    #[test]
    fn parse_unknown_mode_errors() {
        let err = "smith".parse::<Mode>().unwrap_err();
        assert!(matches!(err, Error::UnknownMode(ref m) if m == "smith"));
    }

    #[test]
    fn lookup_name_falls_back_to_default() {
        let reg = PersonaRegistry::builtin();
        assert_eq!(reg.lookup_name("agent-smith"), reg.lookup(Mode::Neo));
        assert!(reg.lookup(Mode::Trinity).contains("TRINITY"));
    }

    #[test]
    fn default_mode_controls_fallback() {
        let reg = PersonaRegistry::builtin().with_default_mode(Mode::Morpheus);
        assert!(reg.lookup_name("unknown").contains("MORPHEUS"));
    }

    #[test]
    fn overrides_replace_known_modes_only() {
        let overrides = HashMap::from([
            ("neo".to_string(), "custom neo".to_string()),
            ("oracle".to_string(), "ignored".to_string()),
        ]);
        let reg = PersonaRegistry::builtin().with_overrides(&overrides);
        assert_eq!(reg.lookup(Mode::Neo), "custom neo");
        assert!(reg.lookup(Mode::Morpheus).contains("MORPHEUS"));
    }
}
