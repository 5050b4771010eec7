use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation memory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bounds on the per-user recent window and the compaction policy.
///
/// Counts are in turns (one user message or one assistant reply each),
/// not tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Compaction runs once the recent window grows past this many turns.
    #[serde(default = "d_6")]
    pub max_recent: usize,
    /// Turns kept verbatim after compaction.
    #[serde(default = "d_2")]
    pub keep_recent: usize,
    /// Appended to the summary when the summarizer call fails.
    #[serde(default = "d_placeholder")]
    pub summary_placeholder: String,
    /// Drop the recent window when the persona changes.
    #[serde(default = "d_true")]
    pub clear_recent_on_mode_switch: bool,
    /// Also drop the summary when the persona changes.
    #[serde(default)]
    pub clear_summary_on_mode_switch: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_recent: 6,
            keep_recent: 2,
            summary_placeholder: d_placeholder(),
            clear_recent_on_mode_switch: true,
            clear_summary_on_mode_switch: false,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_6() -> usize {
    6
}
fn d_2() -> usize {
    2
}
fn d_true() -> bool {
    true
}
fn d_placeholder() -> String {
    "Older conversation summarized.".into()
}
