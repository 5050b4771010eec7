use serde::Serialize;

/// Structured trace events emitted across all persona-relay crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ConversationCreated {
        user_id: i64,
        mode: String,
    },
    ContextBuilt {
        user_id: i64,
        mode: String,
        summary_chars: usize,
        recent_turns: usize,
        shape: String,
    },
    InferenceRequest {
        provider: String,
        model: String,
        attempt: u32,
        duration_ms: u64,
        ok: bool,
    },
    TurnCommitted {
        user_id: i64,
        turn_id: String,
        duration_ms: u64,
        reply_chars: usize,
    },
    TurnFailed {
        user_id: i64,
        turn_id: String,
        duration_ms: u64,
        error: String,
    },
    Compacted {
        user_id: i64,
        turns_compacted: usize,
        summary_chars: usize,
        degraded: bool,
    },
    ModeSwitched {
        user_id: i64,
        from: String,
        to: String,
        recent_cleared: usize,
        summary_cleared: bool,
    },
    MemoryCleared {
        user_id: i64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pr_event");
    }
}
