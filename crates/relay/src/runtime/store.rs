//! In-memory conversation store.
//!
//! One [`UserConversation`] per user id, created lazily on first contact and
//! kept for the life of the process. The outer map lock is only held to look
//! up or insert a handle; each user's state sits behind its own async mutex
//! so compaction can await the summarizer without blocking other users.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use pr_domain::config::MemoryConfig;
use pr_domain::persona::Mode;
use pr_domain::trace::TraceEvent;
use pr_domain::{Turn, TurnRole, UserConversation, UserId};

use super::compact::{apply_compaction, Compaction, Summarizer};

pub type ConversationHandle = Arc<tokio::sync::Mutex<UserConversation>>;

/// What a mode switch changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSwitch {
    pub from: Mode,
    pub to: Mode,
    /// Number of recent turns dropped.
    pub recent_cleared: usize,
    pub summary_cleared: bool,
}

pub struct ConversationStore {
    users: Mutex<HashMap<UserId, ConversationHandle>>,
    memory: MemoryConfig,
    default_mode: Mode,
    summarizer: Arc<Summarizer>,
}

impl ConversationStore {
    pub fn new(memory: MemoryConfig, default_mode: Mode, summarizer: Arc<Summarizer>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            memory,
            default_mode,
            summarizer,
        }
    }

    pub fn memory_config(&self) -> &MemoryConfig {
        &self.memory
    }

    /// Get the user's conversation handle, creating a default one if absent.
    /// Calling it again never resets existing state.
    pub fn ensure(&self, user_id: UserId) -> ConversationHandle {
        let handle = {
            let mut users = self.users.lock();
            if let Some(existing) = users.get(&user_id) {
                return existing.clone();
            }
            let handle = Arc::new(tokio::sync::Mutex::new(UserConversation::new(
                self.default_mode,
            )));
            users.insert(user_id, handle.clone());
            handle
        };

        TraceEvent::ConversationCreated {
            user_id,
            mode: self.default_mode.to_string(),
        }
        .emit();
        handle
    }

    /// Snapshot of the user's conversation.
    pub async fn get(&self, user_id: UserId) -> UserConversation {
        self.ensure(user_id).lock().await.clone()
    }

    /// Change the active persona. When the mode actually changes, the recent
    /// window (and optionally the summary) is cleared per [`MemoryConfig`].
    pub async fn set_mode(&self, user_id: UserId, mode: Mode) -> ModeSwitch {
        let handle = self.ensure(user_id);
        let mut conv = handle.lock().await;

        let from = conv.mode;
        let mut switch = ModeSwitch {
            from,
            to: mode,
            recent_cleared: 0,
            summary_cleared: false,
        };
        conv.mode = mode;

        if from != mode {
            if self.memory.clear_recent_on_mode_switch {
                switch.recent_cleared = conv.recent.len();
                conv.recent.clear();
            }
            if self.memory.clear_summary_on_mode_switch && !conv.summary.is_empty() {
                conv.summary.clear();
                switch.summary_cleared = true;
            }
        }
        conv.touch();
        drop(conv);

        TraceEvent::ModeSwitched {
            user_id,
            from: from.to_string(),
            to: mode.to_string(),
            recent_cleared: switch.recent_cleared,
            summary_cleared: switch.summary_cleared,
        }
        .emit();
        switch
    }

    /// Empty summary and recent window. The mode is kept unless
    /// `reset_mode` is set, in which case it returns to the default.
    pub async fn clear(&self, user_id: UserId, reset_mode: bool) {
        let handle = self.ensure(user_id);
        {
            let mut conv = handle.lock().await;
            conv.summary.clear();
            conv.recent.clear();
            if reset_mode {
                conv.mode = self.default_mode;
            }
            conv.touch();
        }
        TraceEvent::MemoryCleared { user_id }.emit();
    }

    /// Push one turn, then compact if the recent window overflowed.
    pub async fn append_turn(
        &self,
        user_id: UserId,
        role: TurnRole,
        content: impl Into<String>,
    ) -> Option<Compaction> {
        let handle = self.ensure(user_id);
        let mut conv = handle.lock().await;

        conv.recent.push(Turn {
            role,
            content: content.into(),
        });
        conv.touch();

        let compaction = apply_compaction(
            &mut conv,
            self.memory.max_recent,
            self.memory.keep_recent,
            &self.summarizer,
        )
        .await;
        drop(conv);

        if let Some(c) = &compaction {
            TraceEvent::Compacted {
                user_id,
                turns_compacted: c.turns_compacted,
                summary_chars: c.summary_len,
                degraded: c.degraded,
            }
            .emit();
        }
        compaction
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.lock().is_empty()
    }
}
