pub mod compact;
pub mod context;
pub mod store;
pub mod turn;
pub mod user_lock;

pub use compact::{Compaction, Summarizer};
pub use store::{ConversationStore, ModeSwitch};
pub use turn::{TurnConfig, TurnOutcome, TurnProcessor, TurnState};
pub use user_lock::UserLockMap;

#[cfg(test)]
pub(crate) mod testing;
