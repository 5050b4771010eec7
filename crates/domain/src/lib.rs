//! Shared types for persona-relay: errors, configuration, conversation
//! records, the persona registry and structured trace events.

pub mod config;
pub mod conversation;
pub mod error;
pub mod persona;
pub mod trace;

pub use conversation::{Message, Role, Turn, TurnRole, UserConversation, UserId};
pub use error::{Error, Result};
pub use persona::{Mode, PersonaRegistry};
