//! Prompt assembly.
//!
//! Order is fixed: persona instruction, accumulated summary, recent turns
//! oldest first, then the new input. The input is not recorded here; the
//! turn processor commits it only after inference succeeds.

use pr_domain::config::PayloadShape;
use pr_domain::persona::PersonaRegistry;
use pr_domain::{Message, UserConversation};
use pr_providers::Prompt;

/// Build the inference prompt for `input` against the user's current state.
pub fn build(
    conv: &UserConversation,
    registry: &PersonaRegistry,
    input: &str,
    shape: PayloadShape,
) -> Prompt {
    match shape {
        PayloadShape::Text => Prompt::Text(build_text(conv, registry, input)),
        PayloadShape::Messages => Prompt::Messages(build_messages(conv, registry, input)),
    }
}

fn build_text(conv: &UserConversation, registry: &PersonaRegistry, input: &str) -> String {
    let mut parts: Vec<String> = vec![
        "SYSTEM INSTRUCTION:".into(),
        registry.lookup(conv.mode).to_string(),
    ];
    if !conv.summary.is_empty() {
        parts.push("\nConversation summary:".into());
        parts.push(conv.summary.clone());
    }
    if !conv.recent.is_empty() {
        parts.push("\nRecent messages:".into());
        for turn in &conv.recent {
            parts.push(format!("{}: {}", turn.role.speaker(), turn.content));
        }
    }
    parts.push(format!("\nUser: {input}"));
    parts.push("\nAssistant:".into());
    parts.join("\n")
}

fn build_messages(conv: &UserConversation, registry: &PersonaRegistry, input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(conv.recent.len() + 3);
    messages.push(Message::system(registry.lookup(conv.mode)));
    if !conv.summary.is_empty() {
        messages.push(Message::system(format!(
            "Conversation summary:\n{}",
            conv.summary
        )));
    }
    messages.extend(conv.recent.iter().map(Message::from));
    messages.push(Message::user(input));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use pr_domain::persona::Mode;
    use pr_domain::{Role, Turn};

    fn conv() -> UserConversation {
        let mut c = UserConversation::new(Mode::Morpheus);
        c.summary = "User likes chess.".into();
        c.recent = vec![Turn::user("hi"), Turn::assistant("welcome")];
        c
    }

    fn text_of(p: Prompt) -> String {
        match p {
            Prompt::Text(t) => t,
            other => panic!("expected text prompt, got {other:?}"),
        }
    }

    #[test]
    fn text_prompt_layout() {
        let reg = PersonaRegistry::builtin();
        let prompt = text_of(build(&conv(), &reg, "what now?", PayloadShape::Text));
        let expected = format!(
            "SYSTEM INSTRUCTION:\n{}\n\nConversation summary:\nUser likes chess.\n\n\
             Recent messages:\nUser: hi\nAssistant: welcome\n\nUser: what now?\n\nAssistant:",
            reg.lookup(Mode::Morpheus)
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn empty_sections_are_omitted() {
        let reg = PersonaRegistry::builtin();
        let c = UserConversation::new(Mode::Neo);
        let prompt = text_of(build(&c, &reg, "hello", PayloadShape::Text));
        assert!(!prompt.contains("Conversation summary:"));
        assert!(!prompt.contains("Recent messages:"));
        assert!(prompt.ends_with("\n\nUser: hello\n\nAssistant:"));
    }

    #[test]
    fn message_prompt_ordering() {
        let reg = PersonaRegistry::builtin();
        let msgs = match build(&conv(), &reg, "what now?", PayloadShape::Messages) {
            Prompt::Messages(m) => m,
            other => panic!("expected messages, got {other:?}"),
        };

        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::System, Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(msgs[0].content, reg.lookup(Mode::Morpheus));
        assert_eq!(msgs[1].content, "Conversation summary:\nUser likes chess.");
        assert_eq!(msgs[4].content, "what now?");
    }

    #[test]
    fn build_does_not_record_input() {
        let reg = PersonaRegistry::builtin();
        let c = conv();
        let before = c.clone();
        let _ = build(&c, &reg, "ignored", PayloadShape::Text);
        assert_eq!(c, before);
    }
}
