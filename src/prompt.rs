use crate::store::{Message, Role};

pub const CLOSING_INSTRUCTION: &str =
    "Please answer the current question, taking the full conversation history above into account.";

/// Render stored turns plus the new prompt into the text sent upstream.
pub fn render(history: &[Message], new_prompt: &str) -> String {
    let lines = history
        .iter()
        .map(|m| format!("{}: {}", role_prefix(m.role), m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Previous conversation:\n{lines}\n\nCurrent question:\n{new_prompt}\n\n{CLOSING_INSTRUCTION}"
    )
}

fn role_prefix(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> Message {
        Message {
            role,
            content: content.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn renders_history_before_current_question() {
        let history = [msg(Role::User, "Hi"), msg(Role::Assistant, "Hello")];
        let out = render(&history, "How are you?");

        let user = out.find("User: Hi").unwrap();
        let assistant = out.find("Assistant: Hello").unwrap();
        let question = out.find("Current question:\nHow are you?").unwrap();
        assert!(out.starts_with("Previous conversation:\n"));
        assert!(user < assistant && assistant < question);
        assert!(out.contains("User: Hi\n\nAssistant: Hello"));
        assert!(out.ends_with(CLOSING_INSTRUCTION));
    }

    #[test]
    fn empty_history_has_no_turn_lines() {
        let out = render(&[], "What is a qubit?");
        assert!(!out.contains("User:"));
        assert!(!out.contains("Assistant:"));
        assert!(out.starts_with("Previous conversation:\n\n\nCurrent question:\nWhat is a qubit?"));
    }

    #[test]
    fn trims_stored_content_but_not_the_new_prompt() {
        let history = [msg(Role::User, "  padded \n")];
        let out = render(&history, " keep ");
        assert!(out.contains("User: padded\n"));
        assert!(out.contains("Current question:\n keep \n"));
    }

    #[test]
    fn is_deterministic() {
        let history = [msg(Role::User, "a"), msg(Role::Assistant, "b")];
        assert_eq!(render(&history, "c"), render(&history, "c"));
    }
}
