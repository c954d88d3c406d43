//! Conversation history
//!
//! The store owns every turn of a tutoring session. Turns are appended in
//! the order the controller issues them and are never edited, reordered, or
//! removed afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    FeedbackSummary,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::FeedbackSummary => "feedback_summary",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged entry of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Append-only turn history for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConversationStore {
    turns: Vec<Turn>,
}

impl ConversationStore {
    /// Add a turn at the end of the history
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Turn {
        self.turns.push(Turn::new(role, content));
        // Just pushed, so the slice is non-empty
        &self.turns[self.turns.len() - 1]
    }

    /// Every turn in append order
    pub fn all_turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Flatten the history into `role: content` lines, one per turn.
    ///
    /// This exact text is what the feedback summary prompt embeds.
    pub fn as_transcript_text(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_preserves_order() {
        let mut store = ConversationStore::default();
        store.append(Role::User, "graph y = x^2 + 1");
        store.append(Role::Assistant, "Sure, here is some code");
        store.append(Role::User, "thanks");

        let roles: Vec<Role> = store.all_turns().iter().map(Turn::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(store.get(1).map(Turn::content), Some("Sure, here is some code"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_transcript_text() {
        let mut store = ConversationStore::default();
        assert_eq!(store.as_transcript_text(), "");

        store.append(Role::User, "What is a derivative?");
        store.append(Role::Assistant, "What do you already know?");
        assert_eq!(
            store.as_transcript_text(),
            "user: What is a derivative?\nassistant: What do you already know?"
        );
    }

    #[test]
    fn test_role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::FeedbackSummary).unwrap();
        assert_eq!(json, "\"feedback_summary\"");
        let turn = Turn::new(Role::User, "hi");
        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            serde_json::json!({"role": "user", "content": "hi"})
        );
    }

    fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::User),
            Just(Role::Assistant),
            Just(Role::System),
            Just(Role::FeedbackSummary),
        ]
    }

    proptest! {
        #[test]
        fn prop_append_only(entries in proptest::collection::vec((arb_role(), ".{0,40}"), 0..30)) {
            let mut store = ConversationStore::default();
            for (role, content) in &entries {
                store.append(*role, content.clone());
            }
            let expected: Vec<Turn> = entries
                .into_iter()
                .map(|(role, content)| Turn::new(role, content))
                .collect();
            prop_assert_eq!(store.all_turns(), expected.as_slice());
        }
    }
}
