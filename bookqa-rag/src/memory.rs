//! Conversation memory for a single chat session.
//!
//! [`ConversationMemory`] is a plain value owned by the caller and passed to
//! every [`ask`](crate::ConversationalRag::ask). It is never shared between
//! sessions and lives only as long as the caller keeps it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a [`Turn`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The answering model.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("Human"),
            Self::Assistant => f.write_str("Assistant"),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Turn {
    /// A message from the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// A message from the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Append-only history of a session, oldest turn first.
///
/// There is no truncation or summarization; history grows for as long as the
/// session lasts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Turns in chronological order, for prompt assembly.
    pub fn as_context(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of stored turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the session has no turns yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every turn, starting a fresh conversation.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Render the history as `Role: content` lines.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<Turn>> for ConversationMemory {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_in_chronological_order() {
        let mut memory = ConversationMemory::new();
        memory.append(Turn::user("What is overfitting?"));
        memory.append(Turn::assistant("Overfitting is ..."));

        let turns = memory.as_context();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn transcript_labels_roles() {
        let memory = ConversationMemory::from(vec![Turn::user("hi"), Turn::assistant("hello")]);
        assert_eq!(memory.transcript(), "Human: hi\nAssistant: hello");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::user("x")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"x"}"#);
    }
}
