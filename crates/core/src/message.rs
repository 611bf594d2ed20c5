//! Turn and Conversation domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the user sends a turn → the orchestrator routes it → a provider answers →
//! the answer is stored as another turn of the same conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (identity, memory)
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message of a conversation. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who authored this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// The model that produced this turn (assistant turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,

    /// For an assistant turn, the id of the user turn it answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_of: Option<String>,

    /// Creation timestamp; turns are ordered by it
    pub created_at: DateTime<Utc>,
}

impl Turn {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            model_used: None,
            answer_of: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Record which model produced this turn.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_used = Some(model.into());
        self
    }

    /// Link this assistant turn to the user turn it answers.
    pub fn answering(mut self, user_turn_id: impl Into<String>) -> Self {
        self.answer_of = Some(user_turn_id.into());
        self
    }
}

/// A conversation thread: its instructions, its structured memory and its identity.
///
/// Turns are owned by the conversation store, not by this value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Human-readable title
    pub title: String,

    /// Behavioral instructions for the assistant
    #[serde(default)]
    pub system_prompt: String,

    /// Structured memory JSON; empty for a new conversation
    #[serde(default)]
    pub memory: String,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation with empty memory.
    pub fn new(title: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: ConversationId::new(),
            title: title.into(),
            system_prompt: system_prompt.into(),
            memory: String::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("Hello, agent!");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "Hello, agent!");
        assert!(turn.model_used.is_none());
        assert!(turn.answer_of.is_none());
    }

    #[test]
    fn assistant_turn_links_to_question() {
        let question = Turn::user("What time is it?");
        let answer = Turn::assistant("Noon.")
            .with_model("mistral-small")
            .answering(&question.id);
        assert_eq!(answer.answer_of.as_deref(), Some(question.id.as_str()));
        assert_eq!(answer.model_used.as_deref(), Some("mistral-small"));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn new_conversation_has_empty_memory() {
        let conv = Conversation::new("Trip planning", "You are a travel agent.");
        assert!(conv.memory.is_empty());
        assert_eq!(conv.title, "Trip planning");
    }
}
