//! ConversationStore trait: where turns and structured memory live.
//!
//! The engine only needs a handful of operations; backends decide how to
//! persist them. Turns are created and destroyed in question/answer pairs:
//! deleting either half of a pair deletes the other half too.

use async_trait::async_trait;
use crate::error::StoreError;
use crate::message::{Conversation, ConversationId, Turn};

/// The core ConversationStore trait.
///
/// Implementations: in-memory (reference and tests). Every method is atomic
/// with respect to a single conversation; there is no cross-call locking, so
/// concurrent memory replacements resolve as last write wins.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Create a conversation and return its id.
    async fn create(&self, conversation: Conversation) -> Result<ConversationId, StoreError>;

    /// Read a conversation (instructions + memory), if it exists.
    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError>;

    /// Append a turn at the end of the conversation.
    async fn append_turn(&self, id: &ConversationId, turn: Turn) -> Result<(), StoreError>;

    /// All turns of a conversation, oldest first.
    async fn turns(&self, id: &ConversationId) -> Result<Vec<Turn>, StoreError>;

    /// The `limit` most recent turns, oldest first, skipping `exclude` if given.
    async fn recent_turns(
        &self,
        id: &ConversationId,
        limit: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<Turn>, StoreError>;

    /// Total number of turns in the conversation.
    async fn turn_count(&self, id: &ConversationId) -> Result<usize, StoreError>;

    /// The current structured memory JSON (empty for a new conversation).
    async fn memory(&self, id: &ConversationId) -> Result<String, StoreError>;

    /// Replace the structured memory wholesale.
    async fn replace_memory(&self, id: &ConversationId, memory: String) -> Result<(), StoreError>;

    /// Delete a turn and its paired turn. Returns how many turns were removed.
    async fn delete_turn(&self, id: &ConversationId, turn_id: &str) -> Result<usize, StoreError>;
}
