//! In-memory conversation store, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::message::{Conversation, ConversationId, Role, Turn};
use parley_core::store::ConversationStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct Thread {
    conversation: Conversation,
    turns: Vec<Turn>,
}

/// A store that keeps every conversation in a map guarded by an async lock.
///
/// Cloning is cheap and every clone shares the same data, so a background
/// task can hold its own handle.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    threads: Arc<RwLock<HashMap<ConversationId, Thread>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations held.
    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }
}

fn not_found(id: &ConversationId) -> StoreError {
    StoreError::ConversationNotFound(id.to_string())
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create(&self, conversation: Conversation) -> Result<ConversationId, StoreError> {
        let id = conversation.id.clone();
        let mut threads = self.threads.write().await;
        if threads.contains_key(&id) {
            return Err(StoreError::Storage(format!("conversation {id} already exists")));
        }
        threads.insert(
            id.clone(),
            Thread {
                conversation,
                turns: Vec::new(),
            },
        );
        debug!(conversation = %id, "Conversation created");
        Ok(id)
    }

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        let threads = self.threads.read().await;
        Ok(threads.get(id).map(|t| t.conversation.clone()))
    }

    async fn append_turn(&self, id: &ConversationId, turn: Turn) -> Result<(), StoreError> {
        let mut threads = self.threads.write().await;
        let thread = threads.get_mut(id).ok_or_else(|| not_found(id))?;
        thread.turns.push(turn);
        Ok(())
    }

    async fn turns(&self, id: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        let threads = self.threads.read().await;
        let thread = threads.get(id).ok_or_else(|| not_found(id))?;
        Ok(thread.turns.clone())
    }

    async fn recent_turns(
        &self,
        id: &ConversationId,
        limit: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<Turn>, StoreError> {
        let threads = self.threads.read().await;
        let thread = threads.get(id).ok_or_else(|| not_found(id))?;

        let mut recent: Vec<Turn> = thread
            .turns
            .iter()
            .rev()
            .filter(|t| exclude != Some(t.id.as_str()))
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn turn_count(&self, id: &ConversationId) -> Result<usize, StoreError> {
        let threads = self.threads.read().await;
        let thread = threads.get(id).ok_or_else(|| not_found(id))?;
        Ok(thread.turns.len())
    }

    async fn memory(&self, id: &ConversationId) -> Result<String, StoreError> {
        let threads = self.threads.read().await;
        let thread = threads.get(id).ok_or_else(|| not_found(id))?;
        Ok(thread.conversation.memory.clone())
    }

    async fn replace_memory(&self, id: &ConversationId, memory: String) -> Result<(), StoreError> {
        let mut threads = self.threads.write().await;
        let thread = threads.get_mut(id).ok_or_else(|| not_found(id))?;
        thread.conversation.memory = memory;
        Ok(())
    }

    async fn delete_turn(&self, id: &ConversationId, turn_id: &str) -> Result<usize, StoreError> {
        let mut threads = self.threads.write().await;
        let thread = threads.get_mut(id).ok_or_else(|| not_found(id))?;

        let target = thread
            .turns
            .iter()
            .find(|t| t.id == turn_id)
            .ok_or_else(|| StoreError::TurnNotFound(turn_id.to_string()))?;

        // A user turn takes its answers with it; an answer takes its question.
        let partner = match target.role {
            Role::Assistant => target.answer_of.clone(),
            _ => None,
        };
        let question_id = partner.unwrap_or_else(|| turn_id.to_string());

        let before = thread.turns.len();
        thread.turns.retain(|t| {
            t.id != turn_id && t.id != question_id && t.answer_of.as_deref() != Some(question_id.as_str())
        });
        let removed = before - thread.turns.len();

        debug!(conversation = %id, turn = turn_id, removed, "Turn pair deleted");
        Ok(removed)
    }
}
