//! ConversationService: the request surface around the orchestrator.
//!
//! One `send` persists the user turn, answers it through the fallback chain,
//! persists the answer, and, when the turn count crosses a multiple of the
//! summary interval, starts a detached memory update.

use crate::context::split_window;
use crate::orchestrator::Orchestrator;
use crate::summarizer::{MemorySummarizer, should_summarize};
use parley_config::AppConfig;
use parley_core::error::{Error, Result};
use parley_core::message::{Conversation, ConversationId, Turn};
use parley_core::store::ConversationStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Knobs the service needs from the configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub summary_interval: usize,
    pub max_window_tokens: usize,
    pub fallback_model: String,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            summary_interval: config.context.summary_interval,
            max_window_tokens: config.context.max_window_tokens,
            fallback_model: config.models.fallback.clone(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    orchestrator: Arc<Orchestrator>,
    settings: ServiceSettings,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        orchestrator: Arc<Orchestrator>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            orchestrator,
            settings,
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub async fn create_conversation(
        &self,
        title: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Result<ConversationId> {
        let id = self.store.create(Conversation::new(title, system_prompt)).await?;
        info!(conversation = %id, "Conversation started");
        Ok(id)
    }

    /// Delete a turn together with its paired turn. Returns how many were removed.
    pub async fn delete_turn(&self, conversation_id: &ConversationId, turn_id: &str) -> Result<usize> {
        Ok(self.store.delete_turn(conversation_id, turn_id).await?)
    }

    /// Answer `content` in the given conversation and return the stored assistant turn.
    ///
    /// The user turn stays stored even when every model fails.
    pub async fn send(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        preferred_model: &str,
    ) -> Result<Turn> {
        let conversation = self
            .store
            .get(conversation_id)
            .await?
            .ok_or_else(|| Error::ConversationNotFound(conversation_id.to_string()))?;

        let user_turn = Turn::user(content);
        let user_turn_id = user_turn.id.clone();
        self.store.append_turn(conversation_id, user_turn.clone()).await?;

        let window = self.settings.summary_interval.saturating_sub(1);
        let previous = self
            .store
            .recent_turns(conversation_id, window, Some(&user_turn_id))
            .await?;

        let split = split_window(&conversation.memory, &previous, self.settings.max_window_tokens);
        if !split.overflow.is_empty() {
            debug!(
                conversation = %conversation_id,
                kept = split.kept.len(),
                overflow = split.overflow.len(),
                "Recent turns exceed the token window"
            );
        }

        let candidates = vec![preferred_model.to_string(), self.settings.fallback_model.clone()];
        let reply = self
            .orchestrator
            .process_with_fallback(&conversation, &split.kept, content, &candidates)
            .await?;

        let assistant_turn = Turn::assistant(reply.text)
            .with_model(reply.model)
            .answering(&user_turn_id);
        self.store
            .append_turn(conversation_id, assistant_turn.clone())
            .await?;

        let total = self.store.turn_count(conversation_id).await?;
        if should_summarize(total, self.settings.summary_interval) {
            let mut batch = previous;
            batch.push(user_turn);
            batch.push(assistant_turn.clone());
            self.spawn_memory_update(conversation_id.clone(), batch, preferred_model.to_string(), total)
                .await?;
        }

        Ok(assistant_turn)
    }

    /// Wait for every background memory update started so far.
    pub async fn wait_for_background(&self) {
        let handles: Vec<JoinHandle<()>> = self.background.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background memory update panicked");
            }
        }
    }

    async fn spawn_memory_update(
        &self,
        conversation_id: ConversationId,
        batch: Vec<Turn>,
        model: String,
        total: usize,
    ) -> Result<()> {
        // Snapshot taken at dispatch; a concurrent update may overwrite ours.
        let memory = self.store.memory(&conversation_id).await?;
        let store = Arc::clone(&self.store);
        let summarizer: MemorySummarizer = self.orchestrator.summarizer().clone();

        info!(conversation = %conversation_id, total_turns = total, "Scheduling memory update");
        let handle = tokio::spawn(async move {
            let Some(updated) = summarizer.update(&batch, &memory, &model, None).await else {
                warn!(conversation = %conversation_id, "Memory update produced nothing");
                return;
            };
            match store.replace_memory(&conversation_id, updated).await {
                Ok(()) => info!(conversation = %conversation_id, "Memory updated"),
                Err(e) => warn!(conversation = %conversation_id, error = %e, "Could not store memory"),
            }
        });

        let mut background = self.background.lock().await;
        background.retain(|h| !h.is_finished());
        background.push(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use parley_core::error::{ProviderError, StoreError};
    use parley_core::message::Role;
    use parley_core::tool::ToolRegistry;
    use parley_memory::InMemoryStore;

    fn service(provider: Arc<ScriptedProvider>, settings: ServiceSettings) -> (ConversationService, InMemoryStore) {
        let store = InMemoryStore::new();
        let shared: Arc<dyn ConversationStore> = Arc::new(store.clone());
        let orchestrator = Orchestrator::new(
            quick_invoker(provider),
            Arc::new(ToolRegistry::new()),
            shared.clone(),
        );
        (
            ConversationService::new(shared, Arc::new(orchestrator), settings),
            store,
        )
    }

    fn settings() -> ServiceSettings {
        ServiceSettings {
            summary_interval: 6,
            max_window_tokens: 2000,
            fallback_model: "fallback".into(),
        }
    }

    #[tokio::test]
    async fn unknown_conversation_is_rejected() {
        let provider = Arc::new(ScriptedProvider::texts(&[]));
        let (svc, _) = service(provider.clone(), settings());
        let err = svc
            .send(&ConversationId::from("missing"), "hi", "m")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConversationNotFound(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn send_stores_both_turns() {
        let provider = Arc::new(ScriptedProvider::texts(&["Hello!"]));
        let (svc, store) = service(provider, settings());
        let id = svc.create_conversation("t", "").await.unwrap();

        let answer = svc.send(&id, "hi", "chat-model").await.unwrap();
        assert_eq!(answer.content, "Hello!");
        assert_eq!(answer.model_used.as_deref(), Some("chat-model"));

        let turns = store.turns(&id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(answer.answer_of.as_deref(), Some(turns[0].id.as_str()));
    }

    #[tokio::test]
    async fn fallback_model_is_recorded() {
        let provider = Arc::new(
            ScriptedProvider::texts(&[])
                .pin("preferred", Err(ProviderError::Network("down".into())))
                .pin("fallback", Ok("backup answer".into())),
        );
        let (svc, _) = service(provider, settings());
        let id = svc.create_conversation("t", "").await.unwrap();

        let answer = svc.send(&id, "hi", "preferred").await.unwrap();
        assert_eq!(answer.model_used.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn total_failure_keeps_user_turn() {
        let provider = Arc::new(ScriptedProvider::texts(&[]));
        let (svc, store) = service(provider, settings());
        let id = svc.create_conversation("t", "").await.unwrap();

        let err = svc.send(&id, "hi", "m").await.unwrap_err();
        assert!(matches!(err, Error::AllModelsFailed { .. }));
        assert_eq!(store.turn_count(&id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_window_excludes_new_turn() {
        let provider = Arc::new(ScriptedProvider::texts(&["a1", "a2", "a3"]));
        let (svc, _) = service(
            provider.clone(),
            ServiceSettings {
                summary_interval: 3,
                ..settings()
            },
        );
        let id = svc.create_conversation("t", "").await.unwrap();
        svc.send(&id, "q1", "m").await.unwrap();
        svc.send(&id, "q2", "m").await.unwrap();
        svc.wait_for_background().await;

        // Interval 3 reads the 2 turns before the new one: [q1, a1] before q2.
        let payload = &provider.requests()[1].messages;
        let contents: Vec<&str> = payload[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2"]);
    }

    #[tokio::test]
    async fn memory_updates_when_threshold_crossed() {
        let mut replies: Vec<&str> = vec!["a1", "a2", "a3"];
        replies.push(LISBON_MEMORY);
        let provider = Arc::new(ScriptedProvider::texts(&replies));
        let (svc, store) = service(provider.clone(), settings());
        let id = svc.create_conversation("Lisbon", "").await.unwrap();

        svc.send(&id, "Trip to Lisbon?", "m").await.unwrap();
        svc.send(&id, "In May", "m").await.unwrap();
        assert!(store.memory(&id).await.unwrap().is_empty());

        // Third exchange brings the count to 6.
        svc.send(&id, "Hotels?", "m").await.unwrap();
        svc.wait_for_background().await;

        let memory = store.memory(&id).await.unwrap();
        assert!(memory.contains("Lisbon"));
        assert_eq!(provider.call_count(), 4);

        // The summary saw the earlier turns plus the new pair.
        let summary_request = &provider.requests()[3];
        let prompt = &summary_request.messages[1].content;
        assert!(prompt.contains("user: Trip to Lisbon?"));
        assert!(prompt.contains("assistant: a3"));
    }

    #[tokio::test]
    async fn delete_turn_removes_pair() {
        let provider = Arc::new(ScriptedProvider::texts(&["a1"]));
        let (svc, store) = service(provider, settings());
        let id = svc.create_conversation("t", "").await.unwrap();
        let answer = svc.send(&id, "q1", "m").await.unwrap();

        assert_eq!(svc.delete_turn(&id, &answer.id).await.unwrap(), 2);
        assert_eq!(store.turn_count(&id).await.unwrap(), 0);
        assert!(matches!(
            svc.delete_turn(&id, &answer.id).await,
            Err(Error::Store(StoreError::TurnNotFound(_)))
        ));
    }
}
