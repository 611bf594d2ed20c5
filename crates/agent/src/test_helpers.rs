//! Shared test helpers: scripted providers and quick invokers.

use parley_core::error::ProviderError;
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use parley_providers::ResilientInvoker;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock provider that plays back scripted replies in order.
///
/// Replies can also be pinned to a model id; a pinned model always gets its
/// reply and does not consume the queue. An exhausted queue answers with a
/// network error.
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<String, ProviderError>>>,
    by_model: HashMap<String, Result<String, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            queue: Mutex::new(replies.into()),
            by_model: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn pin(mut self, model: &str, reply: Result<String, ProviderError>) -> Self {
        self.by_model.insert(model.to_string(), reply);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.model).collect()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = match self.by_model.get(&request.model) {
            Some(pinned) => pinned.clone(),
            None => self
                .queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into()))),
        };

        reply.map(|content| ProviderResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
        })
    }
}

/// A single-attempt invoker so scripted failures surface immediately.
pub fn quick_invoker(provider: Arc<ScriptedProvider>) -> ResilientInvoker {
    ResilientInvoker::new(provider, vec![Duration::from_secs(5)])
}

pub const LISBON_MEMORY: &str = r#"{"context":"The user is planning a trip to Lisbon in May and wants hotel and food tips","keywords":["Lisbon","trip","May","hotels"],"tone":"enthousiaste","direction":"compare neighbourhoods"}"#;
