//! Resilient invocation: one logical model call spread over a fixed
//! schedule of attempts.
//!
//! Each attempt is bounded by its own timeout. A rate-limited attempt backs
//! off for `(attempt + 1) * 2` seconds before the next one; any other
//! failure moves straight to the next attempt. The outcome is always a
//! tagged [`InvocationOutcome`].

use parley_core::error::ProviderError;
use parley_core::provider::{ChatMessage, Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one logical model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The model answered (possibly with empty text).
    Success(String),
    /// Every attempt failed; carries the last reason.
    Failure(String),
}

/// Wraps a [`Provider`] with the attempt schedule.
#[derive(Clone)]
pub struct ResilientInvoker {
    provider: Arc<dyn Provider>,
    timeouts: Vec<Duration>,
}

impl ResilientInvoker {
    /// The schedule used when none is configured: 60s, 120s, 300s.
    pub fn default_timeouts() -> Vec<Duration> {
        vec![
            Duration::from_secs(60),
            Duration::from_secs(120),
            Duration::from_secs(300),
        ]
    }

    /// An empty schedule falls back to [`Self::default_timeouts`] so at
    /// least one attempt is always made.
    pub fn new(provider: Arc<dyn Provider>, timeouts: Vec<Duration>) -> Self {
        let timeouts = if timeouts.is_empty() {
            Self::default_timeouts()
        } else {
            timeouts
        };
        Self { provider, timeouts }
    }

    pub fn with_default_schedule(provider: Arc<dyn Provider>) -> Self {
        Self::new(provider, Self::default_timeouts())
    }

    /// Send `messages` to `model`, retrying per the schedule.
    pub async fn invoke(&self, messages: Vec<ChatMessage>, model: &str) -> InvocationOutcome {
        let request = ProviderRequest::new(model, messages);
        let total = self.timeouts.len();
        let mut last_reason = String::from("no attempt was made");

        for (attempt, timeout) in self.timeouts.iter().enumerate() {
            let is_last = attempt + 1 == total;

            debug!(
                model,
                attempt = attempt + 1,
                total,
                timeout_secs = timeout.as_secs(),
                "Invoking model"
            );

            match tokio::time::timeout(*timeout, self.provider.complete(request.clone())).await {
                Ok(Ok(response)) => {
                    if attempt > 0 {
                        info!(model, attempt = attempt + 1, "Model answered after retry");
                    }
                    if let Some(usage) = &response.usage {
                        debug!(
                            model,
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            total_tokens = usage.total_tokens,
                            "Token usage"
                        );
                    }
                    return InvocationOutcome::Success(response.content);
                }
                Ok(Err(ProviderError::RateLimited { .. })) => {
                    last_reason = format!("rate limited on all {total} attempts");
                    if is_last {
                        break;
                    }
                    let backoff = Duration::from_secs((attempt as u64 + 1) * 2);
                    warn!(
                        model,
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Ok(Err(e)) => {
                    warn!(model, attempt = attempt + 1, error = %e, "Model call failed");
                    last_reason = e.to_string();
                }
                Err(_) => {
                    warn!(
                        model,
                        attempt = attempt + 1,
                        timeout_secs = timeout.as_secs(),
                        "Model call timed out"
                    );
                    last_reason = format!("timed out after {}s", timeout.as_secs());
                }
            }
        }

        warn!(model, reason = %last_reason, "Model invocation exhausted its attempts");
        InvocationOutcome::Failure(last_reason)
    }
}
