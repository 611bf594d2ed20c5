//! Memory summarizer: folds a batch of turns into the structured memory.
//!
//! The model does the merge. This side only builds the prompt, recovers a
//! JSON object from whatever comes back, and degrades to the previous
//! memory when nothing usable does.

use parley_core::memory::StructuredMemory;
use parley_core::message::Turn;
use parley_core::provider::ChatMessage;
use parley_providers::{InvocationOutcome, ResilientInvoker};
use tracing::{debug, warn};

const SUMMARY_INSTRUCTIONS: &str = "You are a data processor. Merge the new messages into the existing JSON summary. \
Reply ONLY with one valid JSON object, without Markdown fences and without any text before or after it.";

/// Whether a background summary is due once the turn count reaches `total`.
///
/// Each exchange adds two turns, so this fires exactly when the last two
/// turns crossed a multiple of `interval`.
pub fn should_summarize(total: usize, interval: usize) -> bool {
    if interval == 0 || total < 2 {
        return false;
    }
    total / interval > (total - 2) / interval
}

#[derive(Clone)]
pub struct MemorySummarizer {
    invoker: ResilientInvoker,
}

impl MemorySummarizer {
    pub fn new(invoker: ResilientInvoker) -> Self {
        Self { invoker }
    }

    /// Fold `turns` into `current_memory`.
    ///
    /// Returns `None` only when there is nothing to work with, or when the
    /// model call fails and no previous memory exists.
    pub async fn update(
        &self,
        turns: &[Turn],
        current_memory: &str,
        model: &str,
        extra_instruction: Option<&str>,
    ) -> Option<String> {
        if turns.is_empty() && current_memory.trim().is_empty() {
            return None;
        }

        let previous = || {
            if current_memory.trim().is_empty() {
                None
            } else {
                Some(current_memory.to_string())
            }
        };

        let prompt = build_prompt(turns, current_memory, extra_instruction);
        let raw = match self.invoker.invoke(prompt, model).await {
            InvocationOutcome::Success(text) => text,
            InvocationOutcome::Failure(reason) => {
                warn!(model, reason = %reason, "Summary call failed, keeping previous memory");
                return previous();
            }
        };

        if raw.trim().is_empty() {
            debug!(model, "Summary model returned nothing");
            return previous();
        }

        match StructuredMemory::parse(&raw) {
            Some(memory) => Some(memory.to_json()),
            None => {
                warn!(model, response_len = raw.len(), "Summary reply is not JSON");
                previous().or(Some(raw))
            }
        }
    }
}

/// The two-entry payload asking for the merged JSON.
pub fn build_prompt(
    turns: &[Turn],
    current_memory: &str,
    extra_instruction: Option<&str>,
) -> Vec<ChatMessage> {
    let old = if current_memory.trim().is_empty() {
        "{}"
    } else {
        current_memory.trim()
    };

    let exchanges = turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n");

    let mut request = format!(
        "PREVIOUS JSON SUMMARY: {old}\n\nNEW MESSAGES:\n{exchanges}\n\n\
         Update the JSON with these keys: context, keywords, tone, direction."
    );

    if let Some(extra) = extra_instruction.map(str::trim).filter(|e| !e.is_empty()) {
        request.push_str("\n\nADDITIONAL INSTRUCTION: ");
        request.push_str(extra);
    }

    vec![ChatMessage::system(SUMMARY_INSTRUCTIONS), ChatMessage::user(request)]
}
