//! The orchestrator: single entry point for a user turn.
//!
//! Routing happens in a fixed order:
//!
//! 1. `/mode` for a registered conversational mode (`chat`, `summary`)
//! 2. `/command` for a tool's slash command: run it, fold the fact in, chat
//! 3. plain input with model-driven routing on: ask the router model which
//!    tools to run, run them in order, fold every fact in, chat
//! 4. anything else: chat with the text (minus an unknown `/word`)
//!
//! [`Orchestrator::process_with_fallback`] wraps all of this in the model
//! fallback chain and is the only place failures become a hard error.

use crate::command::{enrich_prompt, parse_command, parse_tool_selections};
use crate::context::ContextAssembler;
use crate::summarizer::MemorySummarizer;
use parley_config::AppConfig;
use parley_core::error::{Error, Result};
use parley_core::message::{Conversation, Turn};
use parley_core::provider::ChatMessage;
use parley_core::store::ConversationStore;
use parley_core::tool::{ToolInvocationResult, ToolRegistry};
use parley_providers::{InvocationOutcome, ResilientInvoker};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NO_SUMMARY_MESSAGE: &str = "No summary is available for this conversation yet.";
pub const SUMMARY_FAILED_MESSAGE: &str = "Could not generate the summary.";
const DEFAULT_SUMMARY_REQUEST: &str = "Produce a clear summary of our conversation.";

const RESTATE_INSTRUCTIONS: &str = "You are an assistant. The user is asking about your conversation together. \
You have the structured (JSON) summary of that conversation. \
Answer in natural language, clearly and with a good structure.";

/// Conversational modes reachable with `/key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plain conversation with the remaining text
    Chat,
    /// Refresh the structured memory, then restate it
    Summary,
}

/// A reply accepted by the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// The candidate model that produced `text`
    pub model: String,
}

pub struct Orchestrator {
    invoker: ResilientInvoker,
    assembler: ContextAssembler,
    summarizer: MemorySummarizer,
    tools: Arc<ToolRegistry>,
    modes: HashMap<String, Mode>,
    store: Arc<dyn ConversationStore>,
    router_model: String,
    router_enabled: bool,
}

impl Orchestrator {
    /// Model-driven routing starts disabled; see [`Self::with_router`].
    pub fn new(
        invoker: ResilientInvoker,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        let modes = HashMap::from([
            ("chat".to_string(), Mode::Chat),
            ("summary".to_string(), Mode::Summary),
        ]);

        Self {
            summarizer: MemorySummarizer::new(invoker.clone()),
            invoker,
            assembler: ContextAssembler::default(),
            tools,
            modes,
            store,
            router_model: String::new(),
            router_enabled: false,
        }
    }

    /// Build an orchestrator wired the way `config` describes.
    pub fn from_config(
        config: &AppConfig,
        invoker: ResilientInvoker,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self::new(invoker, tools, store)
            .with_assembler(ContextAssembler::new(config.context.default_system_prompt.clone()))
            .with_router(config.models.router.clone(), config.router.enabled)
    }

    pub fn with_router(mut self, model: impl Into<String>, enabled: bool) -> Self {
        self.router_model = model.into();
        self.router_enabled = enabled;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn summarizer(&self) -> &MemorySummarizer {
        &self.summarizer
    }

    /// The mode registered under `key`, if any.
    pub fn mode(&self, key: &str) -> Option<Mode> {
        self.modes.get(key).copied()
    }

    /// Route one user input and produce the outcome of the final model call.
    ///
    /// Only store failures (summary mode) surface as `Err`.
    pub async fn process(
        &self,
        conversation: &Conversation,
        recent_turns: &[Turn],
        input: &str,
        model: &str,
    ) -> Result<InvocationOutcome> {
        let parsed = parse_command(input);

        if let Some(key) = parsed.command.as_deref() {
            if let Some(mode) = self.mode(key) {
                debug!(conversation = %conversation.id, mode = ?mode, "Dispatching to mode");
                return match mode {
                    Mode::Chat => Ok(self.converse(conversation, recent_turns, &parsed.rest, model).await),
                    Mode::Summary => {
                        self.handle_summary(conversation, recent_turns, &parsed.rest, model)
                            .await
                    }
                };
            }

            if let Some(tool) = self.tools.by_slash_command(key) {
                info!(conversation = %conversation.id, tool = tool.name(), "Running slash tool");
                let result = tool.execute(&parsed.rest).await;
                let enriched = enrich_prompt(input.trim(), &[result]);
                return Ok(self.converse(conversation, recent_turns, &enriched, model).await);
            }

            debug!(command = key, "Unknown command, treating as plain text");
        } else if self.router_enabled {
            let selections = self.select_tools(&parsed.rest).await;
            let results = self.execute_tools(&selections).await;
            let enriched = enrich_prompt(&parsed.rest, &results);
            return Ok(self.converse(conversation, recent_turns, &enriched, model).await);
        }

        Ok(self.converse(conversation, recent_turns, &parsed.rest, model).await)
    }

    /// Try each candidate model in order; accept the first non-blank answer.
    ///
    /// Repeated candidates are tried once.
    pub async fn process_with_fallback(
        &self,
        conversation: &Conversation,
        recent_turns: &[Turn],
        input: &str,
        candidates: &[String],
    ) -> Result<Reply> {
        let mut tried: Vec<String> = Vec::new();
        let mut last_reason = String::from("no candidate model");

        for model in candidates {
            if tried.contains(model) {
                continue;
            }
            tried.push(model.clone());

            match self.process(conversation, recent_turns, input, model).await? {
                InvocationOutcome::Success(text) if !text.trim().is_empty() => {
                    if tried.len() > 1 {
                        info!(conversation = %conversation.id, model = %model, "Fallback model answered");
                    }
                    return Ok(Reply {
                        text,
                        model: model.clone(),
                    });
                }
                InvocationOutcome::Success(_) => {
                    warn!(conversation = %conversation.id, model = %model, "Model returned an empty answer, trying next");
                    last_reason = format!("{model} returned an empty answer");
                }
                InvocationOutcome::Failure(reason) => {
                    warn!(conversation = %conversation.id, model = %model, reason = %reason, "Model failed, trying next");
                    last_reason = reason;
                }
            }
        }

        Err(Error::AllModelsFailed { tried, last_reason })
    }

    async fn converse(
        &self,
        conversation: &Conversation,
        recent_turns: &[Turn],
        input: &str,
        model: &str,
    ) -> InvocationOutcome {
        let payload = self.assembler.assemble(
            &conversation.system_prompt,
            &conversation.memory,
            recent_turns,
            input,
        );
        self.invoker.invoke(payload, model).await
    }

    async fn handle_summary(
        &self,
        conversation: &Conversation,
        recent_turns: &[Turn],
        instruction: &str,
        model: &str,
    ) -> Result<InvocationOutcome> {
        let instruction = instruction.trim();
        let updated = self
            .summarizer
            .update(
                recent_turns,
                &conversation.memory,
                model,
                Some(instruction).filter(|i| !i.is_empty()),
            )
            .await;

        let Some(memory) = updated else {
            return Ok(InvocationOutcome::Success(NO_SUMMARY_MESSAGE.into()));
        };

        self.store
            .replace_memory(&conversation.id, memory.clone())
            .await?;
        info!(conversation = %conversation.id, "Memory refreshed on request");

        let request = if instruction.is_empty() {
            DEFAULT_SUMMARY_REQUEST
        } else {
            instruction
        };
        let payload = vec![
            ChatMessage::system(RESTATE_INSTRUCTIONS),
            ChatMessage::user(format!(
                "Here is the JSON summary of our conversation:\n{memory}\n\nRequest: {request}"
            )),
        ];

        let text = match self.invoker.invoke(payload, model).await {
            InvocationOutcome::Success(text) if !text.trim().is_empty() => text,
            _ => SUMMARY_FAILED_MESSAGE.to_string(),
        };
        Ok(InvocationOutcome::Success(text))
    }

    /// Ask the router model which tools apply to `input`.
    async fn select_tools(&self, input: &str) -> Vec<(String, String)> {
        if self.tools.is_empty() {
            return Vec::new();
        }

        let catalog = self
            .tools
            .descriptors()
            .iter()
            .map(|d| format!("- {}: {}", d.name, d.description))
            .collect::<Vec<_>>()
            .join("\n");

        let instructions = format!(
            "You are a tool selector. Given the user's request, decide which tools to call.\n\
             Available tools:\n{catalog}\n\n\
             Reply ONLY with the format: tool(argument), separated by commas.\n\
             If a tool needs no argument, write: tool()\n\
             If no tool is needed, reply: none\n\n\
             Examples:\n\
             - 'What time is it?' -> datetime()\n\
             - 'Weather in Paris?' -> get_weather(Paris)\n\
             - 'Time and weather in Lyon?' -> datetime(), get_weather(Lyon)"
        );

        let payload = vec![ChatMessage::system(instructions), ChatMessage::user(input)];
        match self.invoker.invoke(payload, &self.router_model).await {
            InvocationOutcome::Success(reply) => {
                let selections = parse_tool_selections(&reply, &self.tools);
                debug!(selected = selections.len(), "Router picked tools");
                selections
            }
            InvocationOutcome::Failure(reason) => {
                warn!(model = %self.router_model, reason = %reason, "Tool routing failed, continuing without tools");
                Vec::new()
            }
        }
    }

    async fn execute_tools(&self, selections: &[(String, String)]) -> Vec<ToolInvocationResult> {
        let mut results = Vec::with_capacity(selections.len());
        for (name, argument) in selections {
            if let Some(tool) = self.tools.get(name) {
                info!(tool = %name, "Running routed tool");
                results.push(tool.execute(argument).await);
            }
        }
        results
    }
}
