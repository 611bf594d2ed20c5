//! The conversation engine of Parley.
//!
//! A user turn flows through four stages:
//!
//! 1. **Route**: explicit `/command`, model-picked tools, or plain chat
//! 2. **Assemble**: instructions + structured memory + recent turns + input
//! 3. **Invoke**: the resilient invoker, inside the model fallback chain
//! 4. **Remember**: every `summary_interval` turns, a detached task folds the
//!    latest exchanges into the structured memory

pub mod command;
pub mod context;
pub mod orchestrator;
pub mod service;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use command::{ParsedInput, enrich_prompt, parse_command, parse_tool_selections};
pub use context::{ContextAssembler, WindowSplit, split_window};
pub use orchestrator::{Mode, Orchestrator, Reply};
pub use service::{ConversationService, ServiceSettings};
pub use summarizer::{MemorySummarizer, should_summarize};
