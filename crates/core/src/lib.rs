//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley conversation
//! engine. This crate has **no runtime dependencies** on HTTP or storage;
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here (`Provider`, `Tool`,
//! `ConversationStore`). Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError};
pub use memory::{StructuredMemory, recover_json_object};
pub use message::{Conversation, ConversationId, Role, Turn};
pub use provider::{ChatMessage, Provider, ProviderRequest, ProviderResponse, Usage};
pub use store::ConversationStore;
pub use tool::{Tool, ToolDescriptor, ToolInvocationResult, ToolRegistry};
