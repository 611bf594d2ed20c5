//! Payload construction for model calls.
//!
//! [`assembler`] shapes the payload; [`token`] estimates sizes and fits the
//! recent-turn window next to the structured memory.

pub mod assembler;
pub mod token;

pub use assembler::ContextAssembler;
pub use token::{WindowSplit, estimate_tokens, split_window};
