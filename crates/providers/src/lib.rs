//! Model providers for Parley.
//!
//! [`OpenAiCompatProvider`] speaks the `/chat/completions` wire protocol;
//! [`ResilientInvoker`] layers the per-attempt timeout schedule and
//! rate-limit backoff on top of any `parley_core::Provider`.

pub mod openai_compat;
pub mod resilient;

pub use openai_compat::OpenAiCompatProvider;
pub use resilient::{InvocationOutcome, ResilientInvoker};
