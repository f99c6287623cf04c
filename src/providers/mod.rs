//! Wire-format implementations for the supported provider kinds.
//!
//! Two dialects cover all five kinds:
//!
//! ```text
//! openai_compat.rs  <- OpenAI-compatible chat completions wire format
//!      |       |       |       |
//!   Gateway  OpenAi  DeepSeek  Groq
//!
//! anthropic.rs      <- Anthropic's native messages wire format
//! ```
//!
//! [`ProviderAdapter`] routes each [`Target`](crate::registry::Target) to the
//! dialect its kind speaks and normalizes the reply into a [`ProviderReply`].
//! Adapters are stateless between calls apart from the shared HTTP client;
//! retry and rate limiting are left to callers.

pub mod adapter;
mod anthropic;
mod openai_compat;

#[cfg(test)]
mod tests;

pub use adapter::{ProviderAdapter, ProviderReply};
