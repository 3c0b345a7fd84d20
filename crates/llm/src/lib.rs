//! LLM provider abstraction for the banter conversation engine.
//!
//! The engine only ever needs "messages in, text out". Providers are
//! plain-text chat completions; transport-level concerns (auth, base URLs,
//! rate-limit mapping) live in [`http`], fallback across providers in
//! [`provider::LlmRouter`].

pub mod http;
pub mod provider;

pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmError, LlmProvider, LlmRouter,
    MockProvider, Role,
};
