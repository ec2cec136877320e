//! LLM provider layer: normalized request/response types, the provider
//! trait, and one adapter per provider family.
//!
//! This module provides:
//! - `ModelConfig`, `LlmRequest`, `LlmResponse`, `LlmError` shared types
//! - the `Provider` trait and the family -> adapter table
//! - `OpenAiAdapter`, `AnthropicAdapter`, `OllamaAdapter`
//! - the static price table for cost accounting

mod anthropic;
mod ollama;
mod openai;
pub mod pricing;
mod provider;
mod types;

pub use anthropic::AnthropicAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use provider::{build_providers, Provider};
pub use types::{
    ChatMessage, LlmError, LlmRequest, LlmResponse, ModelConfig, ProviderFamily, Role,
    ToolInvocation,
};

