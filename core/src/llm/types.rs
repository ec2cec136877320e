//! Shared types for the provider layer: model configuration, normalized
//! requests/responses, and the provider error taxonomy.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A family of upstream backends sharing one request/response contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderFamily {
    /// Chat-completions style API (hosted, OpenAI-compatible)
    OpenAi,
    /// Messages style API with tool-result turn semantics
    Anthropic,
    /// Local inference server (Ollama)
    Ollama,
}

impl ProviderFamily {
    /// Whether this family runs against a local inference server
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderFamily::Ollama)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Anthropic => "anthropic",
            ProviderFamily::Ollama => "ollama",
        }
    }
}

impl std::str::FromStr for ProviderFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(ProviderFamily::OpenAi),
            "anthropic" => Ok(ProviderFamily::Anthropic),
            "ollama" | "local" => Ok(ProviderFamily::Ollama),
            other => Err(format!("unknown provider family: {other}")),
        }
    }
}

/// One routable backend, fixed at router construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider-facing model name (e.g. "gpt-4o-mini", "llama3.2")
    pub name: String,
    pub family: ProviderFamily,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, family: ProviderFamily) -> Self {
        Self {
            name: name.into(),
            family,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// A tool-result turn answering an assistant tool invocation
    Tool,
}

/// A tool invocation embedded in an assistant turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One turn of multi-turn history carried through to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Tool invocations issued by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    /// For `Role::Tool` turns: the invocation this result answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Normalized request handed to a provider adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Normalized result of one successful provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub id: String,
    pub content: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost: f64,
    /// Provider-reported confidence, if any; strategy defaults apply otherwise
    pub confidence: Option<f32>,
}

impl LlmResponse {
    pub fn tokens_used(&self) -> u32 {
        self.tokens_in + self.tokens_out
    }
}

/// Errors surfaced by provider adapters.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("content policy rejection: {0}")]
    ContentPolicy(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("local inference server unreachable at {0}; start it or point MURMUR_OLLAMA_URL elsewhere")]
    LocalUnreachable(String),
}

/// Markers that identify a failure as permanent for this model.
const NON_RETRYABLE_MARKERS: &[&str] = &["401", "403", "invalid_api_key", "quota", "content_policy"];

impl LlmError {
    /// Whether retrying the same model can possibly succeed.
    ///
    /// Auth, quota, and policy failures never heal on retry; the router may
    /// still fall back to a different model.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Authentication(_)
            | LlmError::QuotaExhausted(_)
            | LlmError::ContentPolicy(_)
            | LlmError::ModelNotFound(_) => false,
            LlmError::Provider(msg) | LlmError::Network(msg) | LlmError::RateLimited(msg) => {
                let msg = msg.to_ascii_lowercase();
                !NON_RETRYABLE_MARKERS.iter().any(|m| msg.contains(m))
            }
            LlmError::Timeout(_) | LlmError::LocalUnreachable(_) => true,
        }
    }
}
