//! Provider seam: one adapter per provider family behind a common trait.
//!
//! The router dispatches through a lookup table built at construction, so
//! adding a provider family means adding one variant and one table entry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::anthropic::AnthropicAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAiAdapter;
use super::types::{LlmError, LlmRequest, LlmResponse, ModelConfig, ProviderFamily};

/// A provider adapter: translates a normalized request into one upstream
/// call and normalizes the reply.
#[async_trait]
pub trait Provider: Send + Sync {
    fn family(&self) -> ProviderFamily;

    /// Issue one completion call. No retries here; the retry executor owns
    /// the attempt loop.
    async fn call(
        &self,
        model: &ModelConfig,
        request: &LlmRequest,
    ) -> std::result::Result<LlmResponse, LlmError>;

    /// Cheap availability check without a full generation.
    async fn health_check(&self) -> std::result::Result<(), LlmError>;
}

/// Build the family -> adapter table used by the router.
pub fn build_providers() -> HashMap<ProviderFamily, Arc<dyn Provider>> {
    let mut providers: HashMap<ProviderFamily, Arc<dyn Provider>> = HashMap::new();
    providers.insert(ProviderFamily::OpenAi, Arc::new(OpenAiAdapter::new()));
    providers.insert(ProviderFamily::Anthropic, Arc::new(AnthropicAdapter::new()));
    providers.insert(ProviderFamily::Ollama, Arc::new(OllamaAdapter::new()));
    providers
}

/// Read an env var, treating empty values as unset.
pub(crate) fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Map a non-2xx status + body into the provider error taxonomy.
///
/// Shared by the hosted adapters; body text is folded into the message so
/// substring classification (401/quota/content_policy) keeps working on
/// providers that signal through the body rather than the status.
pub(crate) fn classify_http_error(status: u16, body: &str, model: &str) -> LlmError {
    let lowered = body.to_ascii_lowercase();
    match status {
        401 | 403 => LlmError::Authentication(format!("HTTP {status}: {body}")),
        404 => LlmError::ModelNotFound(model.to_string()),
        429 => {
            if lowered.contains("quota") || lowered.contains("billing") {
                LlmError::QuotaExhausted(format!("HTTP 429: {body}"))
            } else {
                LlmError::RateLimited(format!("HTTP 429: {body}"))
            }
        }
        400 if lowered.contains("content_policy") || lowered.contains("content_filter") => {
            LlmError::ContentPolicy(format!("HTTP 400: {body}"))
        }
        _ => LlmError::Provider(format!("HTTP {status}: {body}")),
    }
}
