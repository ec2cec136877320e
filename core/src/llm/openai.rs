//! Chat-completions adapter for hosted OpenAI-compatible backends.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::pricing::{cost_for, estimate_tokens};
use super::provider::{classify_http_error, env_nonempty, Provider};
use super::types::{LlmError, LlmRequest, LlmResponse, ModelConfig, ProviderFamily, Role};
use async_trait::async_trait;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    http: Client,
    base_url_override: Option<String>,
}

/// Credentials and endpoint, re-read on every call so key rotation takes
/// effect on the next request without a restart.
struct OpenAiCallConfig {
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url_override: None,
        }
    }

    /// Pin the endpoint instead of reading it from the environment.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url_override: Some(base_url.into()),
        }
    }

    fn call_config(&self) -> OpenAiCallConfig {
        OpenAiCallConfig {
            base_url: self
                .base_url_override
                .clone()
                .or_else(|| env_nonempty("MURMUR_OPENAI_URL"))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: env_nonempty("OPENAI_API_KEY"),
        }
    }

    fn build_messages(request: &LlmRequest) -> Vec<Value> {
        let mut messages = Vec::new();
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(json!({"role": "system", "content": system}));
        }
        for turn in &request.history {
            match turn.role {
                Role::Assistant if !turn.tool_calls.is_empty() => {
                    let tool_calls: Vec<Value> = turn
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string(),
                                },
                            })
                        })
                        .collect();
                    messages.push(json!({
                        "role": "assistant",
                        "content": turn.content,
                        "tool_calls": tool_calls,
                    }));
                }
                Role::Tool => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": turn.tool_call_id.clone().unwrap_or_default(),
                        "content": turn.content,
                    }));
                }
                Role::System => {
                    messages.push(json!({"role": "system", "content": turn.content}));
                }
                Role::User => {
                    messages.push(json!({"role": "user", "content": turn.content}));
                }
                Role::Assistant => {
                    messages.push(json!({"role": "assistant", "content": turn.content}));
                }
            }
        }
        messages.push(json!({"role": "user", "content": request.prompt}));
        messages
    }
}

impl Default for OpenAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl Provider for OpenAiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAi
    }

    async fn call(
        &self,
        model: &ModelConfig,
        request: &LlmRequest,
    ) -> std::result::Result<LlmResponse, LlmError> {
        let cfg = self.call_config();
        let url = format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'));
        debug!(target = "llm.openai", model = %model.name, %url, "POST chat.completions");

        let body = json!({
            "model": model.name,
            "messages": Self::build_messages(request),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let mut req = self.http.post(&url).header("content-type", "application/json");
        if let Some(key) = &cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_http_error(status, &body, &model.name));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Provider(format!("failed to parse chat.completions JSON: {e}")))?;

        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| LlmError::Provider("chat.completions returned no choices".into()))?;
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(LlmError::ContentPolicy(format!(
                "completion for {} stopped by content filter",
                model.name
            )));
        }
        let content = choice.message.content.clone().unwrap_or_default();

        let (tokens_in, tokens_out) = match &parsed.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (estimate_tokens(&request.prompt), estimate_tokens(&content)),
        };

        Ok(LlmResponse {
            id: parsed.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            content,
            tokens_in,
            tokens_out,
            cost: cost_for(&model.name, tokens_in, tokens_out),
            confidence: None,
        })
    }

    async fn health_check(&self) -> std::result::Result<(), LlmError> {
        let cfg = self.call_config();
        let url = format!("{}/models", cfg.base_url.trim_end_matches('/'));
        let mut req = self.http.get(&url);
        if let Some(key) = &cfg.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| LlmError::Network(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(classify_http_error(resp.status().as_u16(), "", "models"))
        }
    }
}
