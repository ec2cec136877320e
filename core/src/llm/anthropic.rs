//! Messages-style adapter.
//!
//! This family enforces tool-use turn pairing upstream: an assistant turn
//! that invoked tools must be followed by matching tool-result turns, or
//! the API rejects the whole conversation. `repair_history` synthesizes
//! placeholder results for any invocation left dangling.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::pricing::{cost_for, estimate_tokens};
use super::provider::{classify_http_error, env_nonempty, Provider};
use super::types::{ChatMessage, LlmError, LlmRequest, LlmResponse, ModelConfig, ProviderFamily, Role};
use async_trait::async_trait;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const PLACEHOLDER_RESULT: &str = "[tool result unavailable]";

pub struct AnthropicAdapter {
    http: Client,
    base_url_override: Option<String>,
}

struct AnthropicCallConfig {
    base_url: String,
    api_key: Option<String>,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url_override: None,
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url_override: Some(base_url.into()),
        }
    }

    fn call_config(&self) -> AnthropicCallConfig {
        AnthropicCallConfig {
            base_url: self
                .base_url_override
                .clone()
                .or_else(|| env_nonempty("MURMUR_ANTHROPIC_URL"))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: env_nonempty("ANTHROPIC_API_KEY"),
        }
    }

    fn build_messages(history: &[ChatMessage], prompt: &str) -> Vec<Value> {
        let repaired = repair_history(history);
        let mut messages = Vec::new();
        for turn in &repaired {
            match turn.role {
                Role::Assistant if !turn.tool_calls.is_empty() => {
                    let mut content = Vec::new();
                    if !turn.content.is_empty() {
                        content.push(json!({"type": "text", "text": turn.content}));
                    }
                    for tc in &turn.tool_calls {
                        content.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments,
                        }));
                    }
                    messages.push(json!({"role": "assistant", "content": content}));
                }
                Role::Assistant => {
                    messages.push(json!({"role": "assistant", "content": turn.content}));
                }
                Role::Tool => {
                    messages.push(json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": turn.tool_call_id.clone().unwrap_or_default(),
                            "content": turn.content,
                        }],
                    }));
                }
                // System turns ride in the top-level system field; anything
                // left in history is demoted to a user turn.
                Role::System | Role::User => {
                    messages.push(json!({"role": "user", "content": turn.content}));
                }
            }
        }
        messages.push(json!({"role": "user", "content": prompt}));
        messages
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Ensure every assistant tool invocation is answered before the next
/// non-result turn; synthesize placeholders for the ones that are not.
pub(crate) fn repair_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut repaired: Vec<ChatMessage> = Vec::with_capacity(history.len());
    let mut index = 0;
    while index < history.len() {
        let turn = &history[index];
        repaired.push(turn.clone());
        index += 1;

        if turn.role != Role::Assistant || turn.tool_calls.is_empty() {
            continue;
        }

        // Collect the result turns that immediately follow this invocation.
        let mut answered: Vec<&str> = Vec::new();
        while index < history.len() && history[index].role == Role::Tool {
            if let Some(id) = history[index].tool_call_id.as_deref() {
                answered.push(id);
            }
            repaired.push(history[index].clone());
            index += 1;
        }

        for tc in &turn.tool_calls {
            if !answered.contains(&tc.id.as_str()) {
                warn!(
                    target = "llm.anthropic",
                    tool = %tc.name,
                    call_id = %tc.id,
                    "synthesizing missing tool result turn"
                );
                repaired.push(ChatMessage::tool_result(tc.id.clone(), PLACEHOLDER_RESULT));
            }
        }
    }
    repaired
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    id: Option<String>,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl Provider for AnthropicAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Anthropic
    }

    async fn call(
        &self,
        model: &ModelConfig,
        request: &LlmRequest,
    ) -> std::result::Result<LlmResponse, LlmError> {
        let cfg = self.call_config();
        let url = format!("{}/v1/messages", cfg.base_url.trim_end_matches('/'));
        debug!(target = "llm.anthropic", model = %model.name, %url, "POST messages");

        let mut body = json!({
            "model": model.name,
            "messages": Self::build_messages(&request.history, &request.prompt),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            body["system"] = json!(system);
        }

        let mut req = self
            .http
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json");
        if let Some(key) = &cfg.api_key {
            req = req.header("x-api-key", key);
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

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Provider(format!("failed to parse messages JSON: {e}")))?;

        let content = parsed
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let (tokens_in, tokens_out) = match &parsed.usage {
            Some(usage) => (usage.input_tokens, usage.output_tokens),
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
        // No dedicated health endpoint; an unauthenticated GET distinguishes
        // reachable-with-valid-auth (404/405) from bad credentials.
        let cfg = self.call_config();
        let url = format!("{}/v1/messages", cfg.base_url.trim_end_matches('/'));
        let mut req = self.http.get(&url).header("anthropic-version", API_VERSION);
        if let Some(key) = &cfg.api_key {
            req = req.header("x-api-key", key);
        }
        let resp = req.send().await.map_err(|e| LlmError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        match status {
            200..=299 | 404 | 405 => Ok(()),
            401 | 403 => Err(LlmError::Authentication("invalid API key".into())),
            _ => Err(LlmError::Network(format!("HTTP {status}"))),
        }
    }
}
