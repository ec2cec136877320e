//! Local inference adapter (Ollama).
//!
//! Probes the server's tag listing before each generation so an absent
//! local server fails fast with an actionable error instead of a slow
//! connect timeout inside the generation call. Local inference is free;
//! cost is always zero.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::pricing::estimate_tokens;
use super::provider::{env_nonempty, Provider};
use super::types::{LlmError, LlmRequest, LlmResponse, ModelConfig, ProviderFamily, Role};
use async_trait::async_trait;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct OllamaAdapter {
    http: Client,
    base_url_override: Option<String>,
}

impl OllamaAdapter {
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

    fn base_url(&self) -> String {
        self.base_url_override
            .clone()
            .or_else(|| env_nonempty("MURMUR_OLLAMA_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Flatten system/history/prompt into the single prompt string the
    /// generate endpoint expects.
    fn fuse_prompt(request: &LlmRequest) -> String {
        let mut fused = String::new();
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            fused.push_str("System:\n");
            fused.push_str(system);
            fused.push_str("\n\n");
        }
        if !request.history.is_empty() {
            fused.push_str("History:\n");
            for turn in &request.history {
                let speaker = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::System => "System",
                    Role::Tool => "Tool",
                };
                fused.push_str("- ");
                fused.push_str(speaker);
                fused.push_str(": ");
                fused.push_str(&turn.content);
                fused.push('\n');
            }
            fused.push('\n');
        }
        fused.push_str("User:\n");
        fused.push_str(&request.prompt);
        fused.push('\n');
        fused
    }
}

impl Default for OllamaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

#[async_trait]
impl Provider for OllamaAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Ollama
    }

    async fn call(
        &self,
        model: &ModelConfig,
        request: &LlmRequest,
    ) -> std::result::Result<LlmResponse, LlmError> {
        self.health_check().await?;

        let base = self.base_url();
        let url = format!("{}/api/generate", base.trim_end_matches('/'));
        debug!(target = "llm.ollama", model = %model.name, %url, "POST generate");

        let prompt = Self::fuse_prompt(request);
        let body = json!({
            "model": model.name,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(if status == 404 {
                LlmError::ModelNotFound(model.name.clone())
            } else {
                LlmError::Provider(format!("HTTP {status}: {text}"))
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Provider(format!("failed to parse generate JSON: {e}")))?;

        let tokens_in = parsed
            .prompt_eval_count
            .unwrap_or_else(|| estimate_tokens(&prompt));
        let tokens_out = parsed
            .eval_count
            .unwrap_or_else(|| estimate_tokens(&parsed.response));

        Ok(LlmResponse {
            id: Uuid::new_v4().to_string(),
            content: parsed.response,
            tokens_in,
            tokens_out,
            cost: 0.0,
            confidence: None,
        })
    }

    async fn health_check(&self) -> std::result::Result<(), LlmError> {
        let base = self.base_url();
        let url = format!("{}/api/tags", base.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|_| LlmError::LocalUnreachable(base.clone()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::LocalUnreachable(base))
        }
    }
}
