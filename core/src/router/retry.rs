//! Retry executor: one provider call wrapped in bounded exponential
//! backoff with jitter and a per-attempt timeout race.
//!
//! Breaker and metrics updates happen through `AttemptHooks` immediately
//! on each attempt, not at the end of the loop, so the breaker sees every
//! failed attempt as it happens.

use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

use crate::llm::{LlmError, LlmRequest, LlmResponse, ModelConfig, Provider};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
    /// Timeout raced against each individual attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_jitter: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-attempt observer; the router implements this to keep breaker,
/// rate-window, and metrics state current.
pub trait AttemptHooks: Send + Sync {
    fn on_attempt(&self, model: &str);
    fn on_success(&self, model: &str, response: &LlmResponse);
    fn on_failure(&self, model: &str, error: &LlmError);
}

/// Backoff before the retry following `completed_attempts` failures:
/// min(base * 2^n + jitter, cap). Jitter spreads recovering herds.
pub(crate) fn backoff_delay(completed_attempts: u32, config: &RetryConfig) -> Duration {
    let exp = config
        .base_delay
        .saturating_mul(2u32.saturating_pow(completed_attempts));
    let jitter_ms = config.max_jitter.as_millis() as u64;
    let jitter = if jitter_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    };
    (exp + jitter).min(config.max_delay)
}

pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Attempt one model, retrying transient failures; resolves with the
    /// last error once retries are exhausted or a permanent failure is hit.
    pub async fn attempt(
        &self,
        provider: &dyn Provider,
        model: &ModelConfig,
        request: &LlmRequest,
        timeout_override: Option<Duration>,
        hooks: &dyn AttemptHooks,
    ) -> std::result::Result<LlmResponse, LlmError> {
        let timeout = timeout_override.unwrap_or(self.config.attempt_timeout);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1, &self.config);
                debug!(
                    target = "model_router",
                    model = %model.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            hooks.on_attempt(&model.name);

            // Dropping the call future on timeout aborts the in-flight
            // request; nothing keeps polling it.
            let outcome = match tokio::time::timeout(timeout, provider.call(model, request)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(timeout.as_millis() as u64)),
            };

            match outcome {
                Ok(response) => {
                    hooks.on_success(&model.name, &response);
                    return Ok(response);
                }
                Err(error) => {
                    hooks.on_failure(&model.name, &error);
                    let retryable = error.is_retryable();
                    warn!(
                        target = "model_router",
                        model = %model.name,
                        attempt,
                        retryable,
                        error = %error,
                        "attempt failed"
                    );
                    last_error = Some(error);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Provider("no attempts were made".into())))
    }
}
