//! Model Router: picks a backend, attempts it with retries, cascades to
//! fallbacks, and accounts for every attempt.
//!
//! All breaker/rate-window/metrics state is owned by the router instance,
//! one entry per configured model, created at construction and never
//! replaced. Candidate lists are computed per call and never stored, so
//! offline substitution is scoped to a single call by construction.

mod breaker;
mod connectivity;
mod metrics;
mod rate_limit;
mod retry;

pub use breaker::{BreakerConfig, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use connectivity::ConnectivityConfig;
pub use metrics::ModelMetrics;
pub use rate_limit::{RateLimitConfig, RateWindow};
pub use retry::{AttemptHooks, RetryConfig, RetryExecutor};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::llm::{
    build_providers, ChatMessage, LlmError, LlmRequest, LlmResponse, ModelConfig, Provider,
    ProviderFamily,
};
use crate::{MurmurError, Result};

/// Construction-time configuration for the router.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub models: Vec<ModelConfig>,
    pub breaker: BreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub connectivity: ConnectivityConfig,
}

impl RouterConfig {
    pub fn new(models: Vec<ModelConfig>) -> Self {
        Self {
            models,
            ..Default::default()
        }
    }
}

/// Per-call options for `route`.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Explicit model preference; wins when present and available
    pub preferred_model: Option<String>,
    pub system: Option<String>,
    pub history: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Overrides the configured per-attempt timeout
    pub attempt_timeout: Option<Duration>,
}

/// Mutable state for one model; mutated only through the dashmap entry in
/// short synchronous sections, never across an await.
struct ModelState {
    breaker: CircuitBreaker,
    window: RateWindow,
    metrics: ModelMetrics,
}

pub struct ModelRouter {
    models: Vec<ModelConfig>,
    providers: HashMap<ProviderFamily, Arc<dyn Provider>>,
    state: DashMap<String, ModelState>,
    retry: RetryExecutor,
    connectivity: ConnectivityConfig,
    http: reqwest::Client,
}

/// Attempt hooks bound to the router's state map: every attempt counts
/// against the rate window (and half-open probe budget), every outcome
/// lands in breaker + metrics exactly once.
struct StateHooks<'a> {
    state: &'a DashMap<String, ModelState>,
}

impl AttemptHooks for StateHooks<'_> {
    fn on_attempt(&self, model: &str) {
        if let Some(mut entry) = self.state.get_mut(model) {
            entry.window.record_attempt();
            entry.breaker.note_probe();
        }
    }

    fn on_success(&self, model: &str, response: &LlmResponse) {
        if let Some(mut entry) = self.state.get_mut(model) {
            entry.breaker.record_success();
            entry
                .metrics
                .record_success(response.tokens_in, response.tokens_out, response.cost);
        }
    }

    fn on_failure(&self, model: &str, _error: &LlmError) {
        if let Some(mut entry) = self.state.get_mut(model) {
            entry.breaker.record_failure();
            entry.metrics.record_failure();
        }
    }
}

impl ModelRouter {
    pub fn new(config: RouterConfig) -> Self {
        let providers = build_providers();
        Self::with_providers(config, providers)
    }

    /// Construct with an explicit adapter table (tests, custom endpoints).
    pub fn with_providers(
        config: RouterConfig,
        providers: HashMap<ProviderFamily, Arc<dyn Provider>>,
    ) -> Self {
        let state = DashMap::new();
        for model in &config.models {
            state.insert(
                model.name.clone(),
                ModelState {
                    breaker: CircuitBreaker::new(config.breaker.clone()),
                    window: RateWindow::new(config.rate_limit.clone()),
                    metrics: ModelMetrics::default(),
                },
            );
        }
        Self {
            models: config.models,
            providers,
            state,
            retry: RetryExecutor::new(config.retry),
            connectivity: config.connectivity,
            http: reqwest::Client::new(),
        }
    }

    /// Route a prompt to the best available model, cascading to fallbacks.
    pub async fn route(&self, prompt: &str, options: &RouteOptions) -> Result<LlmResponse> {
        let candidates: Vec<&ModelConfig> = self.models.iter().collect();
        self.route_among(candidates, prompt, options).await
    }

    /// Offline-aware variant: when outbound connectivity is down, route
    /// among healthy local models only; when online routing fails anyway,
    /// try the same local subset once before surfacing the failure. The
    /// full model list is untouched either way.
    pub async fn route_with_offline_fallback(
        &self,
        prompt: &str,
        options: &RouteOptions,
    ) -> Result<LlmResponse> {
        if self.models.is_empty() {
            return Err(MurmurError::NoModelsConfigured);
        }

        if !connectivity::is_online(&self.http, &self.connectivity).await {
            info!(target = "model_router", "offline; routing among local models only");
            let local = self.healthy_local_candidates().await;
            if local.is_empty() {
                return Err(MurmurError::NoAvailableModels(
                    "offline and no healthy local inference server".into(),
                ));
            }
            return self.route_among(local, prompt, options).await;
        }

        let candidates: Vec<&ModelConfig> = self.models.iter().collect();
        match self.route_among(candidates, prompt, options).await {
            Ok(response) => Ok(response),
            Err(primary_err) => {
                let local = self.healthy_local_candidates().await;
                if local.is_empty() {
                    return Err(primary_err);
                }
                warn!(
                    target = "model_router",
                    error = %primary_err,
                    "online routing failed; trying local models as last resort"
                );
                match self.route_among(local, prompt, options).await {
                    Ok(response) => Ok(response),
                    Err(_) => Err(primary_err),
                }
            }
        }
    }

    async fn route_among(
        &self,
        candidates: Vec<&ModelConfig>,
        prompt: &str,
        options: &RouteOptions,
    ) -> Result<LlmResponse> {
        if self.models.is_empty() {
            return Err(MurmurError::NoModelsConfigured);
        }

        let available: Vec<&ModelConfig> = candidates
            .into_iter()
            .filter(|model| {
                match self.state.get_mut(&model.name) {
                    Some(mut entry) => {
                        let open = !entry.breaker.is_available();
                        let limited = entry.window.is_limited();
                        if open || limited {
                            debug!(
                                target = "model_router",
                                model = %model.name,
                                circuit_open = open,
                                rate_limited = limited,
                                "model excluded from candidate set"
                            );
                        }
                        !open && !limited
                    }
                    None => false,
                }
            })
            .collect();

        if available.is_empty() {
            return Err(MurmurError::NoAvailableModels(
                "every candidate is circuit-open or rate-limited".into(),
            ));
        }

        let ordered = self.rank_candidates(available, options.preferred_model.as_deref());
        debug!(
            target = "model_router",
            primary = %ordered[0].name,
            fallbacks = ordered.len() - 1,
            "candidate order fixed for this call"
        );

        let hooks = StateHooks { state: &self.state };
        let mut last_error: Option<LlmError> = None;

        for model in ordered {
            let provider = match self.providers.get(&model.family) {
                Some(p) => p,
                None => {
                    last_error = Some(LlmError::Provider(format!(
                        "no adapter registered for family {}",
                        model.family.label()
                    )));
                    continue;
                }
            };

            let request = self.build_request(model, prompt, options);
            match self
                .retry
                .attempt(
                    provider.as_ref(),
                    model,
                    &request,
                    options.attempt_timeout,
                    &hooks,
                )
                .await
            {
                Ok(response) => {
                    info!(
                        target = "model_router",
                        model = %model.name,
                        tokens = response.tokens_used(),
                        cost = response.cost,
                        "routed successfully"
                    );
                    return Ok(response);
                }
                Err(error) => {
                    warn!(
                        target = "model_router",
                        model = %model.name,
                        error = %error,
                        "model exhausted; falling back"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(MurmurError::AllModelsFailed(last_error.unwrap_or_else(
            || LlmError::Provider("no candidate was attempted".into()),
        )))
    }

    /// Order by historical success rate (unknown history counts as 1.0),
    /// configuration order breaking ties; an available explicit preference
    /// jumps the queue. Latency is deliberately not a factor here.
    fn rank_candidates<'a>(
        &self,
        available: Vec<&'a ModelConfig>,
        preferred: Option<&str>,
    ) -> Vec<&'a ModelConfig> {
        let mut scored: Vec<(&ModelConfig, f64)> = available
            .into_iter()
            .map(|model| {
                let rate = self
                    .state
                    .get(&model.name)
                    .map(|entry| entry.metrics.success_rate())
                    .unwrap_or(1.0);
                (model, rate)
            })
            .collect();
        // Stable sort keeps configuration order within equal rates
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut ordered: Vec<&ModelConfig> = scored.into_iter().map(|(m, _)| m).collect();
        if let Some(name) = preferred {
            if let Some(pos) = ordered.iter().position(|m| m.name == name) {
                let preferred_model = ordered.remove(pos);
                ordered.insert(0, preferred_model);
            }
        }
        ordered
    }

    fn build_request(&self, model: &ModelConfig, prompt: &str, options: &RouteOptions) -> LlmRequest {
        LlmRequest {
            system: options.system.clone(),
            prompt: prompt.to_string(),
            history: options.history.clone(),
            temperature: options.temperature.unwrap_or(model.temperature),
            max_tokens: options.max_tokens.unwrap_or(model.max_tokens),
        }
    }

    /// Local-family models whose inference server answers its health probe.
    async fn healthy_local_candidates(&self) -> Vec<&ModelConfig> {
        let locals: Vec<&ModelConfig> = self
            .models
            .iter()
            .filter(|model| model.family.is_local())
            .collect();

        let probes = locals.iter().map(|model| {
            let provider = self.providers.get(&model.family).cloned();
            async move {
                match provider {
                    Some(p) => p.health_check().await.is_ok(),
                    None => false,
                }
            }
        });
        let healthy = futures::future::join_all(probes).await;

        locals
            .into_iter()
            .zip(healthy)
            .filter_map(|(model, ok)| ok.then_some(model))
            .collect()
    }

    /// Probe every configured adapter concurrently.
    pub async fn health_check_all(&self) -> HashMap<String, std::result::Result<(), LlmError>> {
        let checks = self.models.iter().map(|model| {
            let provider = self.providers.get(&model.family).cloned();
            let name = model.name.clone();
            async move {
                let result = match provider {
                    Some(p) => p.health_check().await,
                    None => Err(LlmError::Provider("no adapter registered".into())),
                };
                (name, result)
            }
        });
        futures::future::join_all(checks).await.into_iter().collect()
    }

    /// Snapshot of per-model metrics. Two reads with no intervening
    /// traffic return identical values.
    pub fn get_metrics(&self) -> HashMap<String, ModelMetrics> {
        self.state
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics.clone()))
            .collect()
    }

    pub fn get_circuit_breaker_status(&self) -> HashMap<String, BreakerSnapshot> {
        self.state
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().breaker.snapshot()))
            .collect()
    }

    pub fn get_total_cost(&self) -> f64 {
        self.state
            .iter()
            .map(|entry| entry.value().metrics.total_cost)
            .sum()
    }

    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }
}
