#![allow(dead_code)]

//! Scripted provider doubles shared by the integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use murmur_core::llm::{LlmError, LlmRequest, LlmResponse, ModelConfig, Provider, ProviderFamily};

/// What the next call to a model should do.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Succeed { content: &'static str, cost: f64 },
    FailTransient,
    FailAuth,
    Hang,
}

pub fn ok_response(content: &str, cost: f64) -> LlmResponse {
    LlmResponse {
        id: "stub".into(),
        content: content.into(),
        tokens_in: 10,
        tokens_out: 5,
        cost,
        confidence: None,
    }
}

pub struct ScriptedProvider {
    family: ProviderFamily,
    fallback: Script,
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: Mutex<HashMap<String, usize>>,
    pub requests: Mutex<Vec<LlmRequest>>,
    healthy: bool,
}

impl ScriptedProvider {
    pub fn new(family: ProviderFamily, fallback: Script) -> Self {
        Self {
            family,
            fallback,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Queue scripted steps for one model; the fallback applies once the
    /// queue is drained.
    pub fn script(&self, model: &str, steps: Vec<Script>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), steps.into());
    }

    pub fn call_count(&self, model: &str) -> usize {
        self.calls.lock().unwrap().get(model).copied().unwrap_or(0)
    }

    pub fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn family(&self) -> ProviderFamily {
        self.family
    }

    async fn call(
        &self,
        model: &ModelConfig,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        *self
            .calls
            .lock()
            .unwrap()
            .entry(model.name.clone())
            .or_insert(0) += 1;

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&model.name)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(self.fallback);

        match step {
            Script::Succeed { content, cost } => Ok(ok_response(content, cost)),
            Script::FailTransient => Err(LlmError::Network("connection reset by stub".into())),
            Script::FailAuth => Err(LlmError::Authentication("HTTP 401: invalid_api_key".into())),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.healthy {
            Ok(())
        } else {
            Err(LlmError::LocalUnreachable("stub".into()))
        }
    }
}

/// Family -> adapter table from explicit entries.
pub fn providers_map(
    entries: Vec<(ProviderFamily, Arc<ScriptedProvider>)>,
) -> HashMap<ProviderFamily, Arc<dyn Provider>> {
    entries
        .into_iter()
        .map(|(family, provider)| (family, provider as Arc<dyn Provider>))
        .collect()
}
