//! Narrow interface to the external tool-execution pipeline.
//!
//! The reasoning engine submits work here and awaits a structured step
//! trace; it never interprets tool semantics beyond the fields below.
//! Implementations live outside this crate (the pipeline is an external
//! collaborator), so the types stay serialization-friendly and opaque.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Execution knobs forwarded verbatim to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunConfig {
    pub max_steps: u32,
    pub timeout_ms: u64,
    pub allow_parallel: bool,
    pub retry_count: u32,
    pub validate_results: bool,
    pub log_execution: bool,
}

impl Default for PipelineRunConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            timeout_ms: 180_000,
            allow_parallel: false,
            retry_count: 1,
            validate_results: true,
            log_execution: true,
        }
    }
}

/// One unit of work handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSubmission {
    pub prompt: String,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Restrictions derived from caller context (e.g. "no-code-execution")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    pub priority: PipelinePriority,
    pub config: PipelineRunConfig,
}

/// One executed tool step reported back by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub tool: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

/// Completed pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    pub steps: Vec<PipelineStep>,
    pub total_time_ms: u64,
}

/// The submit/await contract. `submit` resolves once the pipeline has run
/// to completion (or given up); cancellation is the caller dropping the
/// future.
#[async_trait]
pub trait ToolPipeline: Send + Sync {
    async fn submit(&self, submission: PipelineSubmission) -> Result<PipelineOutcome>;
}
