//! Uniform output of the reasoning engine.
//!
//! The engine has no visible failure path: router and pipeline failures
//! become degraded results carrying the original error class in metadata,
//! never an Err to the caller.

use serde::{Deserialize, Serialize};

use crate::MurmurError;

use super::config::ReasoningMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    DirectResponse,
    ToolUse,
    MultiStep,
}

/// One element of a multi-step trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub index: u32,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub confidence: f32,
}

impl ReasoningStep {
    pub fn thought(index: u32, thought: impl Into<String>, confidence: f32) -> Self {
        Self {
            index,
            thought: thought.into(),
            action: None,
            observation: None,
            confidence,
        }
    }
}

/// Why a result was degraded rather than answered at full confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedKind {
    Configuration,
    Availability,
    Provider,
    Exhaustion,
    Pipeline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Degradation {
    pub kind: DegradedKind,
    pub message: String,
}

impl Degradation {
    pub fn from_error(error: &MurmurError) -> Self {
        let kind = match error {
            MurmurError::NoModelsConfigured => DegradedKind::Configuration,
            MurmurError::NoAvailableModels(_) => DegradedKind::Availability,
            MurmurError::AllModelsFailed(_) => DegradedKind::Exhaustion,
            MurmurError::PipelineError(_) => DegradedKind::Pipeline,
            _ => DegradedKind::Provider,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ReasoningMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<Degradation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResult {
    pub kind: ResultKind,
    pub content: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<ReasoningStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<String>,
    pub metadata: ResultMetadata,
}

impl ReasoningResult {
    pub fn direct(content: impl Into<String>, confidence: f32, mode: ReasoningMode) -> Self {
        Self {
            kind: ResultKind::DirectResponse,
            content: content.into(),
            confidence,
            steps: vec![],
            tool_calls: vec![],
            metadata: ResultMetadata {
                mode: Some(mode),
                ..Default::default()
            },
        }
    }

    pub fn multi_step(
        content: impl Into<String>,
        confidence: f32,
        steps: Vec<ReasoningStep>,
        mode: ReasoningMode,
    ) -> Self {
        Self {
            kind: ResultKind::MultiStep,
            content: content.into(),
            confidence,
            steps,
            tool_calls: vec![],
            metadata: ResultMetadata {
                mode: Some(mode),
                ..Default::default()
            },
        }
    }

    /// A valid low-confidence result standing in for a failure.
    pub fn degraded(
        kind: ResultKind,
        degradation: Degradation,
        mode: Option<ReasoningMode>,
    ) -> Self {
        let content = format!(
            "I couldn't complete that request right now ({}).",
            degradation.message
        );
        Self {
            kind,
            content,
            confidence: 0.2,
            steps: vec![],
            tool_calls: vec![],
            metadata: ResultMetadata {
                mode,
                trace_id: None,
                degraded: Some(degradation),
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.metadata.degraded.is_some()
    }
}
