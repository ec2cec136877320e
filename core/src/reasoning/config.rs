//! Configuration for the reasoning engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::llm::ChatMessage;

use super::persona::Persona;

/// Strategy shaping how a prompt is scaffolded before the model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReasoningMode {
    /// One plain model call, no added scaffolding
    #[default]
    SingleShot,
    /// Ask the model to reason step by step
    ChainOfThought,
    /// Ask the model to enumerate branches, then commit to one
    TreeOfThought,
    /// Ask the model to answer, then critique and revise its answer
    Reflexion,
}

impl ReasoningMode {
    /// Scaffold appended to the user prompt for this mode.
    pub fn shape_prompt(&self, prompt: &str) -> String {
        match self {
            ReasoningMode::SingleShot => prompt.to_string(),
            ReasoningMode::ChainOfThought => format!(
                "{prompt}\n\nThink step by step. Number each step, then state your conclusion."
            ),
            ReasoningMode::TreeOfThought => format!(
                "{prompt}\n\nEnumerate the plausible approaches as separate branches, \
                 weigh each briefly, then choose one and answer with it."
            ),
            ReasoningMode::Reflexion => format!(
                "{prompt}\n\nAnswer first. Then critique your answer for mistakes and \
                 give a corrected final version."
            ),
        }
    }

    /// Confidence assigned when the provider does not report one.
    pub fn default_confidence(&self) -> f32 {
        match self {
            ReasoningMode::SingleShot => 0.7,
            ReasoningMode::ChainOfThought => 0.75,
            ReasoningMode::TreeOfThought => 0.72,
            ReasoningMode::Reflexion => 0.78,
        }
    }

    /// Whether results from this mode carry a step trace.
    pub fn is_multi_step(&self) -> bool {
        !matches!(self, ReasoningMode::SingleShot)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReasoningMode::SingleShot => "single_shot",
            ReasoningMode::ChainOfThought => "chain_of_thought",
            ReasoningMode::TreeOfThought => "tree_of_thought",
            ReasoningMode::Reflexion => "reflexion",
        }
    }
}

/// Engine configuration; hot-swappable between calls (last write wins).
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub default_mode: ReasoningMode,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Cap on parsed reasoning steps and on pipeline execution steps
    pub max_steps: u32,
    /// Oldest history turns are dropped past this many characters
    pub history_char_budget: usize,
    /// Route through the router's offline-aware path
    pub use_offline_fallback: bool,
    pub pipeline_timeout: Duration,
    pub max_concurrent_pipeline: u32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            default_mode: ReasoningMode::default(),
            temperature: None,
            max_tokens: None,
            max_steps: 10,
            history_char_budget: 8192,
            use_offline_fallback: false,
            pipeline_timeout: Duration::from_secs(180),
            max_concurrent_pipeline: 4,
        }
    }
}

impl ReasoningConfig {
    pub fn single_shot() -> Self {
        Self::default()
    }

    pub fn chain_of_thought() -> Self {
        Self {
            default_mode: ReasoningMode::ChainOfThought,
            ..Default::default()
        }
    }

    pub fn with_default_mode(mut self, mode: ReasoningMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout = timeout;
        self
    }

    pub fn with_offline_fallback(mut self) -> Self {
        self.use_offline_fallback = true;
        self
    }
}

/// Explicit per-call context; replaces an open-ended metadata bag with
/// named optional fields and documented defaults.
#[derive(Debug, Clone, Default)]
pub struct ReasoningContext {
    /// Overrides the engine's default mode for this call
    pub mode: Option<ReasoningMode>,
    pub persona: Option<Persona>,
    /// Tools the surrounding application has made available; empty means
    /// tool-use is never triggered
    pub available_tools: Vec<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub working_dir: Option<String>,
    /// Explicit model preference forwarded to the router
    pub preferred_model: Option<String>,
    pub allow_code_execution: bool,
    pub history: Vec<ChatMessage>,
}
