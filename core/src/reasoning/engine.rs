//! Reasoning engine: resolves a strategy per request, shapes the prompt,
//! and either calls the router once or hands the request to the external
//! tool pipeline.
//!
//! The engine never surfaces an error to its caller. A dead provider or a
//! failed pipeline run degrades the answer; it does not abort the
//! conversation turn.

use std::sync::{Arc, RwLock};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::ChatMessage;
use crate::pipeline::{
    PipelineOutcome, PipelinePriority, PipelineRunConfig, PipelineStep, PipelineSubmission,
    ToolPipeline,
};
use crate::router::{ModelRouter, RouteOptions};

use super::config::{ReasoningConfig, ReasoningContext, ReasoningMode};
use super::persona::compose_system;
use super::result::{
    Degradation, DegradedKind, ReasoningResult, ReasoningStep, ResultKind, ResultMetadata,
};

/// Action vocabulary that signals a request needs real tool execution.
const TOOL_ACTION_WORDS: &[&str] = &[
    "read", "write", "execute", "run", "search", "fetch", "open", "create", "delete", "list",
    "analyze", "browse", "download", "install", "check", "scan",
];

/// Case-insensitive whole-word scan of the user prompt.
pub(crate) fn wants_tools(prompt: &str) -> bool {
    prompt
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| TOOL_ACTION_WORDS.contains(&token))
}

/// Drop oldest turns until total content fits the character budget.
pub(crate) fn trim_history(history: &[ChatMessage], budget: usize) -> Vec<ChatMessage> {
    let mut kept: Vec<ChatMessage> = history.to_vec();
    let mut total: usize = kept.iter().map(|m| m.content.chars().count()).sum();
    while total > budget && !kept.is_empty() {
        let removed = kept.remove(0);
        total -= removed.content.chars().count();
    }
    kept
}

fn is_step_marker(line: &str) -> bool {
    let lower = line.trim_start().to_ascii_lowercase();
    if lower.starts_with("step ") {
        return true;
    }
    let digits = lower.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && matches!(lower.chars().nth(digits), Some('.') | Some(')'))
}

/// Split a model reply into a step trace on numbered/"Step N" lines.
/// Unstructured replies become a single step.
pub(crate) fn parse_steps(content: &str, max_steps: u32, confidence: f32) -> Vec<ReasoningStep> {
    let mut sections: Vec<String> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if is_step_marker(line) && (sections.len() as u32) < max_steps {
            sections.push(line.trim().to_string());
        } else if let Some(last) = sections.last_mut() {
            last.push('\n');
            last.push_str(line.trim());
        } else {
            sections.push(line.trim().to_string());
        }
    }
    if sections.is_empty() {
        sections.push(content.trim().to_string());
    }
    sections
        .into_iter()
        .enumerate()
        .map(|(i, thought)| ReasoningStep::thought(i as u32 + 1, thought, confidence))
        .collect()
}

fn summarize_steps(steps: &[PipelineStep]) -> String {
    let mut out = String::new();
    for step in steps {
        if step.success {
            out.push_str(&format!(
                "{}: {}\n",
                step.tool,
                step.output.as_deref().unwrap_or("ok")
            ));
        } else {
            out.push_str(&format!(
                "{}: error: {}\n",
                step.tool,
                step.error.as_deref().unwrap_or("unknown")
            ));
        }
    }
    if out.is_empty() {
        "No tool steps were executed.".into()
    } else {
        out
    }
}

pub struct ReasoningEngine {
    config: RwLock<ReasoningConfig>,
    router: Arc<ModelRouter>,
    pipeline: Option<Arc<dyn ToolPipeline>>,
    pipeline_slots: Arc<Semaphore>,
    max_pipeline_slots: u32,
}

impl ReasoningEngine {
    pub fn new(config: ReasoningConfig, router: Arc<ModelRouter>) -> Self {
        let slots = config.max_concurrent_pipeline.max(1);
        Self {
            config: RwLock::new(config),
            router,
            pipeline: None,
            pipeline_slots: Arc::new(Semaphore::new(slots as usize)),
            max_pipeline_slots: slots,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Arc<dyn ToolPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    /// Replace the engine configuration. Last write wins; calls already in
    /// flight keep the configuration they started with.
    pub fn set_config(&self, config: ReasoningConfig) {
        match self.config.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    fn current_config(&self) -> ReasoningConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Reason about one request. Always returns a valid result; failures
    /// surface as degraded confidence plus metadata, never as an error.
    pub async fn reason(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        context: &ReasoningContext,
        civil: bool,
    ) -> ReasoningResult {
        let config = self.current_config();
        let mode = context.mode.unwrap_or(config.default_mode);
        let system = compose_system(system_prompt, context.persona, civil);

        if !context.available_tools.is_empty() && wants_tools(user_prompt) {
            debug!(
                target = "reasoning",
                tools = context.available_tools.len(),
                "action vocabulary hit; dispatching to tool pipeline"
            );
            return self.run_tool_pipeline(user_prompt, context, mode, &config).await;
        }

        self.run_strategy(mode, system, user_prompt, context, &config)
            .await
    }

    async fn run_strategy(
        &self,
        mode: ReasoningMode,
        system: String,
        user_prompt: &str,
        context: &ReasoningContext,
        config: &ReasoningConfig,
    ) -> ReasoningResult {
        let shaped = mode.shape_prompt(user_prompt);
        let options = RouteOptions {
            preferred_model: context.preferred_model.clone(),
            system: Some(system),
            history: trim_history(&context.history, config.history_char_budget),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            attempt_timeout: None,
        };

        let routed = if config.use_offline_fallback {
            self.router.route_with_offline_fallback(&shaped, &options).await
        } else {
            self.router.route(&shaped, &options).await
        };

        match routed {
            Ok(response) => {
                let confidence = response.confidence.unwrap_or(mode.default_confidence());
                info!(
                    target = "reasoning",
                    mode = mode.label(),
                    confidence,
                    "strategy call complete"
                );
                if mode.is_multi_step() {
                    let steps = parse_steps(&response.content, config.max_steps, confidence);
                    ReasoningResult::multi_step(response.content, confidence, steps, mode)
                } else {
                    ReasoningResult::direct(response.content, confidence, mode)
                }
            }
            Err(error) => {
                warn!(
                    target = "reasoning",
                    mode = mode.label(),
                    error = %error,
                    "router failed; degrading"
                );
                let kind = if mode.is_multi_step() {
                    ResultKind::MultiStep
                } else {
                    ResultKind::DirectResponse
                };
                ReasoningResult::degraded(kind, Degradation::from_error(&error), Some(mode))
            }
        }
    }

    async fn run_tool_pipeline(
        &self,
        user_prompt: &str,
        context: &ReasoningContext,
        mode: ReasoningMode,
        config: &ReasoningConfig,
    ) -> ReasoningResult {
        let Some(pipeline) = self.pipeline.clone() else {
            return ReasoningResult {
                kind: ResultKind::ToolUse,
                content: "That needs tool execution, which isn't available right now.".into(),
                confidence: 0.2,
                steps: vec![],
                tool_calls: vec![],
                metadata: ResultMetadata {
                    mode: Some(mode),
                    trace_id: None,
                    degraded: Some(Degradation {
                        kind: DegradedKind::Pipeline,
                        message: "no tool pipeline configured".into(),
                    }),
                },
            };
        };

        let permit = match self.pipeline_slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return ReasoningResult::degraded(
                    ResultKind::ToolUse,
                    Degradation {
                        kind: DegradedKind::Pipeline,
                        message: "engine is shutting down".into(),
                    },
                    Some(mode),
                );
            }
        };

        let trace_id = Uuid::new_v4().to_string();
        let mut constraints = Vec::new();
        if !context.allow_code_execution {
            constraints.push("no-code-execution".to_string());
        }
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("mode".to_string(), mode.label().to_string());
        metadata.insert(
            "submitted_at".to_string(),
            chrono::Utc::now().to_rfc3339(),
        );

        let submission = PipelineSubmission {
            prompt: user_prompt.to_string(),
            trace_id: trace_id.clone(),
            session_id: context.session_id.clone(),
            user_id: context.user_id.clone(),
            metadata,
            constraints,
            working_dir: context.working_dir.clone(),
            priority: PipelinePriority::Normal,
            config: PipelineRunConfig {
                max_steps: config.max_steps,
                timeout_ms: config.pipeline_timeout.as_millis() as u64,
                ..Default::default()
            },
        };

        info!(target = "reasoning", %trace_id, "submitting to tool pipeline");
        let outcome =
            tokio::time::timeout(config.pipeline_timeout, pipeline.submit(submission)).await;
        drop(permit);

        match outcome {
            Ok(Ok(outcome)) => Self::convert_outcome(outcome, trace_id, mode),
            Ok(Err(error)) => {
                warn!(target = "reasoning", %trace_id, error = %error, "pipeline submission failed");
                ReasoningResult::degraded(
                    ResultKind::ToolUse,
                    Degradation::from_error(&error),
                    Some(mode),
                )
            }
            Err(_) => {
                warn!(target = "reasoning", %trace_id, "pipeline timed out");
                ReasoningResult::degraded(
                    ResultKind::ToolUse,
                    Degradation {
                        kind: DegradedKind::Pipeline,
                        message: format!(
                            "tool pipeline timed out after {} ms",
                            config.pipeline_timeout.as_millis()
                        ),
                    },
                    Some(mode),
                )
            }
        }
    }

    fn convert_outcome(
        outcome: PipelineOutcome,
        trace_id: String,
        mode: ReasoningMode,
    ) -> ReasoningResult {
        let steps: Vec<ReasoningStep> = outcome
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| ReasoningStep {
                index: i as u32 + 1,
                thought: step.tool.clone(),
                action: Some(format!("{}()", step.tool)),
                observation: Some(if step.success {
                    step.output.clone().unwrap_or_default()
                } else {
                    step.error.clone().unwrap_or_else(|| "unknown error".into())
                }),
                confidence: if step.success { 0.9 } else { 0.3 },
            })
            .collect();
        let tool_calls: Vec<String> = outcome.steps.iter().map(|s| s.tool.clone()).collect();
        let confidence = if outcome.success { 0.9 } else { 0.4 };
        let content = outcome
            .final_output
            .clone()
            .unwrap_or_else(|| summarize_steps(&outcome.steps));

        ReasoningResult {
            kind: ResultKind::ToolUse,
            content,
            confidence,
            steps,
            tool_calls,
            metadata: ResultMetadata {
                mode: Some(mode),
                trace_id: Some(trace_id),
                degraded: if outcome.success {
                    None
                } else {
                    Some(Degradation {
                        kind: DegradedKind::Pipeline,
                        message: "pipeline completed with failures".into(),
                    })
                },
            },
        }
    }

    /// Drain in-flight pipeline work, then refuse new submissions.
    pub async fn shutdown(&self) {
        info!(target = "reasoning", "draining tool pipeline work");
        let _drained = self.pipeline_slots.acquire_many(self.max_pipeline_slots).await;
        self.pipeline_slots.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_words_match_whole_words_only() {
        assert!(wants_tools("please read this file"));
        assert!(wants_tools("SEARCH the docs for me"));
        assert!(!wants_tools("I am ready for the meeting"));
        assert!(!wants_tools("what a listless afternoon"));
    }

    #[test]
    fn numbered_replies_split_into_steps() {
        let content = "1. Gather the facts\n2. Weigh them\nsome elaboration\n3. Conclude";
        let steps = parse_steps(content, 10, 0.75);
        assert_eq!(steps.len(), 3);
        assert!(steps[1].thought.contains("elaboration"));
        assert_eq!(steps[2].index, 3);
    }

    #[test]
    fn unstructured_reply_is_one_step() {
        let steps = parse_steps("just an answer, no structure", 10, 0.7);
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn step_cap_folds_overflow_into_last_step() {
        let content = "1. a\n2. b\n3. c\n4. d";
        let steps = parse_steps(content, 2, 0.7);
        assert_eq!(steps.len(), 2);
        assert!(steps[1].thought.contains("4. d"));
    }

    #[test]
    fn history_trims_oldest_first() {
        let history = vec![
            ChatMessage::user("a".repeat(100)),
            ChatMessage::assistant("b".repeat(100)),
            ChatMessage::user("c".repeat(100)),
        ];
        let kept = trim_history(&history, 250);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].content.starts_with('b'));
    }
}
