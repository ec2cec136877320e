use murmur_core::llm::{ModelConfig, ProviderFamily};
use murmur_core::reasoning::{Persona, ReasoningMode};

/// High-level configuration for the assistant demo, defaults + env.
#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub models: Vec<ModelConfig>,
    pub system_prompt: String,
    pub persona: Option<Persona>,
    pub civil: bool,
    pub mode: Option<ReasoningMode>,
    pub offline_fallback: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            models: std::env::var("MURMUR_MODELS")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|spec| parse_models(&spec))
                .unwrap_or_else(default_models),
            system_prompt: std::env::var("MURMUR_SYSTEM_PROMPT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| {
                    "You are Murmur, a voice assistant. Answer in a sentence or two; \
                     your reply will be spoken aloud."
                        .to_string()
                }),
            persona: std::env::var("MURMUR_PERSONA")
                .ok()
                .and_then(|s| s.parse::<Persona>().ok()),
            civil: std::env::var("MURMUR_CIVIL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            mode: std::env::var("MURMUR_MODE").ok().and_then(|s| parse_mode(&s)),
            offline_fallback: std::env::var("MURMUR_OFFLINE_FALLBACK")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

impl AssistantConfig {
    pub fn load() -> Self {
        Self::default()
    }
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("gpt-4o-mini", ProviderFamily::OpenAi),
        ModelConfig::new("claude-haiku-3.5", ProviderFamily::Anthropic),
        ModelConfig::new("llama3.2", ProviderFamily::Ollama),
    ]
}

/// Parse "name:family,name:family" into model configs; bad entries are
/// skipped with a warning rather than aborting startup.
fn parse_models(spec: &str) -> Vec<ModelConfig> {
    let mut models = Vec::new();
    for entry in spec.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((name, family)) => match family.trim().parse::<ProviderFamily>() {
                Ok(family) => models.push(ModelConfig::new(name.trim(), family)),
                Err(e) => tracing::warn!(target = "assistant", %entry, error = %e, "skipping model entry"),
            },
            None => tracing::warn!(target = "assistant", %entry, "expected name:family"),
        }
    }
    models
}

fn parse_mode(s: &str) -> Option<ReasoningMode> {
    match s.to_ascii_lowercase().as_str() {
        "single_shot" | "single-shot" => Some(ReasoningMode::SingleShot),
        "chain_of_thought" | "cot" => Some(ReasoningMode::ChainOfThought),
        "tree_of_thought" | "tot" => Some(ReasoningMode::TreeOfThought),
        "reflexion" => Some(ReasoningMode::Reflexion),
        _ => None,
    }
}
