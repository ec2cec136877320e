// Murmur Core Library
// Model routing and reasoning runtime for the Murmur voice assistant

pub mod llm;
pub mod pipeline;
pub mod reasoning;
pub mod router;

// Export core types
pub use llm::{ChatMessage, LlmError, LlmResponse, ModelConfig, ProviderFamily, Role};
pub use pipeline::{PipelineOutcome, PipelineStep, PipelineSubmission, ToolPipeline};
pub use reasoning::{
    ReasoningConfig, ReasoningContext, ReasoningEngine, ReasoningMode, ReasoningResult,
};
pub use router::{ModelRouter, RouteOptions, RouterConfig};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("No models configured")]
    NoModelsConfigured,

    #[error("No models available: {0}")]
    NoAvailableModels(String),

    #[error("All models failed, last error: {0}")]
    AllModelsFailed(#[source] llm::LlmError),

    #[error("Router error: {0}")]
    RouterError(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MurmurError>;
