//! Reasoning engine: strategy dispatch, persona shaping, tool-use
//! detection, and hand-off to the external tool pipeline.
//!
//! This module provides:
//! - `ReasoningEngine` and its `reason` entry point
//! - `ReasoningConfig` / `ReasoningContext` / `ReasoningMode`
//! - `Persona` framing and the civil-tone block
//! - `ReasoningResult` and the degraded-result metadata types

mod config;
mod engine;
mod persona;
mod result;

pub use config::{ReasoningConfig, ReasoningContext, ReasoningMode};
pub use engine::ReasoningEngine;
pub use persona::{compose_system, Persona};
pub use result::{
    Degradation, DegradedKind, ReasoningResult, ReasoningStep, ResultKind, ResultMetadata,
};
