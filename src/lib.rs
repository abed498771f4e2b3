//! analogia - LLM analogy generation experiments.
//!
//! ## Architecture
//!
//! Methods and model backends are pluggable and looked up by name in a
//! [`Registry`]:
//! - **Methods** turn a question into an analogy: `sag` (single prompt) and
//!   `pag` (concept extraction followed by a progressive narrative)
//! - **Models** turn a prompt into text: `openai_chat` for any
//!   OpenAI-compatible endpoint, `scripted` for offline runs
//!
//! ## Pipelines
//!
//! - **Analogy pipeline**: Questions → Method + teacher model → Analogies CSV
//! - **Student pipeline**: Questions × Conditions → student model → Answers CSV
//!
//! Judging currently produces the fixed score shape only; see [`judge`].

pub mod client;
pub mod dataset;
pub mod judge;
pub mod llm;
pub mod methods;
pub mod models;
pub mod pipeline;
pub mod records;
pub mod registry;

// Re-exports for convenience
pub use llm::{ChatModel, GenerateOptions, LlmModel, ModelProfile, ScriptedModel};
pub use methods::{Method, MethodOptions, PagMethod, SagMethod};
pub use models::{
    AnalogiaError, Analogy, Answer, AppConfig, ConfigError, DeploymentConfig, ExperimentConfig,
    Judgment, ModelConfig, Question, Result, RunStats,
};
pub use pipeline::{AnalogyPipeline, StudentPipeline};
pub use registry::{Registry, RegistryKind};
