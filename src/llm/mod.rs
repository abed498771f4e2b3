//! LLM model capability.
//!
//! A model turns a prompt into text. Backends are registered by name in the
//! [`Registry`](crate::registry::Registry) and built from a [`ModelConfig`];
//! methods and pipelines only ever see `&dyn LlmModel`.

mod chat;
mod scripted;

pub use chat::*;
pub use scripted::*;

use crate::models::{ModelConfig, ModelRole, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Identity and sampling settings shared by every backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    /// Project-local name
    pub name: String,
    /// Identifier sent to the backend
    pub model_id: String,
    pub role: ModelRole,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Backend-specific options
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            role: ModelRole::Generic,
            temperature: 0.7,
            max_tokens: None,
            extra: BTreeMap::new(),
        }
    }
}

impl From<&ModelConfig> for ModelProfile {
    fn from(config: &ModelConfig) -> Self {
        Self {
            name: config.name.clone(),
            model_id: config.model_id.clone(),
            role: config.role,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            extra: config.extra.clone(),
        }
    }
}

/// Per-call overrides for [`LlmModel::generate`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerateOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
            ..Self::default()
        }
    }
}

/// Something that can generate text from a prompt.
#[async_trait]
pub trait LlmModel: Send + Sync {
    fn profile(&self) -> &ModelProfile;

    /// Generate text for `prompt`.
    ///
    /// The result is trimmed of surrounding whitespace and is empty when the
    /// backend produced no content. Backend failures surface as
    /// [`AnalogiaError::ModelInvocation`](crate::models::AnalogiaError::ModelInvocation)
    /// and are not retried.
    async fn generate(&self, prompt: &str, overrides: &GenerateOptions) -> Result<String>;

    fn name(&self) -> &str {
        &self.profile().name
    }

    fn model_id(&self) -> &str {
        &self.profile().model_id
    }

    fn role(&self) -> ModelRole {
        self.profile().role
    }

    fn temperature(&self) -> f64 {
        self.profile().temperature
    }
}
