//! Offline backend replaying canned responses.
//!
//! Used for dry runs of the pipelines and for tests. Each `generate` call
//! consumes the next scripted step; once the script is exhausted the
//! fallback reply is used if one is configured.

use crate::llm::{GenerateOptions, LlmModel, ModelProfile};
use crate::models::{AnalogiaError, BackendError, ConfigError, ModelConfig, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One scripted outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Reply(String),
    Fail(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    prompts: Vec<String>,
}

/// Model that answers from a fixed script and records every prompt it sees.
#[derive(Debug)]
pub struct ScriptedModel {
    profile: ModelProfile,
    fallback: Option<String>,
    state: Mutex<ScriptState>,
}

impl ScriptedModel {
    pub const BACKEND: &'static str = "scripted";

    pub fn new(profile: ModelProfile) -> Self {
        Self {
            profile,
            fallback: None,
            state: Mutex::new(ScriptState::default()),
        }
    }

    /// Model that returns `reply` for every prompt.
    pub fn echo(name: &str, reply: impl Into<String>) -> Self {
        Self::new(ModelProfile::new(name, name)).with_fallback(reply)
    }

    /// Model that returns `replies` in order, then fails.
    pub fn with_replies<I, S>(name: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new(ModelProfile::new(name, name));
        for reply in replies {
            model.push(ScriptStep::Reply(reply.into()));
        }
        model
    }

    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    pub fn push(&self, step: ScriptStep) {
        self.state().steps.push_back(step);
    }

    /// Build from a model config.
    ///
    /// Reads `responses` (array of strings, replayed in order) and `reply`
    /// (fallback string) from the backend extras. At least one is required.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let responses = match config.extra.get("responses") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ConfigError::InvalidValue {
                            field: "responses".to_string(),
                            reason: format!("expected strings, found {item}"),
                        }
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "responses".to_string(),
                    reason: format!("expected an array, found {other}"),
                }
                .into());
            }
        };

        let fallback = config
            .extra
            .get("reply")
            .and_then(Value::as_str)
            .map(str::to_string);

        if responses.is_empty() && fallback.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "responses".to_string(),
                reason: format!(
                    "scripted model '{}' needs `responses` or `reply`",
                    config.name
                ),
            }
            .into());
        }

        let mut model = Self::new(ModelProfile::from(config));
        model.fallback = fallback;
        for reply in responses {
            model.push(ScriptStep::Reply(reply));
        }
        Ok(model)
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmModel for ScriptedModel {
    fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    async fn generate(&self, prompt: &str, _overrides: &GenerateOptions) -> Result<String> {
        let step = {
            let mut state = self.state();
            state.prompts.push(prompt.to_string());
            state.steps.pop_front()
        };

        let reply = match (step, &self.fallback) {
            (Some(ScriptStep::Reply(text)), _) => text,
            (Some(ScriptStep::Fail(reason)), _) => {
                return Err(AnalogiaError::invocation(
                    &self.profile.name,
                    BackendError::Scripted(reason),
                ));
            }
            (None, Some(fallback)) => fallback.clone(),
            (None, None) => {
                return Err(AnalogiaError::invocation(
                    &self.profile.name,
                    BackendError::Scripted("script exhausted".to_string()),
                ));
            }
        };

        Ok(reply.trim().to_string())
    }
}
