//! Analogy generation methods.
//!
//! A method turns a [`Question`] into an [`Analogy`] using a model it is
//! handed at run time. Methods are registered by name in the
//! [`Registry`](crate::registry::Registry) and built from [`MethodOptions`].

mod pag;
pub mod prompt;
mod sag;

pub use pag::PagMethod;
pub use sag::SagMethod;

use crate::llm::LlmModel;
use crate::models::{Analogy, ConfigError, Metadata, Question, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;

/// A strategy for producing an analogy.
#[async_trait]
pub trait Method: Send + Sync {
    /// Registry name; also the prefix of every analogy id.
    fn name(&self) -> &str;

    /// Generate one analogy for `question` with `model`.
    async fn run(&self, question: &Question, model: &dyn LlmModel) -> Result<Analogy>;
}

/// Options accepted when building a method.
///
/// Unset templates fall back to the built-in prompts. Unrecognized keys are
/// kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_prompt_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analogy_prompt_template: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MethodOptions {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Provenance shared by every method: question labels and model identity.
fn provenance(question: &Question, model: &dyn LlmModel) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("subject".to_string(), json!(question.subject));
    metadata.insert("difficulty".to_string(), json!(question.difficulty));
    metadata.insert("model_name".to_string(), json!(model.name()));
    metadata.insert("model_id".to_string(), json!(model.model_id()));
    metadata
}

fn stamp(metadata: &mut Metadata) {
    metadata.insert(
        "generated_at".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
}
