//! Single-stage analogy generation.

use super::prompt::{PromptTemplate, QUESTION_TEXT, SAG_DEFAULT_PROMPT};
use super::{Method, MethodOptions, provenance, stamp};
use crate::llm::{GenerateOptions, LlmModel};
use crate::models::{Analogy, Question, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// One prompt, one call; the model's reply is the analogy.
#[derive(Debug, Clone)]
pub struct SagMethod {
    template: PromptTemplate,
}

impl SagMethod {
    pub const NAME: &'static str = "sag";

    pub fn from_options(options: &MethodOptions) -> Result<Self> {
        let source = options
            .prompt_template
            .as_deref()
            .unwrap_or(SAG_DEFAULT_PROMPT);
        let template = PromptTemplate::parse("prompt_template", source, &[QUESTION_TEXT])?;
        Ok(Self { template })
    }

    pub fn build_prompt(&self, question: &Question) -> String {
        self.template.render(&[(QUESTION_TEXT, question.text.as_str())])
    }
}

#[async_trait]
impl Method for SagMethod {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, question: &Question, model: &dyn LlmModel) -> Result<Analogy> {
        let prompt = self.build_prompt(question);
        debug!(question_id = %question.id, model = %model.name(), "SAG generate");

        let text = model.generate(&prompt, &GenerateOptions::default()).await?;

        let mut metadata = provenance(question, model);
        metadata.insert("prompt".to_string(), json!(prompt));
        stamp(&mut metadata);

        Ok(Analogy::new(Self::NAME, question, text, metadata))
    }
}
