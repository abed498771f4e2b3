//! Progressive analogy generation.
//!
//! Two strictly sequential calls: the first extracts an ordered list of
//! conceptual prerequisite steps, the second writes a narrative analogy that
//! follows those steps. Every intermediate prompt and response is kept in
//! the analogy metadata.

use super::prompt::{
    CONCEPT_EXTRACTION_PROMPT, CONCEPT_STEPS_TEXT, PROGRESSIVE_ANALOGY_PROMPT, PromptTemplate,
    QUESTION_TEXT, number_steps, parse_numbered_list,
};
use super::{Method, MethodOptions, provenance, stamp};
use crate::llm::{GenerateOptions, LlmModel};
use crate::models::{Analogy, Question, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PagMethod {
    concept_template: PromptTemplate,
    analogy_template: PromptTemplate,
}

impl PagMethod {
    pub const NAME: &'static str = "pag";

    pub fn from_options(options: &MethodOptions) -> Result<Self> {
        let concept_template = PromptTemplate::parse(
            "concept_prompt_template",
            options
                .concept_prompt_template
                .as_deref()
                .unwrap_or(CONCEPT_EXTRACTION_PROMPT),
            &[QUESTION_TEXT],
        )?;
        let analogy_template = PromptTemplate::parse(
            "analogy_prompt_template",
            options
                .analogy_prompt_template
                .as_deref()
                .unwrap_or(PROGRESSIVE_ANALOGY_PROMPT),
            &[QUESTION_TEXT, CONCEPT_STEPS_TEXT],
        )?;

        Ok(Self {
            concept_template,
            analogy_template,
        })
    }

    pub fn build_concept_prompt(&self, question: &Question) -> String {
        self.concept_template
            .render(&[(QUESTION_TEXT, question.text.as_str())])
    }

    pub fn build_analogy_prompt(&self, question: &Question, concept_steps: &[String]) -> String {
        let steps_text = number_steps(concept_steps);
        self.analogy_template.render(&[
            (QUESTION_TEXT, question.text.as_str()),
            (CONCEPT_STEPS_TEXT, steps_text.as_str()),
        ])
    }
}

#[async_trait]
impl Method for PagMethod {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, question: &Question, model: &dyn LlmModel) -> Result<Analogy> {
        let defaults = GenerateOptions::default();

        let concept_prompt = self.build_concept_prompt(question);
        let concept_raw = model.generate(&concept_prompt, &defaults).await?;
        let concept_steps = parse_numbered_list(&concept_raw);
        debug!(
            question_id = %question.id,
            steps = concept_steps.len(),
            "Extracted concept steps"
        );

        let analogy_prompt = self.build_analogy_prompt(question, &concept_steps);
        let text = model.generate(&analogy_prompt, &defaults).await?;

        let mut metadata = provenance(question, model);
        metadata.insert("concept_prompt".to_string(), json!(concept_prompt));
        metadata.insert("concept_raw".to_string(), json!(concept_raw));
        metadata.insert("concept_steps".to_string(), json!(concept_steps));
        metadata.insert("analogy_prompt".to_string(), json!(analogy_prompt));
        stamp(&mut metadata);

        Ok(Analogy::new(Self::NAME, question, text, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptStep, ScriptedModel};

    fn question() -> Question {
        Question::new("rec7", "Chemistry", "What drives the reaction forward?")
    }

    #[tokio::test]
    async fn test_two_stage_run() {
        let method = PagMethod::from_options(&MethodOptions::default()).unwrap();
        let model = ScriptedModel::with_replies(
            "teacher_stub",
            ["1. Step one\n2. Step two", "Narrative."],
        );

        let analogy = method.run(&question(), &model).await.unwrap();

        assert_eq!(analogy.id, "pag_rec7");
        assert_eq!(analogy.text, "Narrative.");
        assert_eq!(analogy.concept_steps(), vec!["Step one", "Step two"]);
        assert_eq!(
            analogy.metadata_str("concept_raw"),
            Some("1. Step one\n2. Step two")
        );

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("What drives the reaction forward?"));
        assert!(prompts[1].contains("1. Step one\n2. Step two"));
        assert!(prompts[1].contains("What drives the reaction forward?"));
        assert_eq!(analogy.metadata_str("concept_prompt"), Some(prompts[0].as_str()));
        assert_eq!(analogy.metadata_str("analogy_prompt"), Some(prompts[1].as_str()));
        assert_eq!(analogy.metadata_str("subject"), Some("Chemistry"));
        assert_eq!(analogy.metadata.get("difficulty"), Some(&serde_json::Value::Null));
    }

    #[tokio::test]
    async fn test_unnumbered_concepts_fall_back_to_single_step() {
        let method = PagMethod::from_options(&MethodOptions::default()).unwrap();
        let model = ScriptedModel::with_replies("stub", ["Entropy rises.", "Story."]);

        let analogy = method.run(&question(), &model).await.unwrap();
        assert_eq!(analogy.concept_steps(), vec!["Entropy rises."]);
        assert!(model.prompts()[1].contains("1. Entropy rises."));
    }

    #[tokio::test]
    async fn test_template_overrides() {
        let options = MethodOptions {
            concept_prompt_template: Some("List concepts for {question_text}".to_string()),
            analogy_prompt_template: Some("Steps:\n{concept_steps_text}".to_string()),
            ..MethodOptions::default()
        };
        let method = PagMethod::from_options(&options).unwrap();
        let model = ScriptedModel::with_replies("stub", ["1) A\n2) B", "Done"]);

        method.run(&question(), &model).await.unwrap();
        assert_eq!(
            model.prompts(),
            vec![
                "List concepts for What drives the reaction forward?".to_string(),
                "Steps:\n1. A\n2. B".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_call_failure_propagates() {
        let method = PagMethod::from_options(&MethodOptions::default()).unwrap();
        let model = ScriptedModel::with_replies("stub", ["1. Only"]);
        model.push(ScriptStep::Fail("rate limited".to_string()));

        let err = method.run(&question(), &model).await.unwrap_err();
        assert!(err.is_per_item());
        assert_eq!(model.prompts().len(), 2);
    }

    #[test]
    fn test_analogy_template_rejects_foreign_placeholder() {
        let options = MethodOptions {
            analogy_prompt_template: Some("{analogy_text}".to_string()),
            ..MethodOptions::default()
        };
        assert!(PagMethod::from_options(&options).is_err());
    }
}
