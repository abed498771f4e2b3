//! Student answering pipeline.
//!
//! Each question is answered once per condition. Under a with-analogy
//! condition the student sees the analogy stored for that question; a
//! question without one is skipped for that condition.

use super::progress_bar;
use crate::llm::{GenerateOptions, LlmModel};
use crate::methods::prompt::{ANALOGY_TEXT, PromptTemplate, QUESTION_TEXT};
use crate::models::{Answer, ConditionConfig, ConditionKind, Metadata, Question, Result, RunStats};
use crate::records;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const BASELINE_PROMPT: &str = "You are a careful, step-by-step reasoner.

Answer the following multiple-choice question.
Explain your reasoning briefly, then clearly state your final answer choice.

QUESTION:
{question_text}

If you are unsure, choose the most plausible answer based on the reasoning.
";

pub const WITH_ANALOGY_PROMPT: &str = "You are a careful, step-by-step reasoner.

You are given:
- A QUESTION
- An ANALOGY that was written to help understand the underlying concepts of the question.

First, read and internalize the ANALOGY.
Then reason step by step and answer the QUESTION.
Do NOT simply copy phrases from the analogy; use it to build your intuition.

ANALOGY:
{analogy_text}

QUESTION:
{question_text}

Explain your reasoning briefly, then clearly state your final answer choice.
";

/// A condition with its analogies resolved.
struct PreparedCondition<'a> {
    config: &'a ConditionConfig,
    analogies: Option<HashMap<String, String>>,
}

/// Asks a student model every question under every condition.
pub struct StudentPipeline {
    model: Arc<dyn LlmModel>,
    baseline: PromptTemplate,
    with_analogy: PromptTemplate,
    show_progress: bool,
}

impl StudentPipeline {
    pub fn new(model: Arc<dyn LlmModel>) -> Result<Self> {
        Ok(Self {
            model,
            baseline: PromptTemplate::parse("baseline", BASELINE_PROMPT, &[QUESTION_TEXT])?,
            with_analogy: PromptTemplate::parse(
                "with_analogy",
                WITH_ANALOGY_PROMPT,
                &[QUESTION_TEXT, ANALOGY_TEXT],
            )?,
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Student prompt for `question`, with or without an analogy.
    pub fn build_prompt(&self, question: &Question, analogy: Option<&str>) -> String {
        match analogy {
            None => self
                .baseline
                .render(&[(QUESTION_TEXT, question.text.as_str())]),
            Some(analogy) => self.with_analogy.render(&[
                (QUESTION_TEXT, question.text.as_str()),
                (ANALOGY_TEXT, analogy),
            ]),
        }
    }

    /// Answer every question under every condition.
    ///
    /// `total_generated` counts answers; `total_skipped` counts
    /// question/condition pairs with no analogy available.
    pub async fn run(
        &self,
        questions: &[Question],
        conditions: &[ConditionConfig],
    ) -> Result<(Vec<Answer>, RunStats)> {
        let start = Instant::now();
        let mut stats = RunStats::new(questions.len());
        let mut answers = Vec::new();

        let prepared = conditions
            .iter()
            .map(prepare)
            .collect::<Result<Vec<_>>>()?;

        info!(
            student = %self.model.name(),
            model_id = %self.model.model_id(),
            total_questions = questions.len(),
            conditions = conditions.len(),
            "Starting student pipeline"
        );

        let pb = progress_bar(questions.len() * conditions.len(), self.show_progress);
        let options = GenerateOptions::with_temperature(self.model.temperature());

        for question in questions {
            for condition in &prepared {
                pb.inc(1);
                let name = &condition.config.name;

                let analogy = match &condition.analogies {
                    None => None,
                    Some(map) => match map.get(&question.id) {
                        Some(text) => Some(text.as_str()),
                        None => {
                            info!(condition = %name, question_id = %question.id, "No analogy found, skipping");
                            stats.total_skipped += 1;
                            continue;
                        }
                    },
                };

                let prompt = self.build_prompt(question, analogy);
                let answer_text = match self.model.generate(&prompt, &options).await {
                    Ok(text) => text,
                    Err(e) if e.is_per_item() => {
                        warn!(condition = %name, question_id = %question.id, error = %e, "Student call failed");
                        stats.record_failure(format!("{}:{}", name, question.id));
                        continue;
                    }
                    Err(e) => {
                        pb.abandon();
                        return Err(e);
                    }
                };

                answers.push(self.answer(question, condition.config, answer_text));
                stats.total_generated += 1;
            }
        }

        pb.finish_with_message(format!("Done! {} answers", answers.len()));
        stats.finalize(start.elapsed().as_secs_f64());

        info!(
            answers = stats.total_generated,
            skipped = stats.total_skipped,
            failed = stats.total_failed,
            "Student pipeline complete"
        );

        Ok((answers, stats))
    }

    /// Run and write the answers CSV to `output_path`.
    pub async fn run_to_csv(
        &self,
        questions: &[Question],
        conditions: &[ConditionConfig],
        output_path: &Path,
    ) -> Result<RunStats> {
        let (answers, stats) = self.run(questions, conditions).await?;
        records::save_answers(output_path, &answers)?;
        Ok(stats)
    }

    fn answer(&self, question: &Question, condition: &ConditionConfig, answer_text: String) -> Answer {
        let mut metadata = Metadata::new();
        metadata.insert("subject".to_string(), json!(question.subject));
        metadata.insert("difficulty".to_string(), json!(question.difficulty));
        metadata.insert("model_id".to_string(), json!(self.model.model_id()));
        metadata.insert("condition_type".to_string(), json!(condition.kind.label()));
        metadata.insert("used_analogy".to_string(), json!(condition.kind.uses_analogy()));

        Answer {
            question_id: question.id.clone(),
            student_model: self.model.name().to_string(),
            method_name: condition.name.clone(),
            answer_text,
            metadata,
        }
    }
}

/// Load the analogies a condition needs.
///
/// A missing analogies file is not fatal; every question under that
/// condition is then skipped.
fn prepare(config: &ConditionConfig) -> Result<PreparedCondition<'_>> {
    let analogies = match &config.kind {
        ConditionKind::Baseline => None,
        ConditionKind::WithAnalogyCsv { analogy_csv } => {
            if analogy_csv.exists() {
                Some(records::load_analogy_texts(analogy_csv)?)
            } else {
                warn!(
                    condition = %config.name,
                    path = %analogy_csv.display(),
                    "Analogies file not found"
                );
                Some(HashMap::new())
            }
        }
    };
    Ok(PreparedCondition { config, analogies })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptStep, ScriptedModel};
    use crate::models::Analogy;
    use tempfile::TempDir;

    fn questions() -> Vec<Question> {
        vec![
            Question::new("q1", "Physics", "Why does ice float?"),
            Question::new("q2", "Physics", "Why is the sky blue?"),
        ]
    }

    fn conditions(analogy_csv: &Path) -> Vec<ConditionConfig> {
        vec![
            ConditionConfig {
                name: "baseline".to_string(),
                kind: ConditionKind::Baseline,
            },
            ConditionConfig {
                name: "with_pag".to_string(),
                kind: ConditionKind::WithAnalogyCsv {
                    analogy_csv: analogy_csv.to_path_buf(),
                },
            },
        ]
    }

    fn write_analogy_for_q1(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("pag.csv");
        let analogy = Analogy::new(
            "pag",
            &questions()[0],
            "Ice is like a crowd spreading out.",
            Metadata::new(),
        );
        records::save_analogies(&path, &[analogy]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_conditions_and_missing_analogies() {
        let dir = TempDir::new().unwrap();
        let csv = write_analogy_for_q1(&dir);

        let model = Arc::new(ScriptedModel::echo("student", "Answer: A"));
        let pipeline = StudentPipeline::new(model.clone())
            .unwrap()
            .with_progress(false);

        let (answers, stats) = pipeline.run(&questions(), &conditions(&csv)).await.unwrap();

        let pairs: Vec<_> = answers
            .iter()
            .map(|a| (a.question_id.as_str(), a.method_name.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("q1", "baseline"), ("q1", "with_pag"), ("q2", "baseline")]
        );
        assert_eq!(stats.total_generated, 3);
        assert_eq!(stats.total_skipped, 1);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(!prompts[0].contains("ANALOGY:\n"));
        assert!(prompts[1].contains("ANALOGY:\nIce is like a crowd spreading out."));

        let with_pag = &answers[1];
        assert_eq!(with_pag.metadata_str("condition_type"), Some("with_analogy_csv"));
        assert_eq!(with_pag.metadata.get("used_analogy"), Some(&json!(true)));
        assert_eq!(with_pag.student_model, "student");
    }

    #[tokio::test]
    async fn test_student_failures_are_skipped() {
        let model = Arc::new(ScriptedModel::with_replies("student", ["A"]));
        model.push(ScriptStep::Fail("timeout".to_string()));

        let pipeline = StudentPipeline::new(model).unwrap().with_progress(false);
        let baseline = vec![ConditionConfig {
            name: "baseline".to_string(),
            kind: ConditionKind::Baseline,
        }];

        let (answers, stats) = pipeline.run(&questions(), &baseline).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(stats.failed_ids, vec!["baseline:q2"]);
    }

    #[tokio::test]
    async fn test_single_stage_csv_without_steps_column() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("sag.csv");
        std::fs::write(
            &csv,
            "analogy_id,question_id,method_name,subject,difficulty,model_name,model_id,analogy_text\n\
             sag_q2,q2,sag,Physics,,teacher,gpt-4.1-mini,Sunlight is a crowd of runners.\n",
        )
        .unwrap();

        let model = Arc::new(ScriptedModel::echo("student", "C"));
        let pipeline = StudentPipeline::new(model.clone())
            .unwrap()
            .with_progress(false);
        let with_sag = vec![ConditionConfig {
            name: "with_sag".to_string(),
            kind: ConditionKind::WithAnalogyCsv { analogy_csv: csv },
        }];

        let (answers, stats) = pipeline.run(&questions(), &with_sag).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_id, "q2");
        assert_eq!(stats.total_skipped, 1);
        assert!(model.prompts()[0].contains("ANALOGY:\nSunlight is a crowd of runners."));
    }

    #[tokio::test]
    async fn test_missing_analogy_file_skips_condition() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::echo("student", "B"));
        let pipeline = StudentPipeline::new(model).unwrap().with_progress(false);

        let output = dir.path().join("answers.csv");
        let stats = pipeline
            .run_to_csv(&questions(), &conditions(&dir.path().join("none.csv")), &output)
            .await
            .unwrap();

        assert_eq!(stats.total_generated, 2);
        assert_eq!(stats.total_skipped, 2);
        let rows = records::load_answers(&output).unwrap();
        assert!(rows.iter().all(|r| r.condition == "baseline"));
    }
}
