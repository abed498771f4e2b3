//! Analogy generation pipeline.
//!
//! Questions → Method (+ teacher model) → Analogies → CSV

use super::{preview, progress_bar};
use crate::llm::LlmModel;
use crate::methods::Method;
use crate::models::{Analogy, Question, Result, RunStats};
use crate::records;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs one method with one teacher model over a question set.
pub struct AnalogyPipeline {
    method: Arc<dyn Method>,
    model: Arc<dyn LlmModel>,
    show_progress: bool,
}

impl AnalogyPipeline {
    pub fn new(method: Arc<dyn Method>, model: Arc<dyn LlmModel>) -> Self {
        Self {
            method,
            model,
            show_progress: true,
        }
    }

    /// Toggle the terminal progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Generate an analogy for every question.
    ///
    /// Questions whose model call fails are skipped and listed in the stats.
    pub async fn run(&self, questions: &[Question]) -> Result<(Vec<Analogy>, RunStats)> {
        let start = Instant::now();
        let mut stats = RunStats::new(questions.len());
        let mut analogies = Vec::with_capacity(questions.len());

        info!(
            method = %self.method.name(),
            model = %self.model.name(),
            model_id = %self.model.model_id(),
            total_questions = questions.len(),
            "Starting analogy pipeline"
        );

        let pb = progress_bar(questions.len(), self.show_progress);

        for question in questions {
            match self.method.run(question, self.model.as_ref()).await {
                Ok(analogy) => {
                    debug!(
                        question_id = %question.id,
                        preview = %preview(&analogy.text, 120),
                        "Generated analogy"
                    );
                    analogies.push(analogy);
                    stats.total_generated += 1;
                }
                Err(e) if e.is_per_item() => {
                    warn!(question_id = %question.id, error = %e, "Skipping question");
                    stats.record_failure(&question.id);
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }

            pb.inc(1);
            pb.set_message(format!(
                "ok: {}, failed: {}",
                stats.total_generated, stats.total_failed
            ));
        }

        pb.finish_with_message(format!(
            "Done! {} generated, {} failed",
            stats.total_generated, stats.total_failed
        ));

        stats.finalize(start.elapsed().as_secs_f64());

        info!(
            generated = stats.total_generated,
            failed = stats.total_failed,
            throughput = format!("{:.0}/hr", stats.throughput_per_hour),
            "Analogy pipeline complete"
        );

        Ok((analogies, stats))
    }

    /// Run and write the analogies CSV to `output_path`.
    pub async fn run_to_csv(&self, questions: &[Question], output_path: &Path) -> Result<RunStats> {
        let (analogies, stats) = self.run(questions).await?;
        records::save_analogies(output_path, &analogies)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptStep, ScriptedModel};
    use crate::methods::{MethodOptions, PagMethod, SagMethod};
    use tempfile::TempDir;

    fn questions() -> Vec<Question> {
        vec![
            Question::new("q1", "Physics", "Why does ice float?"),
            Question::new("q2", "Physics", "Why is the sky blue?"),
            Question::new("q3", "Biology", "Why do cells divide?"),
        ]
    }

    #[tokio::test]
    async fn test_failed_questions_are_skipped() {
        let model = Arc::new(ScriptedModel::with_replies("teacher", ["first"]));
        model.push(ScriptStep::Fail("quota exceeded".to_string()));
        model.push(ScriptStep::Reply("third".to_string()));

        let method = Arc::new(SagMethod::from_options(&MethodOptions::default()).unwrap());
        let pipeline = AnalogyPipeline::new(method, model.clone()).with_progress(false);

        let (analogies, stats) = pipeline.run(&questions()).await.unwrap();

        let ids: Vec<_> = analogies.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["sag_q1", "sag_q3"]);
        assert_eq!(stats.total_questions, 3);
        assert_eq!(stats.total_generated, 2);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.failed_ids, vec!["q2"]);
        assert_eq!(model.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_run_to_csv_writes_rows() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out").join("pag.csv");

        let model = Arc::new(ScriptedModel::with_replies(
            "teacher",
            ["1. A\n2. B", "Story one.", "1. C", "Story two."],
        ));
        let method = Arc::new(PagMethod::from_options(&MethodOptions::default()).unwrap());
        let pipeline = AnalogyPipeline::new(method, model).with_progress(false);

        let stats = pipeline
            .run_to_csv(&questions()[..2], &output)
            .await
            .unwrap();
        assert_eq!(stats.total_generated, 2);

        let rows = records::load_analogies(&output).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].concept_steps, "A || B");
        assert_eq!(rows[1].analogy_text, "Story two.");
        assert_eq!(rows[1].model_name, "teacher");
    }
}
