//! Records passed between datasets, methods, models and pipelines.
//!
//! Linkage between records is by string id only. Nothing here resolves
//! or enforces those references.

use crate::judge::MetricScores;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Open provenance mapping attached to generated records.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Multiple-choice question from a benchmark dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier
    pub id: String,

    /// Classification label (high-level domain or subdomain)
    pub subject: String,

    #[serde(default)]
    pub difficulty: Option<String>,

    /// Question body
    pub text: String,

    /// Answer choices; the correct one comes first and order is not shuffled
    #[serde(default)]
    pub options: Option<Vec<String>>,

    #[serde(default)]
    pub correct_answer: Option<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            difficulty: None,
            text: text.into(),
            options: None,
            correct_answer: None,
        }
    }
}

/// Generated pedagogical text for one question under one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analogy {
    /// `{method_name}_{question_id}`
    pub id: String,

    pub question_id: String,

    pub method_name: String,

    pub text: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Analogy {
    /// Build an analogy for `question`, deriving its id from the method name.
    pub fn new(
        method_name: &str,
        question: &Question,
        text: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: Self::id_for(method_name, &question.id),
            question_id: question.id.clone(),
            method_name: method_name.to_string(),
            text: text.into(),
            metadata,
        }
    }

    pub fn id_for(method_name: &str, question_id: &str) -> String {
        format!("{method_name}_{question_id}")
    }

    /// String-valued metadata entry, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Concept steps recorded by multi-stage methods; empty otherwise.
    pub fn concept_steps(&self) -> Vec<String> {
        self.metadata
            .get("concept_steps")
            .and_then(|v| v.as_array())
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A student model's answer to a question under one condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,

    pub student_model: String,

    /// Experimental condition label (e.g. "baseline", "with_pag")
    pub method_name: String,

    pub answer_text: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Answer {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Quality assessment of one analogy by one judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub analogy_id: String,

    pub judge_model: String,

    /// Always carries every quality dimension, scored or not
    pub scores: MetricScores,

    #[serde(default)]
    pub metadata: Metadata,
}

/// Role an LLM plays in the experiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// Produces analogies
    Teacher,
    /// Answers questions
    Student,
    /// Scores analogies
    Judge,
    #[default]
    Generic,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Teacher => write!(f, "teacher"),
            ModelRole::Student => write!(f, "student"),
            ModelRole::Judge => write!(f, "judge"),
            ModelRole::Generic => write!(f, "generic"),
        }
    }
}

/// Statistics for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Questions handed to the pipeline
    pub total_questions: usize,

    /// Records produced (analogies or answers)
    pub total_generated: usize,

    /// Items skipped because a model call failed
    pub total_failed: usize,

    /// Items skipped for other reasons (e.g. no analogy for the question)
    pub total_skipped: usize,

    /// Ids of the items that failed
    pub failed_ids: Vec<String>,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Records per hour
    pub throughput_per_hour: f64,
}

impl RunStats {
    pub fn new(total_questions: usize) -> Self {
        Self {
            total_questions,
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, id: impl Into<String>) {
        self.total_failed += 1;
        self.failed_ids.push(id.into());
    }

    /// Calculate derived stats.
    pub fn finalize(&mut self, runtime_secs: f64) {
        self.runtime_secs = runtime_secs;
        if runtime_secs > 0.0 {
            self.throughput_per_hour = self.total_generated as f64 / runtime_secs * 3600.0;
        }
    }
}
