//! CSV persistence for analogies and student answers.
//!
//! One row per record, with the provenance fields needed downstream
//! flattened into columns. Concept steps are joined with `" || "`.

use crate::models::{AnalogiaError, Analogy, Answer, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Separator used for multi-valued columns.
pub const STEP_SEPARATOR: &str = " || ";

/// Flat row for one analogy.
///
/// Only `question_id` and `analogy_text` are required when reading; files
/// written by single-stage runs carry no `concept_steps` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogyRecord {
    #[serde(default)]
    pub analogy_id: String,
    pub question_id: String,
    #[serde(default)]
    pub method_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub concept_steps: String,
    pub analogy_text: String,
}

impl AnalogyRecord {
    /// Concept steps split back out of the joined column.
    pub fn steps(&self) -> Vec<String> {
        if self.concept_steps.is_empty() {
            return Vec::new();
        }
        self.concept_steps
            .split(STEP_SEPARATOR)
            .map(str::to_string)
            .collect()
    }
}

impl From<&Analogy> for AnalogyRecord {
    fn from(analogy: &Analogy) -> Self {
        let field = |key: &str| analogy.metadata_str(key).unwrap_or_default().to_string();
        Self {
            analogy_id: analogy.id.clone(),
            question_id: analogy.question_id.clone(),
            method_name: analogy.method_name.clone(),
            subject: field("subject"),
            difficulty: field("difficulty"),
            model_name: field("model_name"),
            model_id: field("model_id"),
            concept_steps: analogy.concept_steps().join(STEP_SEPARATOR),
            analogy_text: analogy.text.clone(),
        }
    }
}

/// Flat row for one student answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub student_model: String,
    pub condition: String,
    pub subject: String,
    pub difficulty: String,
    pub model_id: String,
    pub answer_text: String,
}

impl From<&Answer> for AnswerRecord {
    fn from(answer: &Answer) -> Self {
        let field = |key: &str| answer.metadata_str(key).unwrap_or_default().to_string();
        Self {
            question_id: answer.question_id.clone(),
            student_model: answer.student_model.clone(),
            condition: answer.method_name.clone(),
            subject: field("subject"),
            difficulty: field("difficulty"),
            model_id: field("model_id"),
            answer_text: answer.answer_text.clone(),
        }
    }
}

fn write_rows<W, T, I>(sink: W, rows: I, what: &str) -> Result<()>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_writer(sink);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AnalogiaError::csv(format!("writing {what} row"), e))?;
    }
    writer
        .flush()
        .map_err(|e| AnalogiaError::io(format!("flushing {what} CSV"), e))
}

fn read_rows<R, T>(source: R, what: &str) -> Result<Vec<T>>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::Reader::from_reader(source);
    reader
        .deserialize()
        .map(|row| row.map_err(|e| AnalogiaError::csv(format!("reading {what} row"), e)))
        .collect()
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AnalogiaError::io("creating output directory", e))?;
    }
    File::create(path).map_err(|e| AnalogiaError::io("creating output file", e))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| AnalogiaError::io(format!("opening {}", path.display()), e))
}

// ═══════════════════════════════════════════════════════════════════════════
// ANALOGIES
// ═══════════════════════════════════════════════════════════════════════════

pub fn write_analogies<W: Write>(sink: W, analogies: &[Analogy]) -> Result<()> {
    write_rows(sink, analogies.iter().map(AnalogyRecord::from), "analogy")
}

pub fn read_analogies<R: Read>(source: R) -> Result<Vec<AnalogyRecord>> {
    read_rows(source, "analogy")
}

/// Write analogies to `path`, creating parent directories.
pub fn save_analogies(path: &Path, analogies: &[Analogy]) -> Result<()> {
    write_analogies(create(path)?, analogies)?;
    info!(path = %path.display(), count = analogies.len(), "Saved analogies");
    Ok(())
}

pub fn load_analogies(path: &Path) -> Result<Vec<AnalogyRecord>> {
    read_analogies(open(path)?)
}

/// Map question id to analogy text from an analogies CSV.
///
/// When a question appears more than once the last row wins.
pub fn load_analogy_texts(path: &Path) -> Result<HashMap<String, String>> {
    let texts: HashMap<_, _> = load_analogies(path)?
        .into_iter()
        .map(|record| (record.question_id, record.analogy_text))
        .collect();
    info!(path = %path.display(), count = texts.len(), "Loaded analogies");
    Ok(texts)
}

// ═══════════════════════════════════════════════════════════════════════════
// ANSWERS
// ═══════════════════════════════════════════════════════════════════════════

pub fn write_answers<W: Write>(sink: W, answers: &[Answer]) -> Result<()> {
    write_rows(sink, answers.iter().map(AnswerRecord::from), "answer")
}

pub fn read_answers<R: Read>(source: R) -> Result<Vec<AnswerRecord>> {
    read_rows(source, "answer")
}

pub fn save_answers(path: &Path, answers: &[Answer]) -> Result<()> {
    write_answers(create(path)?, answers)?;
    info!(path = %path.display(), count = answers.len(), "Saved answers");
    Ok(())
}

pub fn load_answers(path: &Path) -> Result<Vec<AnswerRecord>> {
    read_answers(open(path)?)
}
