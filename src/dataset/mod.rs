//! Question sources.

mod gpqa;

pub use gpqa::GpqaAdapter;

use crate::models::{AnalogiaError, DatasetConfig, Question, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Load questions from a JSONL file, one question object per line.
pub fn load_questions_jsonl(path: &Path) -> Result<Vec<Question>> {
    let file = File::open(path).map_err(|e| AnalogiaError::io("opening questions file", e))?;
    let reader = BufReader::new(file);
    let mut questions = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AnalogiaError::io("reading questions file", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let question: Question = serde_json::from_str(&line)
            .map_err(|e| AnalogiaError::Parse(format!("Line {}: {}", line_num + 1, e)))?;
        questions.push(question);
    }

    info!(count = questions.len(), "Loaded questions");
    Ok(questions)
}

/// Load the questions described by `config`.
///
/// `.jsonl` files are read as serialized questions; anything else is treated
/// as a processed GPQA CSV with the configured filters. `limit` is applied
/// last.
pub fn load_questions(config: &DatasetConfig) -> Result<Vec<Question>> {
    let is_jsonl = config
        .path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));

    let mut questions = if is_jsonl {
        load_questions_jsonl(&config.path)?
    } else {
        GpqaAdapter::from_config(config).load()?
    };

    if let Some(limit) = config.limit {
        questions.truncate(limit);
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_jsonl_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.jsonl");
        std::fs::write(
            &path,
            r#"{"id": "q1", "subject": "Physics", "text": "Why?"}

{"id": "q2", "subject": "Biology", "text": "How?", "difficulty": "easy", "options": ["a", "b"]}
"#,
        )
        .unwrap();

        let questions = load_questions_jsonl(&path).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].difficulty, None);
        assert_eq!(questions[1].options, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_load_jsonl_reports_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.jsonl");
        std::fs::write(&path, "{\"id\": \"q1\", \"subject\": \"P\", \"text\": \"t\"}\nnot json\n")
            .unwrap();

        let err = load_questions_jsonl(&path).unwrap_err();
        assert!(err.to_string().contains("Line 2"), "{err}");
    }

    #[test]
    fn test_load_questions_dispatch_and_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gpqa_main.csv");
        std::fs::write(
            &path,
            "question_uid,question,correct_answer,high_level_domain\n\
             a,Q1,A1,Physics\n\
             b,Q2,A2,Physics\n\
             c,Q3,A3,Chemistry\n",
        )
        .unwrap();

        let mut config = DatasetConfig::new(&path);
        config.subject_filter = Some("Physics".to_string());
        config.limit = Some(1);

        let questions = load_questions(&config).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "a");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let config = DatasetConfig::new(dir.path().join("missing.csv"));
        assert!(matches!(
            load_questions(&config).unwrap_err(),
            AnalogiaError::Io { .. }
        ));
    }
}
