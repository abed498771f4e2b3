//! GPQA question adapter.
//!
//! Reads the processed GPQA CSV, one question per row:
//!
//! | column              | use                                   |
//! |---------------------|---------------------------------------|
//! | `question_uid`      | question id (`gpqa_{n}` if absent)    |
//! | `question`          | question text                         |
//! | `correct_answer`    | first option and the correct answer   |
//! | `incorrect1..3`     | remaining options, blanks skipped     |
//! | `high_level_domain` | subject in `high_level` mode          |
//! | `subdomain`         | subject in `subdomain` mode           |
//! | `difficulty`        | optional difficulty label             |

use crate::models::{AnalogiaError, ConfigError, DatasetConfig, Question, Result, SubjectMode};
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};

const INCORRECT_COLUMNS: [&str; 3] = ["incorrect1", "incorrect2", "incorrect3"];

/// Maps processed GPQA rows to [`Question`]s.
#[derive(Debug, Clone)]
pub struct GpqaAdapter {
    path: PathBuf,
    subject_filter: Option<String>,
    subject_mode: SubjectMode,
    difficulty_filter: Option<Vec<String>>,
}

/// Column positions resolved from the header row.
struct Columns {
    headers: StringRecord,
}

impl Columns {
    fn index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn get<'r>(&self, row: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.index(name).and_then(|i| row.get(i))
    }
}

impl GpqaAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            subject_filter: None,
            subject_mode: SubjectMode::default(),
            difficulty_filter: None,
        }
    }

    pub fn from_config(config: &DatasetConfig) -> Self {
        Self {
            path: config.path.clone(),
            subject_filter: config.subject_filter.clone(),
            subject_mode: config.subject_mode,
            difficulty_filter: config.difficulty_filter.clone(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>, mode: SubjectMode) -> Self {
        self.subject_filter = Some(subject.into());
        self.subject_mode = mode;
        self
    }

    pub fn with_difficulties(mut self, difficulties: Vec<String>) -> Self {
        self.difficulty_filter = Some(difficulties);
        self
    }

    /// Load and filter every question in the file.
    pub fn load(&self) -> Result<Vec<Question>> {
        let file = File::open(&self.path).map_err(|e| AnalogiaError::io("opening GPQA CSV", e))?;
        let questions = self.read(file)?;

        info!(
            path = %self.path.display(),
            count = questions.len(),
            subject = ?self.subject_filter,
            "Loaded GPQA questions"
        );
        Ok(questions)
    }

    /// Read questions from any CSV source.
    pub fn read<R: Read>(&self, source: R) -> Result<Vec<Question>> {
        let mut reader = csv::Reader::from_reader(source);
        let columns = Columns {
            headers: reader
                .headers()
                .map_err(|e| AnalogiaError::csv("reading GPQA header", e))?
                .clone(),
        };

        let subject_column = self.subject_mode.column();
        if self.subject_filter.is_some() && columns.index(subject_column).is_none() {
            return Err(ConfigError::MissingColumn {
                path: self.path.clone(),
                column: subject_column.to_string(),
            }
            .into());
        }

        let mut questions = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| AnalogiaError::csv("reading GPQA row", e))?;
            let subject = columns.get(&row, subject_column).unwrap_or("unknown");

            if self.subject_filter.as_deref().is_some_and(|f| f != subject) {
                continue;
            }

            let difficulty = columns
                .get(&row, "difficulty")
                .filter(|d| !d.trim().is_empty())
                .map(str::to_string);

            if let (Some(allowed), Some(_)) = (&self.difficulty_filter, columns.index("difficulty")) {
                let keep = difficulty
                    .as_ref()
                    .is_some_and(|d| allowed.iter().any(|a| a == d));
                if !keep {
                    continue;
                }
            }

            // Fallback ids number the rows that survive filtering.
            let index = questions.len();
            questions.push(self.to_question(&columns, &row, index, subject, difficulty));
        }

        debug!(count = questions.len(), "Parsed GPQA rows");
        Ok(questions)
    }

    fn to_question(
        &self,
        columns: &Columns,
        row: &StringRecord,
        index: usize,
        subject: &str,
        difficulty: Option<String>,
    ) -> Question {
        let id = columns
            .get(row, "question_uid")
            .map(str::to_string)
            .unwrap_or_else(|| format!("gpqa_{index}"));

        let correct_answer = columns.get(row, "correct_answer").map(str::to_string);

        let mut options: Vec<String> = correct_answer.iter().cloned().collect();
        options.extend(
            INCORRECT_COLUMNS
                .iter()
                .filter_map(|col| columns.get(row, col))
                .filter(|option| !option.trim().is_empty())
                .map(str::to_string),
        );

        Question {
            id,
            subject: subject.to_string(),
            difficulty,
            text: columns.get(row, "question").unwrap_or_default().to_string(),
            options: (!options.is_empty()).then_some(options),
            correct_answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
question_uid,question,correct_answer,incorrect1,incorrect2,incorrect3,high_level_domain,subdomain,difficulty
rec1,What is spin?,Angular momentum,Charge,,Mass,Physics,Quantum Mechanics,Hard graduate level
rec2,Why do acids donate protons?,Stability of the conjugate base,Color,Smell,Taste,Chemistry,Organic Chemistry,
rec3,What carries genes?,DNA,Lipids,Sugars,Salts,Biology,Genetics,Easy undergraduate level
";

    #[test]
    fn test_rows_become_questions() {
        let questions = GpqaAdapter::new("gpqa.csv").read(CSV.as_bytes()).unwrap();
        assert_eq!(questions.len(), 3);

        let first = &questions[0];
        assert_eq!(first.id, "rec1");
        assert_eq!(first.subject, "Physics");
        assert_eq!(first.text, "What is spin?");
        assert_eq!(first.correct_answer.as_deref(), Some("Angular momentum"));
        assert_eq!(
            first.options.as_deref(),
            Some(&["Angular momentum".to_string(), "Charge".to_string(), "Mass".to_string()][..])
        );
        assert_eq!(first.difficulty.as_deref(), Some("Hard graduate level"));
        assert_eq!(questions[1].difficulty, None);
    }

    #[test]
    fn test_subject_filter_by_mode() {
        let physics = GpqaAdapter::new("gpqa.csv")
            .with_subject("Physics", SubjectMode::HighLevel)
            .read(CSV.as_bytes())
            .unwrap();
        assert_eq!(physics.len(), 1);
        assert_eq!(physics[0].id, "rec1");

        let genetics = GpqaAdapter::new("gpqa.csv")
            .with_subject("Genetics", SubjectMode::Subdomain)
            .read(CSV.as_bytes())
            .unwrap();
        assert_eq!(genetics.len(), 1);
        assert_eq!(genetics[0].subject, "Genetics");
    }

    #[test]
    fn test_difficulty_filter() {
        let easy = GpqaAdapter::new("gpqa.csv")
            .with_difficulties(vec!["Easy undergraduate level".to_string()])
            .read(CSV.as_bytes())
            .unwrap();
        assert_eq!(easy.len(), 1);
        assert_eq!(easy[0].id, "rec3");
    }

    #[test]
    fn test_missing_uid_and_filter_column() {
        let csv = "question,correct_answer,high_level_domain\nQ?,A,Physics\nR?,B,Biology\n";

        let questions = GpqaAdapter::new("raw.csv").read(csv.as_bytes()).unwrap();
        assert_eq!(questions[0].id, "gpqa_0");
        assert_eq!(questions[1].id, "gpqa_1");
        assert_eq!(questions[1].options, Some(vec!["B".to_string()]));

        let err = GpqaAdapter::new("raw.csv")
            .with_subject("Genetics", SubjectMode::Subdomain)
            .read(csv.as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            AnalogiaError::Config(ConfigError::MissingColumn { ref column, .. }) if column == "subdomain"
        ));
    }

    #[test]
    fn test_fallback_ids_count_kept_rows() {
        let csv = "question,correct_answer,high_level_domain\nQ?,A,Physics\nR?,B,Biology\nS?,C,Biology\n";

        let biology = GpqaAdapter::new("raw.csv")
            .with_subject("Biology", SubjectMode::HighLevel)
            .read(csv.as_bytes())
            .unwrap();
        let ids: Vec<_> = biology.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["gpqa_0", "gpqa_1"]);
        assert_eq!(biology[0].text, "R?");
    }
}
