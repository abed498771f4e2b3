//! Configuration models for analogia.
//!
//! Three kinds of TOML documents are read here:
//! - a model config per LLM instance (backend, identity, sampling, credentials),
//! - an optional deployment config with defaults shared by every model,
//! - an experiment config for the student answering pipeline.

use crate::models::{AnalogiaError, ModelRole};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for one LLM instance.
///
/// Required keys are `backend`, `name` and `model_id`. Keys not listed
/// here are kept in `extra` and handed to the backend untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Registry key of the backend implementation (e.g. "openai_chat")
    pub backend: String,

    /// Project-local name for this instance (e.g. "teacher_gpt4_1_mini")
    pub name: String,

    /// Identifier sent to the remote API (e.g. "gpt-4.1-mini")
    pub model_id: String,

    #[serde(default)]
    pub role: ModelRole,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Explicit API key; `${VAR}` placeholders are expanded
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable consulted last for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_base_url_env")]
    pub base_url_env: String,

    /// Request timeout; falls back to the deployment default
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Backend-specific options
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url_env() -> String {
    "OPENAI_BASE_URL".to_string()
}

/// Used when neither config nor environment names an endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

impl ModelConfig {
    /// Load a model configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    /// Resolve the API key from the process environment.
    ///
    /// Precedence: explicit `api_key`, then the deployment default, then
    /// the `api_key_env` variable. Empty values are skipped.
    pub fn resolve_api_key(&self, deployment: &DeploymentConfig) -> Result<String, AnalogiaError> {
        self.resolve_api_key_with(deployment, |var| std::env::var(var).ok())
    }

    /// Resolve the API key with a caller-supplied environment lookup.
    pub fn resolve_api_key_with<F>(
        &self,
        deployment: &DeploymentConfig,
        lookup: F,
    ) -> Result<String, AnalogiaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = self
            .api_key
            .as_deref()
            .map(|key| expand_env_vars_with(key, &lookup));

        explicit
            .into_iter()
            .chain(deployment.api_key.as_deref().map(|key| expand_env_vars_with(key, &lookup)))
            .chain(lookup(&self.api_key_env))
            .find(|key| !key.trim().is_empty())
            .ok_or_else(|| AnalogiaError::MissingCredential {
                model: self.name.clone(),
                env_var: self.api_key_env.clone(),
            })
    }

    /// Resolve the base URL from the process environment.
    pub fn resolve_base_url(&self, deployment: &DeploymentConfig) -> String {
        self.resolve_base_url_with(deployment, |var| std::env::var(var).ok())
    }

    /// Resolve the base URL with the same precedence as the API key,
    /// falling back to [`DEFAULT_BASE_URL`].
    pub fn resolve_base_url_with<F>(&self, deployment: &DeploymentConfig, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        self.base_url
            .as_deref()
            .map(|url| expand_env_vars_with(url, &lookup))
            .into_iter()
            .chain(
                deployment
                    .base_url
                    .as_deref()
                    .map(|url| expand_env_vars_with(url, &lookup)),
            )
            .chain(lookup(&self.base_url_env))
            .find(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Effective request timeout in seconds.
    pub fn timeout_secs(&self, deployment: &DeploymentConfig) -> u64 {
        self.timeout_secs.unwrap_or(deployment.timeout_secs)
    }
}

/// Deployment-wide defaults shared by every model in a run.
///
/// Credentials here come from a local config file or `${VAR}` expansion,
/// never from a constant compiled into the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    120
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Top-level application config (`analogia.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

impl AppConfig {
    /// Load application config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    /// Load the file if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Which GPQA column provides the question's subject label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectMode {
    /// `high_level_domain` (Physics, Chemistry, Biology)
    #[default]
    HighLevel,
    /// `subdomain` (e.g. "Quantum Mechanics")
    Subdomain,
}

impl SubjectMode {
    pub fn column(&self) -> &'static str {
        match self {
            SubjectMode::HighLevel => "high_level_domain",
            SubjectMode::Subdomain => "subdomain",
        }
    }
}

/// Where questions come from and how they are filtered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Processed GPQA CSV or a JSONL file of questions
    pub path: PathBuf,

    #[serde(default)]
    pub subject_filter: Option<String>,

    #[serde(default)]
    pub subject_mode: SubjectMode,

    #[serde(default)]
    pub difficulty_filter: Option<Vec<String>>,

    /// Keep only the first N questions
    #[serde(default)]
    pub limit: Option<usize>,
}

impl DatasetConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            subject_filter: None,
            subject_mode: SubjectMode::default(),
            difficulty_filter: None,
            limit: None,
        }
    }
}

/// One experimental condition for the student pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Label written to the `condition` column
    pub name: String,

    #[serde(flatten)]
    pub kind: ConditionKind,
}

/// How the student prompt is built under a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionKind {
    /// Question only
    Baseline,
    /// Question plus the analogy stored for it in a CSV file
    WithAnalogyCsv { analogy_csv: PathBuf },
}

impl ConditionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ConditionKind::Baseline => "baseline",
            ConditionKind::WithAnalogyCsv { .. } => "with_analogy_csv",
        }
    }

    pub fn uses_analogy(&self) -> bool {
        matches!(self, ConditionKind::WithAnalogyCsv { .. })
    }
}

/// Student answering experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub dataset: DatasetConfig,

    /// Path to the student's model config
    pub student_model: PathBuf,

    /// Answers CSV destination
    pub output: PathBuf,

    pub conditions: Vec<ConditionConfig>,
}

impl ExperimentConfig {
    /// Load an experiment from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_toml(path)?;
        if config.conditions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "conditions".to_string(),
                reason: "at least one condition is required".to_string(),
            });
        }
        Ok(config)
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_owned(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_owned(),
        source: e,
    })
}

/// Expand `${VAR_NAME}` placeholders using `lookup`.
///
/// Unset variables leave the placeholder unchanged.
pub fn expand_env_vars_with<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };

    re.replace_all(s, |caps: &regex::Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Prompt template '{template}' uses unknown placeholder '{{{placeholder}}}'")]
    UnknownPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error("Prompt template '{template}' is malformed: {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Column '{column}' not found in {path}")]
    MissingColumn { path: PathBuf, column: String },
}
