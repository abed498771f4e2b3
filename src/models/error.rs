//! Error types for analogia.
//!
//! Taxonomy:
//! - Setup failures: unregistered names, missing credentials, bad configuration.
//!   These are fatal to a run.
//! - Backend failures: a model call did not produce text. Pipelines skip the
//!   affected question and continue.
//! - Local failures: filesystem, CSV and JSONL problems.

use crate::registry::RegistryKind;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for analogia.
#[derive(Debug, Error)]
pub enum AnalogiaError {
    // ═══════════════════════════════════════════════════════════════════
    // SETUP: raised immediately, never retried
    // ═══════════════════════════════════════════════════════════════════
    #[error("{kind} '{name}' is not registered")]
    NotFound { kind: RegistryKind, name: String },

    #[error(
        "Missing API key for model '{model}': set api_key in the model config, \
         api_key under [deployment], or the {env_var} env var"
    )]
    MissingCredential { model: String, env_var: String },

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    // ═══════════════════════════════════════════════════════════════════
    // BACKEND: one model call failed
    // ═══════════════════════════════════════════════════════════════════
    #[error("Model '{model}' invocation failed: {source}")]
    ModelInvocation {
        model: String,
        #[source]
        source: BackendError,
    },

    // ═══════════════════════════════════════════════════════════════════
    // LOCAL: files and records
    // ═══════════════════════════════════════════════════════════════════
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {context}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Failures reported by a model backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<f64> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("Scripted backend: {0}")]
    Scripted(String),
}

fn retry_hint(retry_after_secs: &Option<f64>) -> String {
    retry_after_secs
        .map(|secs| format!(": retry after {secs}s"))
        .unwrap_or_default()
}

impl AnalogiaError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a CSV error with context.
    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    /// Wrap a backend failure for the named model.
    pub fn invocation(model: impl Into<String>, source: BackendError) -> Self {
        Self::ModelInvocation {
            model: model.into(),
            source,
        }
    }

    /// Whether a pipeline may skip the current item and keep going.
    ///
    /// Only backend failures qualify; everything else aborts the run.
    pub fn is_per_item(&self) -> bool {
        matches!(self, Self::ModelInvocation { .. })
    }
}

/// Result type alias for analogia.
pub type Result<T> = std::result::Result<T, AnalogiaError>;
