//! Analogy judging.
//!
//! Only the record shape is fixed so far: a judgment carries every quality
//! dimension, unscored until an LLM-backed scorer fills them in.

mod metrics;

pub use metrics::*;

use crate::models::{Analogy, Judgment, Metadata};
use tracing::debug;

/// Produce an unscored judgment for `analogy`.
///
/// `context` is stored as the judgment's metadata.
pub fn judge_analogy(analogy: &Analogy, judge_model: &str, context: Metadata) -> Judgment {
    debug!(analogy_id = %analogy.id, judge = judge_model, "Judging analogy");

    Judgment {
        analogy_id: analogy.id.clone(),
        judge_model: judge_model.to_string(),
        scores: MetricScores::default(),
        metadata: context,
    }
}
