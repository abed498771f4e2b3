//! Analogy quality dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One axis an analogy is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeDimension {
    /// How much the analogy gives away the correct answer
    Revealness,
    MappingQuality,
    Clarity,
    Creativity,
    Plausibility,
    ExplanatoryPower,
}

impl JudgeDimension {
    pub const ALL: [JudgeDimension; 6] = [
        JudgeDimension::Revealness,
        JudgeDimension::MappingQuality,
        JudgeDimension::Clarity,
        JudgeDimension::Creativity,
        JudgeDimension::Plausibility,
        JudgeDimension::ExplanatoryPower,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            JudgeDimension::Revealness => "revealness",
            JudgeDimension::MappingQuality => "mapping_quality",
            JudgeDimension::Clarity => "clarity",
            JudgeDimension::Creativity => "creativity",
            JudgeDimension::Plausibility => "plausibility",
            JudgeDimension::ExplanatoryPower => "explanatory_power",
        }
    }
}

impl fmt::Display for JudgeDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Scores over every [`JudgeDimension`].
///
/// The key set is fixed by the type: unscored dimensions serialize as
/// `null` rather than disappearing, so downstream aggregation always sees
/// the same six columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricScores {
    pub revealness: Option<f64>,
    pub mapping_quality: Option<f64>,
    pub clarity: Option<f64>,
    pub creativity: Option<f64>,
    pub plausibility: Option<f64>,
    pub explanatory_power: Option<f64>,
}

impl MetricScores {
    pub fn get(&self, dimension: JudgeDimension) -> Option<f64> {
        match dimension {
            JudgeDimension::Revealness => self.revealness,
            JudgeDimension::MappingQuality => self.mapping_quality,
            JudgeDimension::Clarity => self.clarity,
            JudgeDimension::Creativity => self.creativity,
            JudgeDimension::Plausibility => self.plausibility,
            JudgeDimension::ExplanatoryPower => self.explanatory_power,
        }
    }

    pub fn set(&mut self, dimension: JudgeDimension, score: Option<f64>) {
        let slot = match dimension {
            JudgeDimension::Revealness => &mut self.revealness,
            JudgeDimension::MappingQuality => &mut self.mapping_quality,
            JudgeDimension::Clarity => &mut self.clarity,
            JudgeDimension::Creativity => &mut self.creativity,
            JudgeDimension::Plausibility => &mut self.plausibility,
            JudgeDimension::ExplanatoryPower => &mut self.explanatory_power,
        };
        *slot = score;
    }

    /// `(dimension, score)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (JudgeDimension, Option<f64>)> + '_ {
        JudgeDimension::ALL.into_iter().map(|d| (d, self.get(d)))
    }

    pub fn is_complete(&self) -> bool {
        self.iter().all(|(_, score)| score.is_some())
    }

    /// Mean over scored dimensions; `None` when nothing is scored.
    pub fn mean(&self) -> Option<f64> {
        let scored: Vec<f64> = self.iter().filter_map(|(_, score)| score).collect();
        if scored.is_empty() {
            None
        } else {
            Some(scored.iter().sum::<f64>() / scored.len() as f64)
        }
    }
}
