//! Similarity scoring helpers for audio recall.
//!
//! The fallback is a bag-of-words overlap, not an edit distance. It is kept
//! deliberately weak so that scores stay comparable with the scoring
//! service's behavior.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;

/// Similarity at or above this value counts as a correct round.
pub const CORRECT_THRESHOLD: f64 = 70.0;

/// Local similarity used when the scoring service fails.
///
/// Both strings are lowercased and split on whitespace. Every token of
/// `original` (duplicates included) that appears anywhere in `spoken` counts
/// as a match; the match count is divided by the longer token list.
pub fn fallback_similarity(original: &str, spoken: &str) -> f64 {
    let original = original.to_lowercase();
    let spoken = spoken.to_lowercase();
    let original_tokens: Vec<&str> = original.split_whitespace().collect();
    let spoken_tokens: Vec<&str> = spoken.split_whitespace().collect();

    let total = original_tokens.len().max(spoken_tokens.len());
    if total == 0 {
        return 0.0;
    }

    let spoken_set: HashSet<&str> = spoken_tokens.iter().copied().collect();
    let matches = original_tokens
        .iter()
        .filter(|t| spoken_set.contains(*t))
        .count();

    matches as f64 / total as f64 * 100.0
}

/// `true` when `score` meets the inclusive correctness threshold.
pub fn is_correct(score: f64) -> bool {
    score >= CORRECT_THRESHOLD
}

/// Which computation produced a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Service,
    Fallback,
}

/// Turn a scorer result into a score in [0, 100], falling back locally on
/// any failure.
pub fn resolve_score(
    result: Result<f64, ScoringError>,
    original: &str,
    spoken: &str,
) -> (f64, ScoreSource) {
    match result {
        Ok(score) if score.is_finite() => (score.clamp(0.0, 100.0), ScoreSource::Service),
        Ok(score) => {
            tracing::warn!("scoring service returned non-finite score {score}, using fallback");
            (fallback_similarity(original, spoken), ScoreSource::Fallback)
        }
        Err(e) => {
            tracing::warn!("scoring service failed, using fallback: {e}");
            (fallback_similarity(original, spoken), ScoreSource::Fallback)
        }
    }
}

/// Summary tier for an average recall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl PerformanceTier {
    pub fn from_average(average: f64) -> Self {
        if average >= 80.0 {
            PerformanceTier::Excellent
        } else if average >= 70.0 {
            PerformanceTier::Good
        } else if average >= 50.0 {
            PerformanceTier::Fair
        } else {
            PerformanceTier::NeedsImprovement
        }
    }

    /// Auditory memory assessment shown with the recall results.
    pub fn interpretation(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "Outstanding auditory memory and verbal recall! Your ability to process and reproduce spoken information is excellent.",
            PerformanceTier::Good => "Good auditory memory. You can effectively process and recall spoken information.",
            PerformanceTier::Fair => "Fair auditory memory. Consider practicing active listening techniques to improve recall.",
            PerformanceTier::NeedsImprovement => "Auditory memory may need attention. Regular practice with listening exercises could help improve recall abilities.",
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceTier::Excellent => write!(f, "Excellent"),
            PerformanceTier::Good => write!(f, "Good"),
            PerformanceTier::Fair => write!(f, "Fair"),
            PerformanceTier::NeedsImprovement => write!(f, "Needs Improvement"),
        }
    }
}
