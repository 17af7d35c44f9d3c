//! Battery report: the results of one sitting, with JSON persistence and the
//! normalized overall score shown on the summary screen.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio_recall::AudioRecallOutcome;
use crate::digit_span::{DigitSpanScores, NOMINAL_MAX_SCORE};
use crate::gonogo::GoNoGoMetrics;
use crate::memory_recall::MemoryRecallOutcome;
use crate::stroop::StroopMetrics;
use crate::trail_making::TrailMakingMetrics;

/// Results of one sitting. Each test is optional so a report can be filled
/// in test by test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_no_go: Option<GoNoGoMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digit_span: Option<DigitSpanScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_recall: Option<AudioRecallOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroop: Option<StroopMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_recall: Option<MemoryRecallOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trail_making: Option<TrailMakingMetrics>,
}

/// Cognitive domain a test contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Memory,
    Attention,
    #[serde(rename = "speed")]
    ProcessingSpeed,
    #[serde(rename = "executive")]
    ExecutiveFunction,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Memory,
        Category::Attention,
        Category::ProcessingSpeed,
        Category::ExecutiveFunction,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Memory => write!(f, "Memory"),
            Category::Attention => write!(f, "Attention"),
            Category::ProcessingSpeed => write!(f, "Processing Speed"),
            Category::ExecutiveFunction => write!(f, "Executive Function"),
        }
    }
}

/// One test's score against its maximum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestScore {
    pub name: &'static str,
    pub category: Category,
    pub score: f64,
    pub max_score: f64,
}

impl TestScore {
    pub fn percentage(&self) -> f64 {
        if self.max_score <= 0.0 {
            0.0
        } else {
            self.score / self.max_score * 100.0
        }
    }

    pub fn tier(&self) -> BatteryTier {
        BatteryTier::from_percentage(self.percentage())
    }
}

/// Performance level of a normalized battery score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryTier {
    Excellent,
    Good,
    Fair,
    NeedsAttention,
}

impl BatteryTier {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            BatteryTier::Excellent
        } else if percentage >= 75.0 {
            BatteryTier::Good
        } else if percentage >= 60.0 {
            BatteryTier::Fair
        } else {
            BatteryTier::NeedsAttention
        }
    }
}

impl fmt::Display for BatteryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryTier::Excellent => write!(f, "Excellent"),
            BatteryTier::Good => write!(f, "Good"),
            BatteryTier::Fair => write!(f, "Fair"),
            BatteryTier::NeedsAttention => write!(f, "Needs Attention"),
        }
    }
}

impl Default for BatteryReport {
    fn default() -> Self {
        Self::new()
    }
}

impl BatteryReport {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            go_no_go: None,
            digit_span: None,
            audio_recall: None,
            stroop: None,
            memory_recall: None,
            trail_making: None,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: BatteryReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Load `path` if it exists, otherwise start a fresh report.
    pub fn load_or_new(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Scores of the tests present in the report.
    pub fn test_scores(&self) -> Vec<TestScore> {
        let mut scores = Vec::new();
        if let Some(m) = &self.go_no_go {
            scores.push(TestScore {
                name: "Go/No-Go",
                category: Category::ProcessingSpeed,
                score: m.score,
                max_score: 100.0,
            });
        }
        if let Some(s) = &self.digit_span {
            scores.push(TestScore {
                name: "Digit Span",
                category: Category::Memory,
                score: s.total() as f64,
                max_score: NOMINAL_MAX_SCORE as f64,
            });
        }
        if let Some(o) = &self.audio_recall {
            scores.push(TestScore {
                name: "Audio Recall",
                category: Category::Memory,
                score: o.correct_round_count as f64,
                max_score: o.total_rounds as f64,
            });
        }
        if let Some(m) = &self.stroop {
            scores.push(TestScore {
                name: "Stroop",
                category: Category::Attention,
                score: m.correct_count as f64,
                max_score: m.total_trials as f64,
            });
        }
        if let Some(o) = &self.memory_recall {
            scores.push(TestScore {
                name: "Memory Recall",
                category: Category::Memory,
                score: o.score as f64,
                max_score: o.max_score as f64,
            });
        }
        if let Some(m) = &self.trail_making {
            scores.push(TestScore {
                name: "Trail Making",
                category: Category::ExecutiveFunction,
                score: m.score,
                max_score: 100.0,
            });
        }
        scores
    }

    /// Mean of the per-test percentages; `None` for an empty report.
    pub fn overall_percentage(&self) -> Option<f64> {
        let scores = self.test_scores();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().map(TestScore::percentage).sum::<f64>() / scores.len() as f64)
    }

    /// Mean percentage of the tests in `category`; `None` when the report
    /// has none.
    pub fn category_percentage(&self, category: Category) -> Option<f64> {
        let percentages: Vec<f64> = self
            .test_scores()
            .iter()
            .filter(|s| s.category == category)
            .map(TestScore::percentage)
            .collect();
        if percentages.is_empty() {
            return None;
        }
        Some(percentages.iter().sum::<f64>() / percentages.len() as f64)
    }

    pub fn overall_tier(&self) -> Option<BatteryTier> {
        self.overall_percentage().map(BatteryTier::from_percentage)
    }

    /// Screening interpretation of the overall score.
    pub fn interpretation(&self) -> Option<&'static str> {
        let overall = self.overall_percentage()?;
        Some(if overall >= 85.0 {
            "Excellent cognitive function across all domains."
        } else if overall >= 70.0 {
            "Good cognitive function with minor variability."
        } else if overall >= 55.0 {
            "Mild cognitive concerns detected. Consider discussing these results with a healthcare professional."
        } else {
            "Significant cognitive concerns detected. Consulting a healthcare professional is strongly recommended."
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_recall::RecallDetails;
    use crate::gonogo::compute_metrics;

    fn audio(correct: usize) -> AudioRecallOutcome {
        AudioRecallOutcome {
            correct_round_count: correct,
            total_rounds: 3,
            details: RecallDetails {
                average_score: 75.0,
                round_results: vec![],
            },
        }
    }

    #[test]
    fn empty_report_has_no_overall() {
        let report = BatteryReport::new();
        assert!(report.test_scores().is_empty());
        assert_eq!(report.overall_percentage(), None);
        assert_eq!(report.interpretation(), None);
    }

    #[test]
    fn overall_averages_normalized_scores() {
        let mut report = BatteryReport::new();
        report.digit_span = Some(DigitSpanScores {
            forward_score: 8,
            backward_score: 4,
        });
        report.audio_recall = Some(audio(3));

        // 12/16 = 75%, 3/3 = 100%
        let overall = report.overall_percentage().unwrap();
        assert!((overall - 87.5).abs() < 1e-9, "got {overall}");
        assert_eq!(report.overall_tier(), Some(BatteryTier::Good));
        assert_eq!(
            report.interpretation(),
            Some("Excellent cognitive function across all domains.")
        );
    }

    #[test]
    fn category_percentage_averages_within_the_domain() {
        let mut report = BatteryReport::new();
        report.digit_span = Some(DigitSpanScores {
            forward_score: 8,
            backward_score: 4,
        });
        report.audio_recall = Some(audio(3));
        report.trail_making = Some(TrailMakingMetrics {
            completion_ms: 30_000,
            errors: 0,
            score: 90.0,
        });

        // memory: (75% + 100%) / 2
        let memory = report.category_percentage(Category::Memory).unwrap();
        assert!((memory - 87.5).abs() < 1e-9, "got {memory}");
        assert_eq!(
            report.category_percentage(Category::ExecutiveFunction),
            Some(90.0)
        );
        assert_eq!(report.category_percentage(Category::Attention), None);
        assert_eq!(report.category_percentage(Category::ProcessingSpeed), None);
    }

    #[test]
    fn every_test_maps_to_its_domain() {
        let mut report = BatteryReport::new();
        report.go_no_go = Some(compute_metrics(&[], 15));
        report.stroop = Some(StroopMetrics::from_responses(&[], 15));
        report.memory_recall = Some(MemoryRecallOutcome::score(
            &["APPLE".to_string()],
            &["apple".to_string()],
        ));
        let categories: Vec<(&str, Category)> = report
            .test_scores()
            .iter()
            .map(|s| (s.name, s.category))
            .collect();
        assert_eq!(
            categories,
            vec![
                ("Go/No-Go", Category::ProcessingSpeed),
                ("Stroop", Category::Attention),
                ("Memory Recall", Category::Memory),
            ]
        );
        assert_eq!(
            serde_json::to_string(&Category::ProcessingSpeed).unwrap(),
            "\"speed\""
        );
        assert_eq!(Category::ExecutiveFunction.to_string(), "Executive Function");
    }

    #[test]
    fn tiers_follow_percentage() {
        assert_eq!(BatteryTier::from_percentage(90.0), BatteryTier::Excellent);
        assert_eq!(BatteryTier::from_percentage(75.0), BatteryTier::Good);
        assert_eq!(BatteryTier::from_percentage(60.0), BatteryTier::Fair);
        assert_eq!(BatteryTier::from_percentage(59.9), BatteryTier::NeedsAttention);
        assert_eq!(BatteryTier::NeedsAttention.to_string(), "Needs Attention");
    }

    #[test]
    fn json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/report.json");

        let mut report = BatteryReport::new();
        report.go_no_go = Some(compute_metrics(&[], 15));
        report.audio_recall = Some(audio(1));
        report.save_json(&path).unwrap();

        let loaded = BatteryReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.go_no_go, report.go_no_go);
        assert_eq!(loaded.audio_recall, report.audio_recall);
        assert!(loaded.digit_span.is_none());
    }

    #[test]
    fn load_or_new_starts_fresh_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = BatteryReport::load_or_new(&dir.path().join("absent.json")).unwrap();
        assert!(report.test_scores().is_empty());
    }
}
