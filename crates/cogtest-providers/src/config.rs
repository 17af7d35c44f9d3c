//! Configuration loading and scorer factory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cogtest_core::audio_recall::AudioRecallConfig;
use cogtest_core::digit_span::DigitSpanConfig;
use cogtest_core::gonogo::GoNoGoConfig;
use cogtest_core::memory_recall::MemoryRecallConfig;
use cogtest_core::stroop::StroopConfig;
use cogtest_core::trail_making::TrailMakingConfig;
use cogtest_core::traits::SimilarityScorer;

use crate::http::{HttpSimilarityScorer, OfflineScorer, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Which similarity scorer to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScoringConfig {
    Http {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Offline,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig::Http {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Top-level cogtest configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CogtestConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub go_no_go: GoNoGoConfig,
    #[serde(default)]
    pub digit_span: DigitSpanConfig,
    #[serde(default)]
    pub audio_recall: AudioRecallConfig,
    #[serde(default)]
    pub stroop: StroopConfig,
    #[serde(default)]
    pub memory_recall: MemoryRecallConfig,
    #[serde(default)]
    pub trail_making: TrailMakingConfig,
}

impl CogtestConfig {
    /// Validate every engine section.
    pub fn validate(&self) -> Result<()> {
        self.go_no_go.validate()?;
        self.digit_span.validate()?;
        self.audio_recall.validate()?;
        self.stroop.validate()?;
        self.memory_recall.validate()?;
        self.trail_making.validate()?;
        Ok(())
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Each reference is expanded once; text inside substituted values is kept
/// as is. An unterminated `${` is copied verbatim.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                result.push_str(&std::env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `cogtest.toml` in the current directory
/// 2. `~/.config/cogtest/config.toml`
///
/// `COGTEST_SCORING_URL` overrides the scoring service URL.
pub fn load_config() -> Result<CogtestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CogtestConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("cogtest.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<CogtestConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => CogtestConfig::default(),
    };

    if let Ok(url) = std::env::var("COGTEST_SCORING_URL") {
        let timeout_secs = match config.scoring {
            ScoringConfig::Http { timeout_secs, .. } => timeout_secs,
            ScoringConfig::Offline => DEFAULT_TIMEOUT_SECS,
        };
        config.scoring = ScoringConfig::Http {
            base_url: url,
            timeout_secs,
        };
    }

    if let ScoringConfig::Http { base_url, .. } = &mut config.scoring {
        *base_url = resolve_env_vars(base_url);
    }

    config.validate().with_context(|| match &config_path {
        Some(path) => format!("invalid config: {}", path.display()),
        None => "invalid default config".to_string(),
    })?;
    tracing::debug!(path = ?config_path, scoring = ?config.scoring, "configuration loaded");

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("cogtest"))
}

/// Create a scorer instance from its configuration.
pub fn create_scorer(config: &ScoringConfig) -> Result<Box<dyn SimilarityScorer>> {
    match config {
        ScoringConfig::Http {
            base_url,
            timeout_secs,
        } => Ok(Box::new(HttpSimilarityScorer::new(base_url, *timeout_secs)?)),
        ScoringConfig::Offline => Ok(Box::new(OfflineScorer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_COGTEST_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_COGTEST_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_COGTEST_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_COGTEST_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_expands_each_reference_once() {
        std::env::set_var("_COGTEST_NESTED_VAR", "${_COGTEST_NESTED_VAR}");
        assert_eq!(
            resolve_env_vars("a${_COGTEST_NESTED_VAR}b"),
            "a${_COGTEST_NESTED_VAR}b"
        );
        std::env::remove_var("_COGTEST_NESTED_VAR");

        assert_eq!(resolve_env_vars("http://host/${unterminated"), "http://host/${unterminated");
        assert_eq!(resolve_env_vars("${_COGTEST_UNSET_VAR}x"), "x");
        assert_eq!(resolve_env_vars("no refs"), "no refs");
    }

    #[test]
    fn default_config() {
        let config = CogtestConfig::default();
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.go_no_go.total_trials, 15);
        assert_eq!(config.digit_span.start_level, 3);
        assert_eq!(config.audio_recall.sentences.len(), 5);
        assert_eq!(config.stroop.total_trials, 15);
        assert_eq!(config.memory_recall.words_to_display, 10);
        assert_eq!(config.trail_making.circles, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_sections() {
        let toml_str = r#"
[scoring]
type = "http"
base_url = "http://scoring.internal:9000"

[go_no_go]
total_trials = 20
go_probability = 0.8

[audio_recall]
total_rounds = 2
sentences = ["One sentence here.", "Another one there."]
"#;
        let config: CogtestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.scoring,
            ScoringConfig::Http {
                base_url: "http://scoring.internal:9000".into(),
                timeout_secs: 10,
            }
        );
        assert_eq!(config.go_no_go.total_trials, 20);
        assert_eq!(config.go_no_go.response_window_ms, 2000);
        assert_eq!(config.digit_span, DigitSpanConfig::default());
        assert_eq!(config.audio_recall.total_rounds, 2);
        assert_eq!(config.audio_recall.grace_ms, 2000);
    }

    #[test]
    fn parse_offline_scoring() {
        let config: CogtestConfig = toml::from_str("[scoring]\ntype = \"offline\"\n").unwrap();
        assert_eq!(config.scoring, ScoringConfig::Offline);
        let scorer = create_scorer(&config.scoring).unwrap();
        assert_eq!(scorer.name(), "offline");
    }

    #[test]
    fn load_rejects_invalid_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cogtest.toml");
        std::fs::write(&path, "[go_no_go]\ngo_probability = 1.5\n").unwrap();

        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("go_probability"), "got {err:#}");
    }

    #[test]
    fn load_reads_added_test_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cogtest.toml");
        std::fs::write(
            &path,
            "[scoring]\ntype = \"offline\"\n\n[stroop]\ntotal_trials = 20\n\n[memory_recall]\nwords_to_display = 5\ndistraction_ms = 0\n\n[trail_making]\ncircles = 8\n",
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.stroop.total_trials, 20);
        assert_eq!(config.memory_recall.words_to_display, 5);
        assert_eq!(config.memory_recall.distraction_ms, 0);
        assert_eq!(config.trail_making.circles, 8);
        assert_eq!(config.trail_making.target_secs, 25.0);
    }

    #[test]
    fn load_rejects_invalid_trail_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cogtest.toml");
        std::fs::write(&path, "[trail_making]\ncircles = 1\n").unwrap();

        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("trail_making"), "got {err:#}");
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let err = load_config_from(Some(Path::new("/nonexistent/cogtest.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn http_factory_uses_configured_url() {
        let scorer = create_scorer(&ScoringConfig::Http {
            base_url: "http://localhost:8123".into(),
            timeout_secs: 3,
        })
        .unwrap();
        assert_eq!(scorer.name(), "http");
    }
}
