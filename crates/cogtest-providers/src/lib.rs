//! cogtest-providers — Implementations of the cogtest-core ports.
//!
//! Provides the HTTP similarity scorer, an offline scorer, test doubles for
//! the speech and microphone capabilities, and TOML configuration loading.

pub mod config;
pub mod http;
pub mod mock;

pub use config::{create_scorer, load_config, load_config_from, CogtestConfig, ScoringConfig};
pub use http::{HttpSimilarityScorer, OfflineScorer};
