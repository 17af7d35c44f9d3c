//! HTTP similarity scoring service client, plus the offline scorer.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::instrument;

use cogtest_core::error::ScoringError;
use cogtest_core::similarity::fallback_similarity;
use cogtest_core::traits::{CompareRequest, CompareResponse, SimilarityScorer};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Scorer backed by `POST {base_url}/compare-text`.
pub struct HttpSimilarityScorer {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpSimilarityScorer {
    pub fn new(base_url: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };
        let timeout_secs = if timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            timeout_secs
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base.trim_end_matches('/').to_string(),
            timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SimilarityScorer for HttpSimilarityScorer {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(base_url = %self.base_url))]
    async fn score(&self, request: &CompareRequest) -> Result<f64, ScoringError> {
        let response = self
            .client
            .post(format!("{}/compare-text", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoringError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    ScoringError::Network(format!(
                        "scoring service not reachable at {}",
                        self.base_url
                    ))
                } else {
                    ScoringError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringError::Status {
                status,
                message: body,
            });
        }

        let body: CompareResponse = response
            .json()
            .await
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))?;
        tracing::debug!(score = body.similarity_score, "similarity scored");
        Ok(body.similarity_score)
    }
}

/// Scores locally with the bag-of-words fallback; never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineScorer;

#[async_trait]
impl SimilarityScorer for OfflineScorer {
    fn name(&self) -> &str {
        "offline"
    }

    async fn score(&self, request: &CompareRequest) -> Result<f64, ScoringError> {
        Ok(fallback_similarity(&request.original, &request.spoken))
    }
}
