//! The `cogtest similarity` command.

use std::path::PathBuf;

use anyhow::Result;

use cogtest_core::similarity::{is_correct, resolve_score, ScoreSource};
use cogtest_core::traits::{CompareRequest, SimilarityScorer};
use cogtest_providers::config::{create_scorer, load_config_from};
use cogtest_providers::http::OfflineScorer;

pub async fn execute(
    original: String,
    spoken: String,
    offline: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let scorer: Box<dyn SimilarityScorer> = if offline {
        Box::new(OfflineScorer)
    } else {
        let config = load_config_from(config_path.as_deref())?;
        create_scorer(&config.scoring)?
    };

    let request = CompareRequest { original, spoken };
    let result = scorer.score(&request).await;
    let (score, source) = resolve_score(result, &request.original, &request.spoken);

    println!("Similarity: {score:.1}%");
    match source {
        ScoreSource::Service => println!("Scored by:  {}", scorer.name()),
        ScoreSource::Fallback => println!("Scored by:  local fallback ({} scorer failed)", scorer.name()),
    }
    println!(
        "Result:     {}",
        if is_correct(score) {
            "correct"
        } else {
            "incorrect"
        }
    );
    Ok(())
}
