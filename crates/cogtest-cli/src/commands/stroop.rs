//! The `cogtest stroop` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use cogtest_core::session::run_stroop;
use cogtest_core::stroop::{InkColor, StroopEffect, StroopEngine, StroopMetrics};
use cogtest_core::timer::MonotonicClock;
use cogtest_core::traits::Presenter;
use cogtest_providers::config::load_config_from;

struct ConsolePresenter;

impl Presenter<StroopEffect> for ConsolePresenter {
    fn present(&self, effect: &StroopEffect) {
        match effect {
            StroopEffect::Show {
                index,
                total,
                trial,
            } => {
                println!(
                    "\nTrial {}/{}: the word {} printed in {} ink",
                    index + 1,
                    total,
                    trial.word,
                    trial.ink.to_string().to_lowercase()
                );
            }
            StroopEffect::Answered(response) => {
                if response.correct {
                    println!("  Correct ({}ms)", response.response_time_ms);
                } else {
                    println!("  Incorrect, the ink was {}", response.ink);
                }
            }
            StroopEffect::Completed(_) => {}
        }
    }
}

pub async fn execute(
    trials: Option<usize>,
    seed: Option<u64>,
    report: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?.stroop;
    if let Some(trials) = trials {
        config.total_trials = trials;
    }
    let engine = StroopEngine::new(config, &mut super::rng(seed))?;

    let names: Vec<String> = InkColor::ALL.iter().map(|c| c.to_string()).collect();
    println!("Stroop: name the INK color, not the word.");
    println!("Type one of {} (or its first letter) and press Enter.", names.join(", "));

    let answers = super::parse_lines::<InkColor>(super::stdin_lines());
    let metrics = run_stroop(engine, &MonotonicClock::new(), answers, &ConsolePresenter)
        .await
        .context("stroop session failed")?;

    print_metrics(&metrics);
    super::merge_into_report(report.as_deref(), |r| r.stroop = Some(metrics))
}

fn print_metrics(metrics: &StroopMetrics) {
    println!(
        "\nCorrect: {}/{} ({:.0}%)",
        metrics.correct_count,
        metrics.total_trials,
        metrics.accuracy()
    );
    println!("Avg response time: {:.0}ms", metrics.avg_response_time_ms);
    println!("{}", metrics.interpretation());
}
