//! The `cogtest go-no-go` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use cogtest_core::gonogo::{GoNoGoEffect, GoNoGoEngine, GoNoGoMetrics, Outcome};
use cogtest_core::session::run_go_no_go;
use cogtest_core::timer::MonotonicClock;
use cogtest_core::traits::Presenter;
use cogtest_providers::config::load_config_from;

/// Prints trial prompts and feedback to the terminal.
struct ConsolePresenter;

impl Presenter<GoNoGoEffect> for ConsolePresenter {
    fn present(&self, effect: &GoNoGoEffect) {
        match effect {
            GoNoGoEffect::Waiting { ordinal, total } => {
                println!("\nTrial {}/{}: get ready...", ordinal + 1, total);
            }
            GoNoGoEffect::ShowStimulus {
                stimulus, position, ..
            } => {
                println!(
                    "  >>> {} {} at ({:.0}%, {:.0}%) <<<",
                    stimulus.kind.color().to_uppercase(),
                    stimulus.shape.to_string().to_uppercase(),
                    position.x_pct,
                    position.y_pct
                );
            }
            GoNoGoEffect::ShowFeedback { trial, message } => match trial.reaction_time_ms {
                Some(ms) => println!("  {message} ({ms}ms)"),
                None => println!("  {message}"),
            },
            GoNoGoEffect::Completed(_) | GoNoGoEffect::Timer(_) => {}
        }
    }
}

pub async fn execute(
    trials: Option<usize>,
    seed: Option<u64>,
    report: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?.go_no_go;
    if let Some(trials) = trials {
        config.total_trials = trials;
    }

    let engine = GoNoGoEngine::new(config, super::rng(seed))?;

    println!("Go/No-Go: press Enter as fast as you can for GREEN shapes.");
    println!("Do NOT respond to RED shapes. Wait for each shape to appear.");

    let responses = super::map_lines(super::stdin_lines(), |_| ());
    let metrics = run_go_no_go(engine, &MonotonicClock::new(), responses, &ConsolePresenter)
        .await
        .context("go/no-go session failed")?;

    print_metrics(&metrics);
    super::merge_into_report(report.as_deref(), |r| r.go_no_go = Some(metrics))
}

fn print_metrics(metrics: &GoNoGoMetrics) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![Cell::new("Score"), Cell::new(format!("{:.0}", metrics.score))]);
    table.add_row(vec![
        Cell::new("Accuracy"),
        Cell::new(format!("{:.1}%", metrics.accuracy)),
    ]);
    table.add_row(vec![
        Cell::new("Avg reaction time"),
        Cell::new(format!("{:.0}ms", metrics.avg_reaction_time_ms)),
    ]);
    table.add_row(vec![
        Cell::new("Commission errors"),
        Cell::new(metrics.commission_errors),
    ]);
    table.add_row(vec![
        Cell::new("Omission errors"),
        Cell::new(metrics.omission_errors),
    ]);
    table.add_row(vec![
        Cell::new("False starts"),
        Cell::new(metrics.false_starts),
    ]);

    let successes = metrics
        .trials
        .iter()
        .filter(|t| t.outcome == Outcome::Success)
        .count();
    println!("\n{successes}/{} trials correct", metrics.trials.len());
    println!("{table}");
}
