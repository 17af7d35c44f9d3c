//! The `cogtest memory-recall` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use cogtest_core::memory_recall::{MemoryRecallEffect, MemoryRecallEngine};
use cogtest_core::session::run_memory_recall;
use cogtest_core::traits::Presenter;
use cogtest_providers::config::load_config_from;

struct ConsolePresenter;

impl Presenter<MemoryRecallEffect> for ConsolePresenter {
    fn present(&self, effect: &MemoryRecallEffect) {
        match effect {
            MemoryRecallEffect::ShowWords { words, display_for } => {
                println!(
                    "\nMemorize these words ({}s):",
                    display_for.as_secs()
                );
                for (i, word) in words.iter().enumerate() {
                    println!("  {:>2}. {word}", i + 1);
                }
            }
            MemoryRecallEffect::Distraction {
                count_from,
                duration,
            } => {
                print!("{}", "\n".repeat(40));
                println!(
                    "Count backwards from {count_from} in your head for {}s...",
                    duration.as_secs()
                );
            }
            MemoryRecallEffect::AwaitRecall { slots } => {
                println!("\nType the {slots} words in the order shown, separated by spaces or commas:");
            }
            MemoryRecallEffect::Rejected(_) => println!("  (wait for the recall prompt)"),
            MemoryRecallEffect::Completed(_) | MemoryRecallEffect::Timer(_) => {}
        }
    }
}

/// Split a typed answer line into words, keeping empty slots between
/// consecutive commas.
fn split_answers(line: &str) -> Vec<String> {
    if line.contains(',') {
        line.split(',').map(|w| w.trim().to_string()).collect()
    } else {
        line.split_whitespace().map(str::to_string).collect()
    }
}

pub async fn execute(
    seed: Option<u64>,
    report: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?.memory_recall;
    let engine = MemoryRecallEngine::new(config, &mut super::rng(seed))?;

    println!("Memory Recall: study a list of words, then type them back in order.");

    let answers = super::map_lines(super::stdin_lines(), |line| split_answers(&line));
    let outcome = run_memory_recall(engine, answers, &ConsolePresenter)
        .await
        .context("memory recall session failed")?;

    println!();
    for item in &outcome.items {
        let mark = if item.correct { "ok" } else { "--" };
        println!("  [{mark}] {:<14} you typed: {}", item.word, item.answer);
    }
    println!(
        "Score: {}/{} ({:.0}%)",
        outcome.score,
        outcome.max_score,
        outcome.percentage()
    );
    println!("{}", outcome.interpretation());

    super::merge_into_report(report.as_deref(), |r| r.memory_recall = Some(outcome))
}
