//! The `cogtest digit-span` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use cogtest_core::digit_span::{
    expected_answer, DigitSpanEffect, DigitSpanEngine, SpanPhase, NOMINAL_MAX_SCORE,
};
use cogtest_core::session::{run_digit_span, DigitSpanInput};
use cogtest_core::traits::Presenter;
use cogtest_providers::config::load_config_from;

struct ConsolePresenter;

impl Presenter<DigitSpanEffect> for ConsolePresenter {
    fn present(&self, effect: &DigitSpanEffect) {
        match effect {
            DigitSpanEffect::ShowSequence {
                phase,
                level,
                attempt,
                sequence,
                display_for,
            } => {
                let digits: Vec<String> = sequence.iter().map(|d| d.to_string()).collect();
                println!(
                    "\n[{phase}] level {level}, attempt {}, memorize ({:.1}s):",
                    attempt + 1,
                    display_for.as_secs_f64()
                );
                println!("    {}", digits.join(" "));
            }
            DigitSpanEffect::AwaitInput {
                phase,
                expected_len,
                ..
            } => {
                // scroll the sequence out of view
                print!("{}", "\n".repeat(40));
                let order = match phase {
                    SpanPhase::Forward => "in order",
                    SpanPhase::Backward => "in REVERSE order",
                };
                println!("Type the {expected_len} digits {order} and press Enter:");
            }
            DigitSpanEffect::Answered(attempt) => {
                if attempt.correct {
                    println!("Correct!");
                } else {
                    println!(
                        "Incorrect. Expected {}, you typed {}.",
                        expected_answer(attempt.phase, &attempt.sequence),
                        attempt.user_answer
                    );
                }
            }
            DigitSpanEffect::Rejected(e) => println!("  ({e})"),
            DigitSpanEffect::Completed(_) | DigitSpanEffect::Timer(_) => {}
        }
    }
}

pub async fn execute(
    seed: Option<u64>,
    report: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?.digit_span;
    let engine = DigitSpanEngine::new(config, super::rng(seed))?;

    println!("Digit Span: remember each sequence, then type it back.");
    println!("The forward part is followed by a backward part.");

    let input = super::map_lines(super::stdin_lines(), DigitSpanInput::Submit);
    let scores = run_digit_span(engine, input, &ConsolePresenter)
        .await
        .context("digit span session failed")?;

    println!("\nForward span:  {}", scores.forward_score);
    println!("Backward span: {}", scores.backward_score);
    println!("Total:         {} / {NOMINAL_MAX_SCORE}", scores.total());

    super::merge_into_report(report.as_deref(), |r| r.digit_span = Some(scores))
}
