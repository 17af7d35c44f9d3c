//! The `cogtest trail-making` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use cogtest_core::session::run_trail_making;
use cogtest_core::timer::MonotonicClock;
use cogtest_core::trail_making::{Circle, TrailMakingEffect, TrailMakingEngine};
use cogtest_core::traits::Presenter;
use cogtest_providers::config::load_config_from;

const GRID_COLS: usize = 40;
const GRID_ROWS: usize = 16;

struct ConsolePresenter;

impl Presenter<TrailMakingEffect> for ConsolePresenter {
    fn present(&self, effect: &TrailMakingEffect) {
        match effect {
            TrailMakingEffect::Show { circles } => {
                println!("\n{}", render_grid(circles));
                println!("Type 1, then 2, and so on, pressing Enter after each number.");
            }
            TrailMakingEffect::Hit { number } => println!("  {number} ok"),
            TrailMakingEffect::Miss { picked, expected } => {
                println!("  {picked} is wrong, looking for {expected}");
            }
            TrailMakingEffect::Rejected(e) => println!("  ({e})"),
            TrailMakingEffect::Completed(_) => {}
        }
    }
}

/// Draw the circles' numbers on a character grid scaled from percent
/// positions.
fn render_grid(circles: &[Circle]) -> String {
    let mut grid = vec![vec![' '; GRID_COLS]; GRID_ROWS];
    for circle in circles {
        let col = ((circle.position.x_pct / 100.0) * (GRID_COLS - 2) as f32) as usize;
        let row = ((circle.position.y_pct / 100.0) * GRID_ROWS as f32) as usize;
        let row = row.min(GRID_ROWS - 1);
        for (i, ch) in circle.number.to_string().chars().enumerate() {
            if let Some(cell) = grid[row].get_mut(col + i) {
                *cell = ch;
            }
        }
    }
    let border = format!("+{}+", "-".repeat(GRID_COLS));
    let mut out = vec![border.clone()];
    out.extend(
        grid.into_iter()
            .map(|row| format!("|{}|", row.into_iter().collect::<String>())),
    );
    out.push(border);
    out.join("\n")
}

pub async fn execute(
    seed: Option<u64>,
    report: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?.trail_making;
    let engine = TrailMakingEngine::new(config, &mut super::rng(seed))?;

    println!("Trail Making: connect the numbers in order as fast as you can.");

    let picks = super::parse_lines::<usize>(super::stdin_lines());
    let metrics = run_trail_making(engine, &MonotonicClock::new(), picks, &ConsolePresenter)
        .await
        .context("trail making session failed")?;

    println!(
        "\nCompleted in {:.1}s with {} error(s). Score: {:.0}/100",
        metrics.completion_ms as f64 / 1000.0,
        metrics.errors,
        metrics.score
    );

    super::merge_into_report(report.as_deref(), |r| r.trail_making = Some(metrics))
}
