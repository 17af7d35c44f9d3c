//! The `cogtest summary` command.

use std::path::PathBuf;

use anyhow::Result;

use cogtest_core::report::{BatteryReport, Category};

pub fn execute(report_path: PathBuf, format: String) -> Result<()> {
    let report = BatteryReport::load_json(&report_path)?;

    match format.as_str() {
        "json" => {
            let summary = serde_json::json!({
                "id": report.id,
                "created_at": report.created_at,
                "tests": report.test_scores(),
                "categories": category_percentages(&report),
                "overall_percentage": report.overall_percentage(),
                "overall_tier": report.overall_tier(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => print_text(&report),
    }
    Ok(())
}

/// Category name to mean percentage, for the categories with results.
fn category_percentages(report: &BatteryReport) -> serde_json::Map<String, serde_json::Value> {
    Category::ALL
        .into_iter()
        .filter_map(|c| {
            let pct = report.category_percentage(c)?;
            let key = serde_json::to_value(c).ok()?.as_str()?.to_string();
            Some((key, serde_json::Value::from(pct)))
        })
        .collect()
}

fn print_text(report: &BatteryReport) {
    use comfy_table::{Cell, Table};

    println!(
        "Battery report {} ({})",
        report.id,
        report.created_at.format("%Y-%m-%d %H:%M UTC")
    );

    let scores = report.test_scores();
    if scores.is_empty() {
        println!("No test results recorded yet.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Test", "Category", "Score", "Percent", "Level"]);
    for s in &scores {
        table.add_row(vec![
            Cell::new(s.name),
            Cell::new(s.category),
            Cell::new(format!("{} / {}", s.score, s.max_score)),
            Cell::new(format!("{:.0}%", s.percentage())),
            Cell::new(s.tier()),
        ]);
    }
    println!("{table}");

    let mut categories = Table::new();
    categories.set_header(vec!["Category", "Percent"]);
    for category in Category::ALL {
        if let Some(pct) = report.category_percentage(category) {
            categories.add_row(vec![Cell::new(category), Cell::new(format!("{pct:.0}%"))]);
        }
    }
    println!("{categories}");

    if let (Some(overall), Some(tier)) = (report.overall_percentage(), report.overall_tier()) {
        println!("Overall: {overall:.1}% ({tier})");
    }
    if let Some(text) = report.interpretation() {
        println!("{text}");
    }
    println!("This is a screening tool, not a diagnosis.");
}
