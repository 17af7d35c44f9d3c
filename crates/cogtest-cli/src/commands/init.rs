//! The `cogtest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("cogtest.toml").exists() {
        println!("cogtest.toml already exists, skipping.");
    } else {
        std::fs::write("cogtest.toml", SAMPLE_CONFIG)?;
        println!("Created cogtest.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point [scoring] at your similarity service (or set type = \"offline\")");
    println!("  2. Run: cogtest go-no-go --report battery.json");
    println!("  3. Run: cogtest digit-span --report battery.json");
    println!("  4. Run: cogtest stroop, memory-recall and trail-making the same way");
    println!("  5. Run: cogtest summary --report battery.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# cogtest configuration

[scoring]
type = "http"
base_url = "http://127.0.0.1:8000"
timeout_secs = 10

[go_no_go]
total_trials = 15
go_probability = 0.7
wait_range_ms = [1500, 3500]
response_window_ms = 2000
feedback_ms = 1500

[digit_span]
start_level = 3
max_attempts = 2
display_base_ms = 2000
display_per_digit_ms = 500

[audio_recall]
total_rounds = 3
speech_rate = 0.9
warm_up_ms = 1500
grace_ms = 2000
ceiling_ms = 10000
correct_threshold = 70.0

[stroop]
total_trials = 15

[memory_recall]
words_to_display = 10
memorize_ms = 10000
distraction_ms = 5000

[trail_making]
circles = 12
min_distance_pct = 12.0
position_range_pct = [5.0, 85.0]
target_secs = 25.0
penalty_per_sec = 2.0
penalty_per_error = 10.0
"#;
