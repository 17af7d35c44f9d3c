//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cogtest() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("cogtest").unwrap()
}

#[test]
fn help_output() {
    cogtest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cognitive test battery"))
        .stdout(predicate::str::contains("go-no-go"))
        .stdout(predicate::str::contains("digit-span"))
        .stdout(predicate::str::contains("stroop"))
        .stdout(predicate::str::contains("memory-recall"))
        .stdout(predicate::str::contains("trail-making"));
}

#[test]
fn version_output() {
    cogtest()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cogtest"));
}

#[test]
fn offline_similarity() {
    cogtest()
        .arg("similarity")
        .arg("--original")
        .arg("one two three four five")
        .arg("--spoken")
        .arg("one two three")
        .arg("--offline")
        .assert()
        .success()
        .stdout(predicate::str::contains("Similarity: 60.0%"))
        .stdout(predicate::str::contains("offline"))
        .stdout(predicate::str::contains("incorrect"));
}

#[test]
fn similarity_falls_back_when_service_is_down() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cogtest.toml");
    std::fs::write(
        &config,
        "[scoring]\ntype = \"http\"\nbase_url = \"http://127.0.0.1:9\"\ntimeout_secs = 2\n",
    )
    .unwrap();

    cogtest()
        .env_remove("COGTEST_SCORING_URL")
        .arg("similarity")
        .arg("--original")
        .arg("The cat sat on the mat.")
        .arg("--spoken")
        .arg("the cat sat on the mat.")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Similarity: 100.0%"))
        .stdout(predicate::str::contains("local fallback"))
        .stdout(predicate::str::contains("correct"));
}

#[test]
fn init_creates_config() {
    let dir = TempDir::new().unwrap();

    cogtest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created cogtest.toml"));

    let content = std::fs::read_to_string(dir.path().join("cogtest.toml")).unwrap();
    assert!(content.contains("[scoring]"));
    assert!(content.contains("[audio_recall]"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    cogtest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    cogtest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_config_is_loadable() {
    let dir = TempDir::new().unwrap();

    cogtest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    cogtest()
        .current_dir(dir.path())
        .env_remove("COGTEST_SCORING_URL")
        .arg("similarity")
        .arg("--original")
        .arg("a b")
        .arg("--spoken")
        .arg("a b")
        .arg("--config")
        .arg(dir.path().join("cogtest.toml"))
        .assert()
        .success();
}

#[test]
fn summary_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("battery.json");
    std::fs::write(&path, sample_report()).unwrap();

    cogtest()
        .arg("summary")
        .arg("--report")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Digit Span"))
        .stdout(predicate::str::contains("Memory"))
        .stdout(predicate::str::contains("Audio Recall"))
        .stdout(predicate::str::contains("Category"))
        .stdout(predicate::str::contains("88%"))
        .stdout(predicate::str::contains("Overall: 87.5% (Good)"))
        .stdout(predicate::str::contains(
            "Excellent cognitive function across all domains.",
        ));
}

#[test]
fn summary_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("battery.json");
    std::fs::write(&path, sample_report()).unwrap();

    let output = cogtest()
        .arg("summary")
        .arg("--report")
        .arg(&path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["overall_tier"], "good");
    assert_eq!(summary["tests"].as_array().unwrap().len(), 2);
    assert_eq!(summary["tests"][0]["name"], "Digit Span");
    assert_eq!(summary["tests"][0]["category"], "memory");
    assert_eq!(summary["categories"]["memory"], 87.5);
    assert!(summary["categories"].get("attention").is_none());
}

#[test]
fn summary_missing_report() {
    cogtest()
        .arg("summary")
        .arg("--report")
        .arg("no_such_report.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn digit_span_without_input_fails() {
    cogtest()
        .arg("digit-span")
        .arg("--seed")
        .arg("1")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn go_no_go_single_trial_writes_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("battery.json");

    // no responses: the trial times out on its own
    cogtest()
        .current_dir(dir.path())
        .arg("go-no-go")
        .arg("--trials")
        .arg("1")
        .arg("--seed")
        .arg("3")
        .arg("--report")
        .arg(&path)
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Trial 1/1"))
        .stdout(predicate::str::contains("Report updated"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["go_no_go"]["trials"].as_array().unwrap().len(), 1);
}

/// Report with digit span 12/16 and audio recall 3/3.
fn sample_report() -> String {
    r#"{
    "id": "00000000-0000-0000-0000-000000000000",
    "created_at": "2025-01-01T00:00:00Z",
    "digit_span": {
        "forward_score": 8,
        "backward_score": 4
    },
    "audio_recall": {
        "correct_round_count": 3,
        "total_rounds": 3,
        "details": {
            "average_score": 91.0,
            "round_results": []
        }
    }
}"#
    .to_string()
}

#[test]
#[allow(deprecated)]
fn go_no_go_exits_while_stdin_stays_open() {
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    let dir = TempDir::new().unwrap();
    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("cogtest"))
        .current_dir(dir.path())
        .args(["go-no-go", "--trials", "1", "--seed", "1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // keep the write end open for the whole run
    let _stdin = child.stdin.take();

    let deadline = Instant::now() + Duration::from_secs(30);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break Some(status);
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            break None;
        }
        std::thread::sleep(Duration::from_millis(100));
    };
    assert!(
        status.is_some_and(|s| s.success()),
        "cogtest did not exit on its own"
    );
}

#[test]
fn trail_making_in_order_writes_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("battery.json");
    let config = dir.path().join("cogtest.toml");
    std::fs::write(&config, "[trail_making]\ncircles = 4\n").unwrap();

    cogtest()
        .current_dir(dir.path())
        .arg("trail-making")
        .arg("--seed")
        .arg("2")
        .arg("--report")
        .arg(&path)
        .arg("--config")
        .arg(&config)
        .env_remove("COGTEST_SCORING_URL")
        .write_stdin("1\n3\nabc\n2\n3\n4\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("3 is wrong, looking for 2"))
        .stdout(predicate::str::contains("with 1 error(s). Score: 90/100"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["trail_making"]["errors"], 1);
}

#[test]
fn stroop_with_closed_stdin_fails() {
    cogtest()
        .arg("stroop")
        .arg("--seed")
        .arg("1")
        .arg("--trials")
        .arg("2")
        .write_stdin("purple\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("stroop session failed"));
}
