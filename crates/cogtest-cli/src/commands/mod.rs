pub mod digit_span;
pub mod go_no_go;
pub mod init;
pub mod memory_recall;
pub mod similarity;
pub mod stroop;
pub mod summary;
pub mod trail_making;

use std::fmt::Display;
use std::io::BufRead;
use std::str::FromStr;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

/// Seeded RNG when a seed is given, OS-seeded otherwise.
pub fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Forward stdin lines into a channel until EOF or until the receiver is
/// dropped.
///
/// Reads on a plain thread: a blocked stdin read must not keep the runtime
/// from shutting down once the session is over.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), tx));
    rx
}

fn forward_lines(reader: impl BufRead, tx: mpsc::Sender<String>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("failed to read stdin: {e}");
                break;
            }
        }
    }
}

/// Map each line into a typed input message on a new channel.
pub fn map_lines<T: Send + 'static>(
    mut lines: mpsc::Receiver<String>,
    f: impl Fn(String) -> T + Send + 'static,
) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if tx.send(f(line)).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Parse each line as a `T`. Lines that do not parse are reported on stdout
/// and skipped.
pub fn parse_lines<T>(mut lines: mpsc::Receiver<String>) -> mpsc::Receiver<T>
where
    T: FromStr + Send + 'static,
    T::Err: Display + Send,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            match line.trim().parse::<T>() {
                Ok(value) => {
                    if tx.send(value).await.is_err() {
                        break;
                    }
                }
                Err(e) => println!("  ({e})"),
            }
        }
    });
    rx
}

/// Shared `--report` handling: load or create, apply, save.
pub fn merge_into_report(
    path: Option<&std::path::Path>,
    apply: impl FnOnce(&mut cogtest_core::report::BatteryReport),
) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let mut report = cogtest_core::report::BatteryReport::load_or_new(path)?;
    apply(&mut report);
    report.save_json(path)?;
    println!("Report updated: {}", path.display());
    Ok(())
}
