//! cogtest CLI — run the cognitive test engines from a terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cogtest", version, about = "Cognitive test battery in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Go/No-Go reaction-time task (press Enter to respond)
    GoNoGo {
        /// Number of trials (overrides the config)
        #[arg(long)]
        trials: Option<usize>,

        /// Seed for a reproducible stimulus sequence
        #[arg(long)]
        seed: Option<u64>,

        /// Merge the result into this battery report JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the forward and backward digit span test
    DigitSpan {
        /// Seed for reproducible sequences
        #[arg(long)]
        seed: Option<u64>,

        /// Merge the result into this battery report JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the Stroop color-word test (type the ink color)
    Stroop {
        /// Number of trials (overrides the config)
        #[arg(long)]
        trials: Option<usize>,

        /// Seed for reproducible trials
        #[arg(long)]
        seed: Option<u64>,

        /// Merge the result into this battery report JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the word list memory recall test
    MemoryRecall {
        /// Seed for a reproducible word list
        #[arg(long)]
        seed: Option<u64>,

        /// Merge the result into this battery report JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the trail making test (pick the numbers in order)
    TrailMaking {
        /// Seed for a reproducible layout
        #[arg(long)]
        seed: Option<u64>,

        /// Merge the result into this battery report JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Score a spoken repetition against the original sentence
    Similarity {
        /// The sentence that was played
        #[arg(long)]
        original: String,

        /// What the participant said
        #[arg(long)]
        spoken: String,

        /// Skip the scoring service and use the local fallback
        #[arg(long)]
        offline: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Summarize a battery report
    Summary {
        /// Battery report JSON
        #[arg(long)]
        report: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create a starter cogtest.toml
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cogtest=info".parse().expect("static directive")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::GoNoGo {
            trials,
            seed,
            report,
            config,
        } => commands::go_no_go::execute(trials, seed, report, config).await,
        Commands::DigitSpan {
            seed,
            report,
            config,
        } => commands::digit_span::execute(seed, report, config).await,
        Commands::Stroop {
            trials,
            seed,
            report,
            config,
        } => commands::stroop::execute(trials, seed, report, config).await,
        Commands::MemoryRecall {
            seed,
            report,
            config,
        } => commands::memory_recall::execute(seed, report, config).await,
        Commands::TrailMaking {
            seed,
            report,
            config,
        } => commands::trail_making::execute(seed, report, config).await,
        Commands::Similarity {
            original,
            spoken,
            offline,
            config,
        } => commands::similarity::execute(original, spoken, offline, config).await,
        Commands::Summary { report, format } => commands::summary::execute(report, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
