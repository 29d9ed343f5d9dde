// novin/src/main.rs
//
// novin — on-device security-event risk assessment CLI.
//
// Reads newline-delimited request JSON from stdin (or --file), writes one
// result JSON per line to stdout. Errors go to stderr with the offending
// input echoed, and never stop the stream.
//
// Usage:
//   novin                                  # assess stdin line by line
//   novin --file requests.jsonl
//   novin --file requests.jsonl --pi       # alternate sorted-key output
//   novin --state-dir /var/lib/novin      # persist audit trail + patterns

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use novin::{NovinSdk, SdkConfig, SdkMode};

#[derive(Parser)]
#[command(
    name    = "novin",
    about   = "On-device security-event risk assessment",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, help = "Read requests from this file instead of stdin")]
    file: Option<PathBuf>,

    #[arg(long, help = "Directory for persisted audit trail and user patterns")]
    state_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "full")]
    mode: Mode,

    #[arg(long, help = "Emit the alternate sorted-key (PI) serialization")]
    pi: bool,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    Full,
    Degraded,
    Minimal,
    Emergency,
}

impl From<Mode> for SdkMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Full      => SdkMode::Full,
            Mode::Degraded  => SdkMode::Degraded,
            Mode::Minimal   => SdkMode::Minimal,
            Mode::Emergency => SdkMode::Emergency,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("novin=info".parse().expect("static directive")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = SdkConfig {
        mode: cli.mode.clone().into(),
        state_dir: cli.state_dir.clone(),
        ..Default::default()
    };

    let sdk = match NovinSdk::initialize(config) {
        Ok(sdk) => sdk,
        Err(e) => {
            eprintln!("initialization failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&sdk, &cli).await {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(sdk: &NovinSdk, cli: &Cli) -> Result<()> {
    match &cli.file {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            let mut lines = BufReader::new(file).lines();
            while let Some(line) = lines.next_line().await? {
                assess_line(sdk, &line, cli.pi).await;
            }
        }
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                assess_line(sdk, &line, cli.pi).await;
            }
        }
    }
    debug!("stream ended; {} assessments recorded", sdk.get_health().total_assessments);
    Ok(())
}

async fn assess_line(sdk: &NovinSdk, line: &str, pi: bool) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match sdk.assess(line).await {
        Ok(assessment) => {
            let out = if pi {
                assessment.to_pi(&sdk.mode().to_string())
            } else {
                serde_json::to_string(&assessment).unwrap_or_else(|e| {
                    format!("{{\"error\":\"internal\",\"detail\":\"{e}\"}}")
                })
            };
            println!("{out}");
        }
        Err(e) => {
            eprintln!("{{\"error\":\"{}\",\"detail\":\"{}\",\"input\":{}}}",
                e.code(),
                e,
                serde_json::to_string(line).unwrap_or_else(|_| "\"\"".into()),
            );
        }
    }
}
