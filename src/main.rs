//! CLI entry point for the mention rater pipeline.
//!
//! Provides one subcommand per batch stage (normalize, score, aggregate)
//! plus `run` for the whole sequence. Each stage reads the previous
//! stage's durable output and writes its own.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use mention_rater::config::{
    AggregateConfig, NormalizeConfig, RemoteScoringConfig, ScoreConfig,
};
use mention_rater::score::{BasicClient, LexiconBackend, RemoteBackend, SentimentBackend};
use mention_rater::{aggregate, normalize, score};

#[derive(Parser)]
#[command(name = "mention_rater")]
#[command(about = "Normalize, score, and aggregate public-agency mentions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Deterministic in-process lexicon scoring
    Local,
    /// Batched calls to the remote scoring service
    Remote,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge raw source partitions into the canonical mention dataset
    Normalize {
        /// Directory of raw CSV partitions, one per source connector
        #[arg(short, long, default_value = "data/raw")]
        raw_dir: PathBuf,

        /// Canonical dataset to write
        #[arg(short, long, default_value = "data/interim/mentions_clean.csv")]
        output: PathBuf,

        /// Minimum trimmed text length to keep a record
        #[arg(long, default_value_t = 15)]
        min_text_len: usize,
    },
    /// Attach sentiment labels and confidence scores to every record
    Score {
        /// Canonical dataset to read
        #[arg(short, long, default_value = "data/interim/mentions_clean.csv")]
        input: PathBuf,

        /// Scored dataset to write
        #[arg(short, long, default_value = "data/processed/mentions_scored.csv")]
        output: PathBuf,

        /// Scoring backend to use
        #[arg(short, long, value_enum, default_value = "local")]
        backend: BackendKind,

        /// Documents per remote call
        #[arg(long, default_value_t = 10)]
        batch_size: usize,
    },
    /// Roll the scored dataset into per-category monthly aggregates
    Aggregate {
        /// Scored dataset to read
        #[arg(short, long, default_value = "data/processed/mentions_scored.csv")]
        input: PathBuf,

        /// Aggregate table to write
        #[arg(
            short,
            long,
            default_value = "data/processed/exports/category_month_sentiment.csv"
        )]
        output: PathBuf,
    },
    /// Run normalize, score, and aggregate in sequence
    Run {
        /// Directory of raw CSV partitions, one per source connector
        #[arg(short, long, default_value = "data/raw")]
        raw_dir: PathBuf,

        /// Scoring backend to use
        #[arg(short, long, value_enum, default_value = "local")]
        backend: BackendKind,

        /// Documents per remote call
        #[arg(long, default_value_t = 10)]
        batch_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/mention_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("mention_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize {
            raw_dir,
            output,
            min_text_len,
        } => {
            let cfg = NormalizeConfig {
                raw_dir,
                output,
                min_text_len,
            };
            normalize::run(&cfg)?;
        }
        Commands::Score {
            input,
            output,
            backend,
            batch_size,
        } => {
            let cfg = ScoreConfig {
                input,
                output,
                batch_size,
            };
            let backend = build_backend(backend, batch_size)?;
            score::run(&cfg, backend.as_ref()).await?;
        }
        Commands::Aggregate { input, output } => {
            let cfg = AggregateConfig { input, output };
            aggregate::run(&cfg)?;
        }
        Commands::Run {
            raw_dir,
            backend,
            batch_size,
        } => {
            let normalize_cfg = NormalizeConfig {
                raw_dir,
                ..NormalizeConfig::default()
            };
            let score_cfg = ScoreConfig {
                batch_size,
                ..ScoreConfig::default()
            };
            let aggregate_cfg = AggregateConfig::default();

            let backend = build_backend(backend, batch_size)?;

            normalize::run(&normalize_cfg)?;
            score::run(&score_cfg, backend.as_ref()).await?;
            aggregate::run(&aggregate_cfg)?;
        }
    }

    Ok(())
}

/// Builds the configured scoring backend. The remote backend needs its
/// endpoint and key in the environment before the stage starts.
fn build_backend(kind: BackendKind, batch_size: usize) -> Result<Box<dyn SentimentBackend>> {
    match kind {
        BackendKind::Local => Ok(Box::new(LexiconBackend)),
        BackendKind::Remote => {
            let cfg = RemoteScoringConfig::from_env()?;
            let client = BasicClient::new(cfg.timeout)?;
            Ok(Box::new(RemoteBackend::new(client, &cfg, batch_size)?))
        }
    }
}
