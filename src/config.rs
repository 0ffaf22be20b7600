//! Per-stage configuration.
//!
//! Every path, threshold, and batch size a stage needs travels in an
//! explicit config struct so stages can run against temporary directories
//! in tests. The `Default` impls encode the fixed dataset layout the CLI
//! exposes as argument defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::PipelineError;

/// Minimum trimmed text length a canonical record must have.
pub const MIN_TEXT_LEN: usize = 15;

/// Documents submitted per remote scoring call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Request timeout for remote scoring calls.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(60);

/// Schema-normalizer stage configuration.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Directory holding one raw CSV partition per source connector.
    pub raw_dir: PathBuf,
    /// Canonical dataset output path.
    pub output: PathBuf,
    pub min_text_len: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            output: PathBuf::from("data/interim/mentions_clean.csv"),
            min_text_len: MIN_TEXT_LEN,
        }
    }
}

/// Sentiment-scorer stage configuration.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Documents per remote call; the local backend ignores it.
    pub batch_size: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/interim/mentions_clean.csv"),
            output: PathBuf::from("data/processed/mentions_scored.csv"),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Aggregator stage configuration.
#[derive(Debug, Clone)]
pub struct AggregateConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/processed/mentions_scored.csv"),
            output: PathBuf::from("data/processed/exports/category_month_sentiment.csv"),
        }
    }
}

/// Credentials and endpoint for the remote scoring service.
#[derive(Debug, Clone)]
pub struct RemoteScoringConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl RemoteScoringConfig {
    /// Reads `SENTIMENT_API_ENDPOINT` and `SENTIMENT_API_KEY` from the
    /// environment.
    pub fn from_env() -> Result<Self, PipelineError> {
        let endpoint = required_env("SENTIMENT_API_ENDPOINT")?;
        let api_key = required_env("SENTIMENT_API_KEY")?;
        Ok(Self {
            endpoint,
            api_key,
            timeout: REMOTE_TIMEOUT,
        })
    }
}

fn required_env(name: &str) -> Result<String, PipelineError> {
    std::env::var(name).map_err(|_| {
        PipelineError::Configuration(format!(
            "{name} is not set; export it or add it to .env before using the remote backend"
        ))
    })
}
