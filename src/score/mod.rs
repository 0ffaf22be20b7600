//! Sentiment scorer: attaches a label and confidence scores to every
//! canonical record.
//!
//! The stage depends only on the [`SentimentBackend`] capability; which
//! backend runs is a configuration choice. A successful run always emits
//! exactly one scored row per canonical row.

mod http;
mod lexicon;
mod remote;

pub use http::{BasicClient, HttpClient};
pub use lexicon::LexiconBackend;
pub use remote::RemoteBackend;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ScoreConfig;
use crate::dataset;
use crate::error::PipelineError;
use crate::records::{CanonicalRecord, DocumentScore, ScoredRecord};

/// A scoring backend: one result per input text, in input order.
#[async_trait]
pub trait SentimentBackend: Send + Sync {
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<DocumentScore>, PipelineError>;
}

/// Attaches backend results to records strictly in submission order.
///
/// Under the backend contract both sides have equal length; if they ever
/// diverge, the pairing truncates to the shorter side rather than
/// indexing out of range, and the divergence is logged.
pub fn attach_scores(
    records: Vec<CanonicalRecord>,
    scores: Vec<DocumentScore>,
) -> Vec<ScoredRecord> {
    if records.len() != scores.len() {
        warn!(
            records = records.len(),
            scores = scores.len(),
            "Backend result count diverged from record count; truncating to the shorter side"
        );
    }

    records
        .into_iter()
        .zip(scores)
        .map(|(record, score)| ScoredRecord { record, score })
        .collect()
}

/// Runs the scorer stage against the configured backend.
#[tracing::instrument(skip(cfg, backend), fields(input = %cfg.input.display()))]
pub async fn run(
    cfg: &ScoreConfig,
    backend: &dyn SentimentBackend,
) -> Result<usize, PipelineError> {
    if !cfg.input.is_file() {
        return Err(PipelineError::Configuration(format!(
            "missing canonical dataset {}; run the normalize stage first",
            cfg.input.display()
        )));
    }

    let records = dataset::read_canonical(&cfg.input)?;
    let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();

    let scores = backend.score_batch(&texts).await?;
    let scored = attach_scores(records, scores);

    dataset::ensure_parent_dir(&cfg.output)?;
    dataset::write_scored(&cfg.output, &scored)?;

    let unknown = scored
        .iter()
        .filter(|r| r.score.sentiment == crate::records::Sentiment::Unknown)
        .count();
    info!(
        rows = scored.len(),
        unknown,
        output = %cfg.output.display(),
        "Scored dataset written"
    );
    Ok(scored.len())
}
