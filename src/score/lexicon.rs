//! Local lexicon backend: deterministic, in-process, no network I/O.

use async_trait::async_trait;
use vader_sentiment::SentimentIntensityAnalyzer;

use super::SentimentBackend;
use crate::error::PipelineError;
use crate::records::{DocumentScore, Sentiment};

/// Compound-score cutoffs for the label.
const POSITIVE_THRESHOLD: f64 = 0.05;
const NEGATIVE_THRESHOLD: f64 = -0.05;

pub struct LexiconBackend;

impl LexiconBackend {
    fn score_one(analyzer: &SentimentIntensityAnalyzer, text: &str) -> DocumentScore {
        let scores = analyzer.polarity_scores(text);
        let get = |key: &str| scores.get(key).copied().unwrap_or(0.0);

        let compound = get("compound");
        let sentiment = if compound > POSITIVE_THRESHOLD {
            Sentiment::Positive
        } else if compound < NEGATIVE_THRESHOLD {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };

        DocumentScore {
            sentiment,
            pos: get("pos"),
            neu: get("neu"),
            neg: get("neg"),
        }
    }
}

#[async_trait]
impl SentimentBackend for LexiconBackend {
    /// Every text yields a real score; this backend has no failure mode
    /// per document or per call.
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<DocumentScore>, PipelineError> {
        let analyzer = SentimentIntensityAnalyzer::new();
        Ok(texts
            .iter()
            .map(|text| Self::score_one(&analyzer, text))
            .collect())
    }
}
