//! Row types flowing between the pipeline stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed sentiment label set.
///
/// Provider labels outside the set (a service may report e.g. "mixed")
/// collapse to [`Sentiment::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    #[serde(other)]
    Unknown,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
            Sentiment::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "positive" => Sentiment::Positive,
            "neutral" => Sentiment::Neutral,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Unknown,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend result: a label plus the three confidence scores, all in
/// `[0, 1]`. A provider-side document error is represented as
/// `unknown` with all scores zeroed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentScore {
    pub sentiment: Sentiment,
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
}

impl DocumentScore {
    /// The score attached to a document the provider could not score.
    pub fn unknown() -> Self {
        Self {
            sentiment: Sentiment::Unknown,
            pos: 0.0,
            neu: 0.0,
            neg: 0.0,
        }
    }
}

/// The unit of work after schema normalization.
///
/// Identity is full equality across every field; the canonical dataset
/// never holds two equal records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalRecord {
    /// Trimmed, at least `min_text_len` characters.
    pub text: String,
    /// Program/topic label; `"Unknown"` when the source had none.
    pub category: String,
    /// Absent or unparseable source dates are kept as `None`.
    pub date: Option<NaiveDate>,
    /// Passthrough source columns, keyed by normalized column name.
    /// Sorted keys keep dataset serialization deterministic.
    pub extra: BTreeMap<String, String>,
}

/// A canonical record with its sentiment attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: CanonicalRecord,
    pub score: DocumentScore,
}

/// One output row of the aggregator: per (category, month) means and count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub category: String,
    /// First day of the calendar month; `None` is the bucket for records
    /// without a date.
    pub month: Option<NaiveDate>,
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for s in [
            Sentiment::Positive,
            Sentiment::Neutral,
            Sentiment::Negative,
            Sentiment::Unknown,
        ] {
            assert_eq!(Sentiment::from_label(s.as_str()), s);
        }
    }

    #[test]
    fn test_unrecognized_label_collapses_to_unknown() {
        assert_eq!(Sentiment::from_label("mixed"), Sentiment::Unknown);
        assert_eq!(Sentiment::from_label(""), Sentiment::Unknown);

        let parsed: Sentiment = serde_json::from_str("\"mixed\"").unwrap();
        assert_eq!(parsed, Sentiment::Unknown);
    }

    #[test]
    fn test_unknown_score_is_zeroed() {
        let score = DocumentScore::unknown();
        assert_eq!(score.sentiment, Sentiment::Unknown);
        assert_eq!(score.pos, 0.0);
        assert_eq!(score.neu, 0.0);
        assert_eq!(score.neg, 0.0);
    }
}
