//! Error taxonomy for the pipeline stages.

use thiserror::Error;

/// Fatal errors a pipeline stage can abort with.
///
/// Per-document scoring failures are not errors: they are recorded in the
/// data as an `unknown` sentiment with zeroed confidence scores.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required input dataset or credential is missing before the stage
    /// starts. The message names the prerequisite to re-run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The normalizer cannot resolve a text-bearing column from the merged
    /// raw partitions.
    #[error("schema error: {0}")]
    Schema(String),

    /// A remote scoring call failed at the call level (network, auth,
    /// non-2xx status, malformed response). No scored output is written.
    #[error("scoring service error: {0}")]
    ScoringService(String),

    /// A persisted dataset contains a cell that cannot be interpreted.
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
