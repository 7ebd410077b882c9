//! Error taxonomy for the pipeline.
//!
//! Degenerate divisions (zero elapsed time, zero total amount, zero
//! prior-year count) are not errors: each metric applies a documented
//! fallback at the call site. An idempotent skip is likewise not an error;
//! stages return [`StageOutcome::Skipped`] instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required upstream artifact is absent. Names the path and the stage
    /// that produces it so the operator knows what to run first.
    #[error("missing input {path}: run the `{produced_by}` stage first")]
    MissingInput { path: PathBuf, produced_by: &'static str },

    /// A canonical column could not be resolved from the source layout.
    #[error("source column `{column}` not found in the {taxi_type} layout")]
    SchemaMismatch { column: String, taxi_type: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// How a stage invocation ended: either it did the work, or a completion
/// manifest for the same inputs already existed and the stage short-circuited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Ran,
    Skipped,
}
