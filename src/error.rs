//! Error taxonomy for the screening pipeline.
//!
//! Field-level parse failures inside a record are not errors; they degrade
//! to defaults (see [`crate::feature_extractor::Degradation`]). Everything in
//! here aborts the current run.

use thiserror::Error;

/// Failure to turn raw input into transaction records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input contained no header line at all
    #[error("input has no header line")]
    MissingHeader,
    /// Input bytes were not valid UTF-8
    #[error("input is not valid UTF-8: {0}")]
    Encoding(String),
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to parse transactions: {0}")]
    Parse(#[from] ParseError),

    /// The inference server answered with a non-success status
    #[error("inference server returned HTTP {status_code}: {raw_body}")]
    Inference { status_code: u16, raw_body: String },

    /// The response body did not carry a usable prediction array
    #[error("unexpected inference response shape: {0}")]
    ResponseShape(String),

    /// Prediction count does not match the number of submitted rows
    #[error("prediction count mismatch: submitted {expected} rows, received {actual} predictions")]
    Mapping { expected: usize, actual: usize },

    /// The request never produced a response (connection refused, timeout, ...)
    #[error("inference transport failed: {0}")]
    Transport(String),
}

impl PipelineError {
    /// Short stable name of the error kind, used for metrics and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Parse(_) => "parse",
            PipelineError::Inference { .. } => "inference",
            PipelineError::ResponseShape(_) => "response_shape",
            PipelineError::Mapping { .. } => "mapping",
            PipelineError::Transport(_) => "transport",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
