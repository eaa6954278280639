//! AML Inference Pipeline Library
//!
//! Turns tabular transaction exports (IBM synthetic AML layout) into
//! fixed-length feature vectors, scores them in one batch against a remote
//! KServe v2 / Triton model, and maps the labels back to transactions.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod inference;
pub mod metrics;
pub mod pipeline;
pub mod record_parser;
pub mod summary;
pub mod types;

pub use batch::{Batch, BatchAssembler};
pub use config::AppConfig;
pub use error::{ParseError, PipelineError};
pub use feature_extractor::{FeatureExtractor, FeatureVector, FEATURE_COUNT};
pub use inference::{HealthStatus, InferenceClient};
pub use pipeline::{Pipeline, RunHistory, RunStage, RunState};
pub use types::{Classification, PredictionResult, RunSummary, TransactionRecord};
