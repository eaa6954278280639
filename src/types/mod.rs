//! Type definitions for the screening pipeline

pub mod prediction;
pub mod transaction;

pub use prediction::{Classification, PredictionResult, RunSummary};
pub use transaction::TransactionRecord;
