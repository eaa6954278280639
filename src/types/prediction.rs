//! Inference outputs and per-row classifications

use serde::Serialize;

/// Label value the model uses for a suspicious transaction.
pub const SUSPICIOUS_LABEL: i64 = 1;

/// Predictions for one batch, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// One label per submitted row
    pub labels: Vec<i64>,
    /// Auxiliary per-row scores, when the model returns them
    pub scores: Option<Vec<f64>>,
    /// Response body as returned by the server
    pub raw: serde_json::Value,
}

impl PredictionResult {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Score for a row, if scores were returned.
    pub fn score(&self, row: usize) -> Option<f64> {
        self.scores.as_ref().and_then(|s| s.get(row).copied())
    }
}

/// Result for a single transaction, mapped back from the prediction array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Position in the submitted batch
    pub row: usize,
    /// Source line in the input file
    pub line: usize,
    pub label: i64,
    pub suspicious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Counts reported for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub suspicious_count: usize,
    pub total_count: usize,
}

impl RunSummary {
    /// Fraction of analyzed rows flagged as suspicious (0.0 for an empty run).
    pub fn suspicious_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.suspicious_count as f64 / self.total_count as f64
        }
    }
}
