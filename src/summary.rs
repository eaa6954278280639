//! Reduction of a prediction array into counts and per-row results.

use crate::error::{PipelineError, Result};
use crate::types::prediction::{Classification, PredictionResult, RunSummary, SUSPICIOUS_LABEL};

/// Count suspicious labels.
pub fn summarize(prediction: &PredictionResult) -> RunSummary {
    RunSummary {
        suspicious_count: prediction
            .labels
            .iter()
            .filter(|&&label| label == SUSPICIOUS_LABEL)
            .count(),
        total_count: prediction.labels.len(),
    }
}

/// Pair each prediction with the source line of the row it was made for.
///
/// `lines[i]` is the input line of batch row `i`. Lengths must match.
pub fn classify(lines: &[usize], prediction: &PredictionResult) -> Result<Vec<Classification>> {
    if lines.len() != prediction.labels.len() {
        return Err(PipelineError::Mapping {
            expected: lines.len(),
            actual: prediction.labels.len(),
        });
    }

    Ok(lines
        .iter()
        .zip(&prediction.labels)
        .enumerate()
        .map(|(row, (&line, &label))| Classification {
            row,
            line,
            label,
            suspicious: label == SUSPICIOUS_LABEL,
            score: prediction.score(row),
        })
        .collect())
}
