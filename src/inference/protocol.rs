//! Request and response shapes for the inference server (KServe v2 JSON).

use crate::batch::Batch;
use crate::error::{PipelineError, Result};
use crate::types::prediction::PredictionResult;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Tensor datatype for feature batches.
pub const DATATYPE_FP32: &str = "FP32";

/// Response fields that may carry per-row auxiliary scores, checked in order.
const SCORE_FIELDS: [&str; 2] = ["probabilities", "scores"];

/// One named input tensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferInput {
    pub name: String,
    pub shape: Vec<usize>,
    pub datatype: String,
    pub data: Vec<f32>,
}

/// Body of `POST /v2/models/{model}/infer`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferRequest {
    pub inputs: Vec<InferInput>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl InferRequest {
    /// Wrap a batch as a single FP32 input tensor. Consumes the batch.
    pub fn from_batch(batch: Batch, input_name: &str, parameters: Map<String, Value>) -> Self {
        let (data, shape) = batch.into_parts();
        Self {
            inputs: vec![InferInput {
                name: input_name.to_string(),
                shape: shape.to_vec(),
                datatype: DATATYPE_FP32.to_string(),
                data,
            }],
            parameters,
        }
    }

    /// Row count of the first input tensor.
    pub fn row_count(&self) -> usize {
        self.inputs
            .first()
            .and_then(|input| input.shape.first().copied())
            .unwrap_or(0)
    }
}

/// Parse a success response body into predictions for `expected` rows.
///
/// The body must be a JSON object with a `prediction` array of 0/1 labels
/// (integers, or floats with no fractional part). A label count other than
/// `expected` is a mapping error.
pub fn parse_response(body: &str, expected: usize) -> Result<PredictionResult> {
    let raw: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::ResponseShape(format!("body is not valid JSON: {e}")))?;

    let predictions = raw
        .get("prediction")
        .ok_or_else(|| PipelineError::ResponseShape("missing `prediction` field".to_string()))?
        .as_array()
        .ok_or_else(|| PipelineError::ResponseShape("`prediction` is not an array".to_string()))?;

    let labels = predictions
        .iter()
        .enumerate()
        .map(|(i, v)| {
            label(v).ok_or_else(|| {
                PipelineError::ResponseShape(format!("prediction[{i}] is not a 0/1 label: {v}"))
            })
        })
        .collect::<Result<Vec<i64>>>()?;

    if labels.len() != expected {
        return Err(PipelineError::Mapping {
            expected,
            actual: labels.len(),
        });
    }

    let scores = auxiliary_scores(&raw, expected);

    Ok(PredictionResult {
        labels,
        scores,
        raw,
    })
}

fn label(value: &Value) -> Option<i64> {
    let n = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })?;
    matches!(n, 0 | 1).then_some(n)
}

fn auxiliary_scores(raw: &Value, expected: usize) -> Option<Vec<f64>> {
    for field in SCORE_FIELDS {
        let Some(values) = raw.get(field).and_then(Value::as_array) else {
            continue;
        };
        let scores: Option<Vec<f64>> = values.iter().map(Value::as_f64).collect();
        match scores {
            Some(scores) if scores.len() == expected => return Some(scores),
            _ => warn!(
                field = field,
                expected = expected,
                "Ignoring malformed auxiliary scores"
            ),
        }
    }
    None
}
