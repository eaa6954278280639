//! Batch inference client.
//!
//! One batch in, one [`PredictionResult`] out, or an error. No retries: the
//! caller decides whether to run again. Dropping the returned future cancels
//! the call and nothing is produced.

use crate::batch::Batch;
use crate::config::InferenceConfig;
use crate::error::{PipelineError, Result};
use crate::inference::boundary::{HttpBoundary, InferenceBoundary};
use crate::inference::protocol::{parse_response, InferRequest};
use crate::types::prediction::PredictionResult;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Readiness of the inference server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    Ready,
    NotReady { status_code: u16 },
    Unreachable { message: String },
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, HealthStatus::Ready)
    }
}

/// Client for batch inference against an [`InferenceBoundary`].
pub struct InferenceClient<B = HttpBoundary> {
    boundary: B,
    input_name: String,
    parameters: Map<String, Value>,
}

impl InferenceClient<HttpBoundary> {
    /// Create an HTTP client from configuration
    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        let boundary = HttpBoundary::new(config)?;
        info!(
            url = %boundary.infer_url(),
            input = %config.input_name,
            "Inference client initialized"
        );
        Ok(Self::new(boundary, &config.input_name).with_parameters(config.parameters.clone()))
    }
}

impl<B: InferenceBoundary> InferenceClient<B> {
    pub fn new(boundary: B, input_name: &str) -> Self {
        Self {
            boundary,
            input_name: input_name.to_string(),
            parameters: Map::new(),
        }
    }

    /// Parameters sent with every request
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Submit a batch and map the response to one label per row.
    ///
    /// An empty batch is answered locally with an empty result.
    pub async fn predict(&self, batch: Batch) -> Result<PredictionResult> {
        let expected = batch.count();
        if expected == 0 {
            debug!("Empty batch, skipping inference call");
            return Ok(PredictionResult {
                labels: Vec::new(),
                scores: None,
                raw: Value::Null,
            });
        }

        let request = InferRequest::from_batch(batch, &self.input_name, self.parameters.clone());
        let start = Instant::now();
        let response = self.boundary.infer(&request).await?;

        if !response.is_success() {
            warn!(
                status = response.status,
                rows = expected,
                "Inference server rejected batch"
            );
            return Err(PipelineError::Inference {
                status_code: response.status,
                raw_body: response.body,
            });
        }

        let result = parse_response(&response.body, expected)?;

        debug!(
            rows = expected,
            latency_ms = start.elapsed().as_millis() as u64,
            "Batch inference complete"
        );

        Ok(result)
    }

    /// Query readiness. Never fails; an unreachable server is a status.
    pub async fn health(&self) -> HealthStatus {
        match self.boundary.ready().await {
            Ok(response) if response.is_success() => HealthStatus::Ready,
            Ok(response) => HealthStatus::NotReady {
                status_code: response.status,
            },
            Err(e) => HealthStatus::Unreachable {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchAssembler;
    use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
    use crate::inference::boundary::BoundaryResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Boundary that replays a canned response and records requests
    struct Scripted {
        response: std::result::Result<BoundaryResponse, String>,
        seen: Mutex<Vec<InferRequest>>,
    }

    impl Scripted {
        fn answering(status: u16, body: &str) -> Self {
            Self {
                response: Ok(BoundaryResponse {
                    status,
                    body: body.to_string(),
                }),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn reply(&self) -> Result<BoundaryResponse> {
            self.response
                .clone()
                .map_err(PipelineError::Transport)
        }
    }

    #[async_trait]
    impl InferenceBoundary for Scripted {
        async fn infer(&self, request: &InferRequest) -> Result<BoundaryResponse> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply()
        }

        async fn ready(&self) -> Result<BoundaryResponse> {
            self.reply()
        }
    }

    fn batch(rows: usize) -> Batch {
        let vectors: Vec<FeatureVector> = (0..rows).map(|i| [i as f32; FEATURE_COUNT]).collect();
        BatchAssembler::new(100).assemble(&vectors)
    }

    #[tokio::test]
    async fn test_predict_success() {
        let client = InferenceClient::new(
            Scripted::answering(200, r#"{"prediction": [1, 0, 1, 1, 0]}"#),
            "input__0",
        );
        let result = client.predict(batch(5)).await.unwrap();
        assert_eq!(result.labels, vec![1, 0, 1, 1, 0]);

        let seen = client.boundary.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].inputs[0].name, "input__0");
        assert_eq!(seen[0].inputs[0].shape, vec![5, FEATURE_COUNT]);
        assert_eq!(seen[0].inputs[0].data.len(), 5 * FEATURE_COUNT);
    }

    #[tokio::test]
    async fn test_server_error_is_inference_error() {
        let client = InferenceClient::new(Scripted::answering(500, "model not loaded"), "input__0");
        let err = client.predict(batch(2)).await.unwrap_err();

        match err {
            PipelineError::Inference {
                status_code,
                raw_body,
            } => {
                assert_eq!(status_code, 500);
                assert_eq!(raw_body, "model not loaded");
            }
            other => panic!("expected inference error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_is_mapping_error() {
        let client =
            InferenceClient::new(Scripted::answering(200, r#"{"prediction": [1]}"#), "input__0");
        let err = client.predict(batch(3)).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Mapping {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_call() {
        let client = InferenceClient::new(Scripted::failing("should not be called"), "input__0");
        let result = client.predict(batch(0)).await.unwrap();
        assert!(result.is_empty());
        assert!(client.boundary.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parameters_are_forwarded() {
        let mut params = Map::new();
        params.insert("threshold".to_string(), Value::from(0.4));
        let client =
            InferenceClient::new(Scripted::answering(200, r#"{"prediction": [0]}"#), "x")
                .with_parameters(params);
        client.predict(batch(1)).await.unwrap();

        let seen = client.boundary.seen.lock().unwrap();
        assert_eq!(seen[0].parameters["threshold"], 0.4);
    }

    #[tokio::test]
    async fn test_health() {
        let ready = InferenceClient::new(Scripted::answering(200, ""), "x");
        assert_eq!(ready.health().await, HealthStatus::Ready);

        let loading = InferenceClient::new(Scripted::answering(503, ""), "x");
        assert_eq!(
            loading.health().await,
            HealthStatus::NotReady { status_code: 503 }
        );

        let down = InferenceClient::new(Scripted::failing("connection refused"), "x");
        let status = down.health().await;
        assert!(!status.is_ready());
        assert!(matches!(status, HealthStatus::Unreachable { .. }));
    }
}
