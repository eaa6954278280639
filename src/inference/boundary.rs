//! Transport to the inference server.
//!
//! [`InferenceBoundary`] only moves bytes: it returns whatever status and
//! body the server produced. Interpreting them is the client's job.

use crate::config::InferenceConfig;
use crate::error::{PipelineError, Result};
use crate::inference::protocol::InferRequest;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Raw HTTP outcome of a call to the inference server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryResponse {
    pub status: u16,
    pub body: String,
}

impl BoundaryResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Inference server endpoint.
///
/// Errors are reserved for calls that produced no response at all and are
/// reported as [`PipelineError::Transport`].
#[async_trait]
pub trait InferenceBoundary: Send + Sync {
    /// Submit an inference request.
    async fn infer(&self, request: &InferRequest) -> Result<BoundaryResponse>;

    /// Query the server's readiness endpoint.
    async fn ready(&self) -> Result<BoundaryResponse>;
}

/// KServe v2 HTTP endpoint (Triton and compatible servers).
#[derive(Debug, Clone)]
pub struct HttpBoundary {
    client: reqwest::Client,
    infer_url: String,
    health_url: String,
}

impl HttpBoundary {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            infer_url: config.infer_url(),
            health_url: config.health_url(),
        })
    }

    pub fn infer_url(&self) -> &str {
        &self.infer_url
    }

    async fn read(response: reqwest::Response) -> Result<BoundaryResponse> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Transport(format!("failed to read response body: {e}")))?;
        Ok(BoundaryResponse { status, body })
    }
}

#[async_trait]
impl InferenceBoundary for HttpBoundary {
    async fn infer(&self, request: &InferRequest) -> Result<BoundaryResponse> {
        debug!(url = %self.infer_url, rows = request.row_count(), "Sending inference request");

        let response = self
            .client
            .post(&self.infer_url)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        Self::read(response).await
    }

    async fn ready(&self) -> Result<BoundaryResponse> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let ok = BoundaryResponse {
            status: 200,
            body: String::new(),
        };
        let not_found = BoundaryResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!not_found.is_success());
    }

    #[test]
    fn test_http_boundary_uses_configured_model() {
        let config = InferenceConfig {
            model_name: "aml_xgb".to_string(),
            ..InferenceConfig::default()
        };
        let boundary = HttpBoundary::new(&config).unwrap();
        assert_eq!(
            boundary.infer_url(),
            "http://localhost:8000/v2/models/aml_xgb/infer"
        );
    }
}
