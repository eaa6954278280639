//! Configuration management for the AML inference pipeline
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, `AML_`-prefixed environment variables (`AML_INFERENCE__URL`), and
//! finally the `TRITON_URL` / `MODEL_NAME` variables.

use crate::batch::DEFAULT_MAX_BATCH_SIZE;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub inference: InferenceConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Inference server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the inference server
    pub url: String,
    /// Model name as deployed on the server
    pub model_name: String,
    /// Name of the model's input tensor
    pub input_name: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Free-form parameters forwarded with every request
    pub parameters: Map<String, Value>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            model_name: "aml_model".to_string(),
            input_name: "input__0".to_string(),
            timeout_ms: 30_000,
            parameters: Map::new(),
        }
    }
}

impl InferenceConfig {
    /// `{url}/v2/models/{model_name}/infer`
    pub fn infer_url(&self) -> String {
        format!(
            "{}/v2/models/{}/infer",
            self.url.trim_end_matches('/'),
            self.model_name
        )
    }

    /// `{url}/v2/health/ready`
    pub fn health_url(&self) -> String {
        format!("{}/v2/health/ready", self.url.trim_end_matches('/'))
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of transactions sent in one inference call
    pub max_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path. The file may be absent.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("AML")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("inference.url", std::env::var("TRITON_URL").ok())?
            .set_override_option("inference.model_name", std::env::var("MODEL_NAME").ok())?
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.inference.url.trim().is_empty() {
            bail!("inference.url must not be empty");
        }
        if self.inference.model_name.trim().is_empty() {
            bail!("inference.model_name must not be empty");
        }
        if self.inference.input_name.trim().is_empty() {
            bail!("inference.input_name must not be empty");
        }
        if self.pipeline.max_batch_size == 0 {
            bail!("pipeline.max_batch_size must be at least 1");
        }
        Ok(())
    }
}
