//! One screening run: parse, extract, assemble, infer, summarize.
//!
//! Every call to [`Pipeline::run`] starts from [`RunStage::Idle`] and
//! returns an immutable [`RunState`]. Runs share no mutable state apart from
//! the atomic counters in [`PipelineMetrics`], so they may overlap freely.

use crate::batch::BatchAssembler;
use crate::config::AppConfig;
use crate::error::{ParseError, PipelineError, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::inference::boundary::{HttpBoundary, InferenceBoundary};
use crate::inference::client::{HealthStatus, InferenceClient};
use crate::metrics::PipelineMetrics;
use crate::record_parser;
use crate::summary;
use crate::types::prediction::{Classification, RunSummary};
use crate::types::transaction::TransactionRecord;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Stage of a run. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    Parsing,
    Extracting,
    Assembling,
    Awaiting,
    Summarizing,
    Done,
    Failed,
}

impl RunStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Done | RunStage::Failed)
    }

    /// Stage that follows this one when it succeeds.
    pub fn next(self) -> Option<RunStage> {
        match self {
            RunStage::Idle => Some(RunStage::Parsing),
            RunStage::Parsing => Some(RunStage::Extracting),
            RunStage::Extracting => Some(RunStage::Assembling),
            RunStage::Assembling => Some(RunStage::Awaiting),
            RunStage::Awaiting => Some(RunStage::Summarizing),
            RunStage::Summarizing => Some(RunStage::Done),
            RunStage::Done | RunStage::Failed => None,
        }
    }

    /// Any live stage may fail; otherwise only the successor is reachable.
    pub fn can_transition_to(self, to: RunStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == RunStage::Failed || self.next() == Some(to)
    }
}

struct RunTracker {
    id: Uuid,
    started_at: DateTime<Utc>,
    stage: RunStage,
}

impl RunTracker {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            stage: RunStage::Idle,
        }
    }

    /// Move to `to` if the stage machine allows it. A rejected transition
    /// leaves the stage unchanged and returns `false`.
    fn advance(&mut self, to: RunStage) -> bool {
        if !self.stage.can_transition_to(to) {
            error!(run_id = %self.id, from = ?self.stage, to = ?to, "Rejected run stage transition");
            return false;
        }
        debug!(run_id = %self.id, from = ?self.stage, to = ?to, "Run stage transition");
        self.stage = to;
        true
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records read from the input
    pub parsed_rows: usize,
    /// Records sent for inference (at most `max_batch_size`)
    pub submitted_rows: usize,
    pub degraded_fields: usize,
    pub summary: RunSummary,
    pub classifications: Vec<Classification>,
    /// Response body exactly as the model server returned it
    pub raw_output: serde_json::Value,
}

impl RunReport {
    /// Whether rows were left out because of the batch cap
    pub fn truncated(&self) -> bool {
        self.submitted_rows < self.parsed_rows
    }

    pub fn suspicious(&self) -> impl Iterator<Item = &Classification> {
        self.classifications.iter().filter(|c| c.suspicious)
    }
}

/// Outcome of a failed run
#[derive(Debug, Serialize)]
pub struct RunFailure {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Stage the run was in when it failed
    pub stage: RunStage,
    #[serde(serialize_with = "serialize_error")]
    pub error: PipelineError,
}

fn serialize_error<S: Serializer>(
    error: &PipelineError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(2))?;
    map.serialize_entry("kind", error.kind())?;
    map.serialize_entry("message", &error.to_string())?;
    map.end()
}

/// Final state of one run
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Completed(RunReport),
    Failed(RunFailure),
}

impl RunState {
    pub fn run_id(&self) -> Uuid {
        match self {
            RunState::Completed(report) => report.run_id,
            RunState::Failed(failure) => failure.run_id,
        }
    }

    pub fn stage(&self) -> RunStage {
        match self {
            RunState::Completed(_) => RunStage::Done,
            RunState::Failed(_) => RunStage::Failed,
        }
    }

    pub fn into_result(self) -> std::result::Result<RunReport, RunFailure> {
        match self {
            RunState::Completed(report) => Ok(report),
            RunState::Failed(failure) => Err(failure),
        }
    }
}

/// Latest completed and latest failed run, for display.
///
/// A failure never clears the last completed report. A new completed run
/// clears the previous failure.
#[derive(Debug, Default)]
pub struct RunHistory {
    last_completed: Option<RunReport>,
    last_failure: Option<RunFailure>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, state: RunState) {
        match state {
            RunState::Completed(report) => {
                self.last_completed = Some(report);
                self.last_failure = None;
            }
            RunState::Failed(failure) => self.last_failure = Some(failure),
        }
    }

    pub fn last_completed(&self) -> Option<&RunReport> {
        self.last_completed.as_ref()
    }

    pub fn last_failure(&self) -> Option<&RunFailure> {
        self.last_failure.as_ref()
    }
}

/// Screening pipeline over one inference boundary
pub struct Pipeline<B = HttpBoundary> {
    extractor: FeatureExtractor,
    assembler: BatchAssembler,
    client: InferenceClient<B>,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline<HttpBoundary> {
    /// Build an HTTP-backed pipeline with placeholder aggregates
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = InferenceClient::from_config(&config.inference)?;
        Ok(Self::new(
            FeatureExtractor::new(),
            BatchAssembler::new(config.pipeline.max_batch_size),
            client,
        ))
    }
}

impl<B: InferenceBoundary> Pipeline<B> {
    pub fn new(
        extractor: FeatureExtractor,
        assembler: BatchAssembler,
        client: InferenceClient<B>,
    ) -> Self {
        Self {
            extractor,
            assembler,
            client,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Share a metrics collector with other pipelines
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Readiness of the inference server
    pub async fn health(&self) -> HealthStatus {
        self.client.health().await
    }

    /// Run the pipeline over CSV text
    pub async fn run(&self, input: &str) -> RunState {
        let mut tracker = self.begin();
        let parsed = record_parser::parse(input);
        self.finish(&mut tracker, parsed).await
    }

    /// Run the pipeline over raw CSV bytes
    pub async fn run_bytes(&self, input: &[u8]) -> RunState {
        let mut tracker = self.begin();
        let parsed = record_parser::parse_bytes(input);
        self.finish(&mut tracker, parsed).await
    }

    fn begin(&self) -> RunTracker {
        let mut tracker = RunTracker::start();
        self.metrics.record_run_started();
        tracker.advance(RunStage::Parsing);
        tracker
    }

    async fn finish(
        &self,
        tracker: &mut RunTracker,
        parsed: std::result::Result<Vec<TransactionRecord>, ParseError>,
    ) -> RunState {
        match self.execute(tracker, parsed).await {
            Ok(report) => {
                self.metrics.record_completed(&report.summary);
                info!(
                    run_id = %report.run_id,
                    parsed = report.parsed_rows,
                    submitted = report.submitted_rows,
                    suspicious = report.summary.suspicious_count,
                    "Run complete"
                );
                RunState::Completed(report)
            }
            Err(error) => {
                let stage = tracker.stage;
                tracker.advance(RunStage::Failed);
                self.metrics.record_failure(error.kind());
                error!(
                    run_id = %tracker.id,
                    stage = ?stage,
                    error = %error,
                    "Run failed"
                );
                RunState::Failed(RunFailure {
                    run_id: tracker.id,
                    started_at: tracker.started_at,
                    finished_at: Utc::now(),
                    stage,
                    error,
                })
            }
        }
    }

    async fn execute(
        &self,
        tracker: &mut RunTracker,
        parsed: std::result::Result<Vec<TransactionRecord>, ParseError>,
    ) -> Result<RunReport> {
        let records = parsed?;
        let parsed_rows = records.len();
        self.metrics.record_parsed(parsed_rows);

        tracker.advance(RunStage::Extracting);
        let mut vectors = Vec::with_capacity(parsed_rows);
        let mut lines = Vec::with_capacity(parsed_rows);
        let mut degraded_fields = 0;
        for record in records {
            let extraction = self.extractor.extract_with_report(&record);
            for degradation in &extraction.degradations {
                debug!(
                    run_id = %tracker.id,
                    line = record.line(),
                    degradation = ?degradation,
                    "Feature fell back to default"
                );
            }
            degraded_fields += extraction.degradations.len();
            vectors.push(extraction.vector);
            lines.push(record.line());
        }
        if degraded_fields > 0 {
            warn!(
                run_id = %tracker.id,
                degraded_fields = degraded_fields,
                "Some fields could not be parsed and were defaulted"
            );
            self.metrics.record_degradations(degraded_fields);
        }

        tracker.advance(RunStage::Assembling);
        let batch = self.assembler.assemble(&vectors);
        let submitted_rows = batch.count();
        lines.truncate(submitted_rows);
        if submitted_rows < parsed_rows {
            info!(
                run_id = %tracker.id,
                parsed = parsed_rows,
                submitted = submitted_rows,
                max_batch_size = self.assembler.max_batch_size(),
                "Batch capped"
            );
        }

        tracker.advance(RunStage::Awaiting);
        let start = Instant::now();
        let prediction = self.client.predict(batch).await?;
        if submitted_rows > 0 {
            self.metrics.record_inference(submitted_rows, start.elapsed());
        }

        tracker.advance(RunStage::Summarizing);
        let summary = summary::summarize(&prediction);
        let classifications = summary::classify(&lines, &prediction)?;

        tracker.advance(RunStage::Done);
        Ok(RunReport {
            run_id: tracker.id,
            started_at: tracker.started_at,
            finished_at: Utc::now(),
            parsed_rows,
            submitted_rows,
            degraded_fields,
            summary,
            classifications,
            raw_output: prediction.raw,
        })
    }
}
