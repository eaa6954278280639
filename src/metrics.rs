//! Run statistics for the AML inference pipeline.

use crate::types::prediction::RunSummary;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is discarded
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector shared by all runs of a pipeline
pub struct PipelineMetrics {
    pub runs_started: AtomicU64,
    pub runs_completed: AtomicU64,
    pub runs_failed: AtomicU64,
    /// Records produced by the parser
    pub rows_parsed: AtomicU64,
    /// Rows the inference server returned labels for
    pub rows_scored: AtomicU64,
    pub suspicious_labels: AtomicU64,
    /// Field-level fallbacks during feature extraction
    pub degradations: AtomicU64,
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Inference round-trip times (in microseconds)
    inference_times: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            rows_parsed: AtomicU64::new(0),
            rows_scored: AtomicU64::new(0),
            suspicious_labels: AtomicU64::new(0),
            degradations: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            inference_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parsed(&self, rows: usize) {
        self.rows_parsed.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn record_degradations(&self, count: usize) {
        self.degradations.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record one inference round-trip
    pub fn record_inference(&self, rows: usize, latency: Duration) {
        self.rows_scored.fetch_add(rows as u64, Ordering::Relaxed);

        if let Ok(mut times) = self.inference_times.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > MAX_LATENCY_SAMPLES {
                times.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }
    }

    pub fn record_completed(&self, summary: &RunSummary) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.suspicious_labels
            .fetch_add(summary.suspicious_count as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: &str) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Inference latency percentiles
    pub fn get_inference_stats(&self) -> LatencyStats {
        let Ok(times) = self.inference_times.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Share of scored rows labelled suspicious
    pub fn suspicious_rate(&self) -> f64 {
        let scored = self.rows_scored.load(Ordering::Relaxed);
        if scored == 0 {
            0.0
        } else {
            self.suspicious_labels.load(Ordering::Relaxed) as f64 / scored as f64
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let started = self.runs_started.load(Ordering::Relaxed);
        let completed = self.runs_completed.load(Ordering::Relaxed);
        let failed = self.runs_failed.load(Ordering::Relaxed);
        let parsed = self.rows_parsed.load(Ordering::Relaxed);
        let scored = self.rows_scored.load(Ordering::Relaxed);
        let suspicious = self.suspicious_labels.load(Ordering::Relaxed);
        let degradations = self.degradations.load(Ordering::Relaxed);
        let latency = self.get_inference_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              AML INFERENCE PIPELINE - RUN SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Runs: {:>6} started  {:>6} completed  {:>6} failed        ║",
            started, completed, failed
        );
        info!(
            "║ Rows: {:>8} parsed  {:>8} scored     {:>6} degraded fields ║",
            parsed, scored, degradations
        );
        info!(
            "║ Suspicious: {:>8}  ({:>5.1}% of scored)                      ║",
            suspicious,
            self.suspicious_rate() * 100.0
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Inference (μs): mean={:>7} p50={:>7} p95={:>7} max={:>7} ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.max_us
        );

        let failures = self.get_failures_by_kind();
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by kind:                                            ║");
            for (kind, count) in &failures {
                info!("║   {:16}: {:>6}                                   ║", kind, count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
        info!(
            uptime_s = self.start_time.elapsed().as_secs(),
            "Metrics collected"
        );
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Inference latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
