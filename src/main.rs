//! AML Inference Pipeline - Main Entry Point
//!
//! Reads a transaction export, scores it against the configured model server
//! and reports which transactions were flagged.

use aml_inference_pipeline::{
    cli::{Cli, Commands},
    config::{AppConfig, LoggingConfig},
    inference::InferenceClient,
    pipeline::{Pipeline, RunReport, RunState},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_path(&cli.config)?;
    init_logging(&config.logging)?;
    info!(config = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Health => health(&config, cli.json).await,
        Commands::Analyze {
            file,
            max_batch_size,
            show_rows,
            raw,
        } => {
            if let Some(max) = max_batch_size {
                config.pipeline.max_batch_size = max;
                config.validate()?;
            }
            analyze(&config, &file, cli.json, show_rows, raw).await
        }
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("aml_inference_pipeline={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn health(config: &AppConfig, json: bool) -> Result<ExitCode> {
    let client = InferenceClient::from_config(&config.inference)?;
    let status = client.health().await;

    if json {
        let out = serde_json::json!({
            "health": status,
            "url": config.inference.url,
            "model_name": config.inference.model_name,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Inference server {} ({}): {}",
            config.inference.url,
            config.inference.model_name,
            if status.is_ready() { "ready" } else { "not ready" }
        );
    }

    Ok(if status.is_ready() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn analyze(
    config: &AppConfig,
    file: &Path,
    json: bool,
    show_rows: bool,
    raw: bool,
) -> Result<ExitCode> {
    let input = tokio::fs::read(file)
        .await
        .with_context(|| format!("Cannot read {}", file.display()))?;

    let pipeline = Pipeline::from_config(config)?;

    let health = pipeline.health().await;
    if !health.is_ready() {
        warn!(health = ?health, "Inference server is not ready, attempting run anyway");
    }

    let state = pipeline.run_bytes(&input).await;
    pipeline.metrics().print_summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(exit_code(&state));
    }

    match &state {
        RunState::Completed(report) => print_report(report, config, show_rows, raw)?,
        RunState::Failed(failure) => {
            eprintln!(
                "Error ({}, while {:?}): {}",
                failure.error.kind(),
                failure.stage,
                failure.error
            );
        }
    }

    Ok(exit_code(&state))
}

fn print_report(report: &RunReport, config: &AppConfig, show_rows: bool, raw: bool) -> Result<()> {
    println!("Batch analysis complete (run {})", report.run_id);
    println!(
        "Suspicious transactions found: {}",
        report.summary.suspicious_count
    );
    println!("Total analyzed: {}", report.summary.total_count);
    if report.truncated() {
        println!(
            "Only the first {} of {} transactions were analyzed (max_batch_size = {})",
            report.submitted_rows, report.parsed_rows, config.pipeline.max_batch_size
        );
    }
    if report.degraded_fields > 0 {
        println!(
            "{} fields could not be parsed and were defaulted",
            report.degraded_fields
        );
    }

    let rows: Vec<_> = if show_rows {
        report.classifications.iter().collect()
    } else {
        report.suspicious().collect()
    };
    for row in rows {
        let score = row
            .score
            .map(|s| format!("  score {s:.3}"))
            .unwrap_or_default();
        println!(
            "  line {:>6}  label {}{}{}",
            row.line,
            row.label,
            if row.suspicious { "  SUSPICIOUS" } else { "" },
            score
        );
    }

    if raw {
        println!("Raw model output:");
        println!("{}", serde_json::to_string_pretty(&report.raw_output)?);
    }
    Ok(())
}

fn exit_code(state: &RunState) -> ExitCode {
    match state {
        RunState::Completed(_) => ExitCode::SUCCESS,
        RunState::Failed(_) => ExitCode::FAILURE,
    }
}
