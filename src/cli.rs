use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "aml-pipeline",
    version,
    about = "Screen transaction exports against a remote AML model"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_CONFIG_PATH,
        help = "Configuration file (optional; defaults and environment apply when absent)"
    )]
    pub config: PathBuf,
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether the inference server is ready
    Health,
    /// Run one batch over a CSV export
    Analyze {
        file: PathBuf,
        #[arg(long, help = "Override pipeline.max_batch_size")]
        max_batch_size: Option<usize>,
        #[arg(long, help = "List every analyzed row, not just suspicious ones")]
        show_rows: bool,
        #[arg(long, help = "Print the raw model output")]
        raw: bool,
    },
}
