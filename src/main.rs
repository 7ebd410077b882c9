//! CLI entry point for the congestion audit pipeline.
//!
//! Provides subcommands for cleaning raw trip records, reconstructing a
//! missing month, running the dashboard aggregations, and the full pipeline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use congestion_audit::analyzers::runner;
use congestion_audit::config::PipelineConfig;
use congestion_audit::error::StageOutcome;
use congestion_audit::{ghost, impute};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "congestion_audit")]
#[command(about = "Congestion-pricing trip audit pipeline", long_about = None)]
struct Cli {
    /// Path to the pipeline config JSON
    #[arg(short, long, default_value = "pipeline.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify ghost records and publish the clean trip dataset
    Clean,
    /// Reconstruct the missing month from weighted historical references
    Impute,
    /// Publish the dashboard summary tables from the clean dataset
    Aggregate,
    /// Run the full pipeline: clean, impute, aggregate
    Run,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/congestion_audit.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("congestion_audit.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let cfg = PipelineConfig::load(&cli.config)?;

    match cli.command {
        Commands::Clean => {
            report_stage("clean", ghost::run_clean(&cfg)?);
        }
        Commands::Impute => {
            report_stage("impute", impute::run_impute(&cfg)?);
        }
        Commands::Aggregate => {
            aggregate(&cfg)?;
        }
        Commands::Run => {
            report_stage("clean", ghost::run_clean(&cfg)?);
            report_stage("impute", impute::run_impute(&cfg)?);
            aggregate(&cfg)?;
        }
    }

    Ok(())
}

fn report_stage(stage: &str, outcome: StageOutcome) {
    match outcome {
        StageOutcome::Ran => info!(stage, "Stage complete"),
        StageOutcome::Skipped => info!(stage, "Stage skipped"),
    }
}

fn aggregate(cfg: &PipelineConfig) -> Result<()> {
    let reports = runner::run_all(cfg)?;
    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    for report in reports.iter().filter(|r| !r.succeeded()) {
        error!(
            metric = report.name,
            error = report.error.as_deref().unwrap_or(""),
            "Metric did not publish"
        );
    }
    info!(
        published = reports.len() - failed,
        failed, "Aggregation complete"
    );
    Ok(())
}
