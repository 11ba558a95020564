//! Ingest CLI - loads one workbook into the bronze layer
//!
//! Responsibilities:
//! - Fingerprint the workbook and detect its reporting period
//! - Skip content that was already ingested for that period
//! - Extract dashboard, expense and lease tables and append them as partitions
//! - Record every attempt in the ingestion log
//! - Optionally validate the partitions that were just written

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ingest::{
    Config, IngestRules, Pipeline, RunOptions, RunStatus, TracingLogger, ValidationMode, Validator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ingest", about = "Ingests the leasing workbook into bronze partitions")]
struct Args {
    /// Workbook to ingest (default: EXCEL_PATH)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Data directory holding bronze/ and the ingestion log (default: DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// JSON file with sheet patterns, aliases and layouts (default: INGEST_RULES)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Extract and report without writing anything
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Validate the written partitions after ingesting
    #[arg(long, default_value = "false")]
    validate: bool,

    /// With --validate, report failures without failing the run
    #[arg(long, default_value = "false")]
    soft: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(path) = &args.rules {
        config.rules = IngestRules::load(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?;
    }
    let file = args.file.unwrap_or_else(|| config.workbook_path());

    println!("=== Bronze Ingestion ===");
    println!("Workbook: {}", file.display());
    println!("Data dir: {}", config.data_dir.display());
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let logger = TracingLogger;
    let pipeline = Pipeline::new(&config, &logger);
    let outcome = pipeline
        .run(&file, RunOptions { dry_run: args.dry_run })
        .with_context(|| format!("Ingestion of {} failed", file.display()))?;

    println!();
    println!("Run: {}", outcome.run_id);
    println!("Fingerprint: {}", outcome.fingerprint);
    println!("As of month: {} (from {})", outcome.period.period, outcome.period.source.as_str());
    println!("Status: {}", outcome.status.as_str());
    for (table, rows) in &outcome.rows {
        println!("  {:<26} {rows:>6} rows", table.dir_name());
    }
    if let Some(summary) = &outcome.summary {
        println!("Rent roll: {summary}");
    }
    if outcome.period.is_fallback() {
        println!("WARNING: reporting period fell back to the current month");
    }

    if args.validate && outcome.status == RunStatus::Success && !args.dry_run {
        let mode = if args.soft { ValidationMode::Soft } else { ValidationMode::Hard };
        let validator = Validator::new(config.quarantine_dir(), mode);
        let store = pipeline.store();
        let mut failed = 0;
        for &table in outcome.rows.keys() {
            let report = validator
                .validate_partition(&store, table, outcome.period.period, &logger)
                .with_context(|| format!("Validation of {table} failed"))?;
            if !report.passed() {
                failed += 1;
            }
        }
        if failed > 0 {
            println!("Validation: {failed} partition(s) failed, see {}", config.quarantine_dir().display());
        } else {
            println!("Validation: passed");
        }
    }

    Ok(())
}
