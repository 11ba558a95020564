//! Quality CLI - validates every bronze partition against its table schema
//!
//! Failing partitions get a quarantine directory under bronze/_errors with a
//! report and a sample of the offending rows. The process exits non-zero when
//! anything failed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ingest::{Config, PartitionStore, TableKind, TracingLogger, ValidationMode, Validator};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quality", about = "Validates bronze partitions")]
struct Args {
    /// Only this table (dashboard, expenses, lease_rate)
    #[arg(long)]
    table: Option<String>,

    /// Data directory holding bronze/ (default: DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep validating after a failing partition instead of stopping the table
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
    let tables: Vec<TableKind> = match &args.table {
        Some(name) => vec![name.parse::<TableKind>().context("Invalid --table")?],
        None => TableKind::ALL.to_vec(),
    };

    println!("=== Bronze Validation ===");
    println!("Bronze dir: {}", config.bronze_dir().display());
    println!("Mode: {}", if args.soft { "soft" } else { "hard" });

    let mode = if args.soft { ValidationMode::Soft } else { ValidationMode::Hard };
    let validator = Validator::new(config.quarantine_dir(), mode);
    let store = PartitionStore::new(config.bronze_dir());
    let sweep = validator.validate_tables(&store, &tables, &TracingLogger);

    println!();
    for report in &sweep.partitions {
        let mark = if report.passed() { "ok" } else { "FAILED" };
        println!(
            "  {:<26} {:<20} {:>6} rows  {mark}",
            report.table.dir_name(),
            report.period.partition_name(),
            report.rows
        );
    }
    for (table, error) in &sweep.errors {
        println!("  {:<26} {error}", table.dir_name());
    }

    if !sweep.passed() {
        for report in sweep.failed_partitions() {
            if let Some(dir) = &report.quarantine {
                println!("  quarantine: {}", dir.display());
            }
        }
        bail!(
            "Some bronze validations failed; check {} for details",
            config.quarantine_dir().display()
        );
    }
    println!("All bronze validations passed");
    Ok(())
}
