use std::path::{Path, PathBuf};

use thiserror::Error;

/// Everything that can stop or degrade an ingestion or validation run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("required {source_name} sheet not found (patterns: {patterns:?})")]
    MissingSheet {
        source_name: &'static str,
        patterns: Vec<String>,
    },

    #[error("no {source_name} data extracted: {reason}")]
    NoData {
        source_name: &'static str,
        reason: String,
    },

    #[error("sheet '{sheet}' could not be read: {reason}")]
    UnreadableSheet { sheet: String, reason: String },

    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid rules file: {0}")]
    Rules(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid reporting period '{0}' (expected YYYY-MM)")]
    InvalidPeriod(String),

    #[error("column '{column}' in {} is missing or has the wrong type", file.display())]
    Column { file: PathBuf, column: String },

    #[error("validation failed for {table}/{partition}: {violations} violation(s), report at {}", report.display())]
    Validation {
        table: String,
        partition: String,
        violations: usize,
        report: PathBuf,
    },

    #[error("{table} has partition directories without a valid as_of_month: {}", display_paths(dirs))]
    UnrecognizedPartitions { table: String, dirs: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl IngestError {
    /// Adapter for `map_err` that remembers which path the I/O failed on.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::Io { path, source }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
