//! Workbook to bronze ingestion for the leasing and expense spreadsheet.
//!
//! A run fingerprints the workbook, detects its reporting period, extracts
//! the dashboard, expense and lease tables from their fixed layouts and
//! appends them as period-partitioned Parquet files. The validator checks
//! those partitions against declared schemas afterwards.

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod locate;
pub mod logger;
pub mod normalize;
pub mod period;
pub mod pipeline;
pub mod records;
pub mod store;
pub mod summary;
pub mod validate;
pub mod workbook;

pub use config::{Config, IngestRules};
pub use error::{IngestError, Result};
pub use fingerprint::FileFingerprint;
pub use logger::{IngestLogger, MemoryLogger, TracingLogger};
pub use period::{DetectedPeriod, PeriodSource, ReportingPeriod};
pub use pipeline::{IngestOutcome, Pipeline, RunOptions};
pub use records::TableKind;
pub use store::audit_log::RunStatus;
pub use store::PartitionStore;
pub use validate::{ValidationMode, Validator};
