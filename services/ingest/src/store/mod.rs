//! Append-only, period-partitioned Parquet storage for the bronze tables.
//!
//! Layout: `<root>/<table>/as_of_month=YYYY-MM/<table>_<YYYY-MM>_<fp12>.parquet`.
//! A finalized file is never rewritten; new content for the same period lands
//! beside the older files.

pub mod audit_log;

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::array::StringArray;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::error::{IngestError, Result};
use crate::fingerprint::FileFingerprint;
use crate::logger::IngestLogger;
use crate::period::ReportingPeriod;
use crate::records::{column, BronzeTable, TableKind, COL_FILE_SHA256};

const PARTITION_PREFIX: &str = "as_of_month=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// This fingerprint's file was already in place.
    Existing(PathBuf),
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Written(path) | Self::Existing(path) => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionScan {
    pub periods: Vec<ReportingPeriod>,
    pub unrecognized: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_dir(&self, table: TableKind) -> PathBuf {
        self.root.join(table.dir_name())
    }

    pub fn partition_dir(&self, table: TableKind, period: ReportingPeriod) -> PathBuf {
        self.table_dir(table).join(period.partition_name())
    }

    pub fn file_path(
        &self,
        table: TableKind,
        period: ReportingPeriod,
        fingerprint: &FileFingerprint,
    ) -> PathBuf {
        self.partition_dir(table, period).join(format!(
            "{}_{}_{}.parquet",
            table.dir_name(),
            period,
            fingerprint.short()
        ))
    }

    /// Persists `records` as one new file of the period partition.
    ///
    /// Returns `None` for an empty record set (nothing is written). A file
    /// that already exists for this fingerprint is left untouched.
    pub fn write<T: BronzeTable>(
        &self,
        records: &[T],
        period: ReportingPeriod,
        fingerprint: &FileFingerprint,
    ) -> Result<Option<WriteOutcome>> {
        if records.is_empty() {
            return Ok(None);
        }
        let path = self.file_path(T::KIND, period, fingerprint);
        if path.exists() {
            return Ok(Some(WriteOutcome::Existing(path)));
        }
        let dir = self.partition_dir(T::KIND, period);
        fs::create_dir_all(&dir).map_err(IngestError::io(&dir))?;

        let batch = T::to_batch(records)?;
        write_batch(&path, &batch)?;
        Ok(Some(WriteOutcome::Written(path)))
    }

    /// Record files of one partition, sorted by name. A missing partition is
    /// simply empty.
    pub fn files(&self, table: TableKind, period: ReportingPeriod) -> Result<Vec<PathBuf>> {
        let dir = self.partition_dir(table, period);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(IngestError::io(&dir))? {
            let path = entry.map_err(IngestError::io(&dir))?.path();
            let visible = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'));
            if visible && path.extension().is_some_and(|ext| ext == "parquet") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Periods that have a partition directory for `table`, oldest first.
    pub fn partitions(&self, table: TableKind) -> Result<Vec<ReportingPeriod>> {
        Ok(self.scan_partitions(table)?.periods)
    }

    /// Partition directories of `table`. `as_of_month=` directories whose
    /// period does not parse are listed apart rather than dropped.
    pub fn scan_partitions(&self, table: TableKind) -> Result<PartitionScan> {
        let dir = self.table_dir(table);
        let mut scan = PartitionScan::default();
        if !dir.is_dir() {
            return Ok(scan);
        }
        for entry in fs::read_dir(&dir).map_err(IngestError::io(&dir))? {
            let entry = entry.map_err(IngestError::io(&dir))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(raw) = name.to_str().and_then(|n| n.strip_prefix(PARTITION_PREFIX)) else {
                continue;
            };
            match raw.parse::<ReportingPeriod>() {
                Ok(period) => scan.periods.push(period),
                Err(_) => scan.unrecognized.push(path),
            }
        }
        scan.periods.sort();
        scan.unrecognized.sort();
        Ok(scan)
    }

    /// Every record of a partition, across all of its files.
    pub fn read<T: BronzeTable>(&self, period: ReportingPeriod) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for file in self.files(T::KIND, period)? {
            for batch in read_batches(&file)? {
                rows.extend(T::from_batch(&batch, &file)?);
            }
        }
        Ok(rows)
    }

    /// Records of a partition that were ingested from the given file content.
    pub fn read_by_fingerprint<T: BronzeTable>(
        &self,
        period: ReportingPeriod,
        fingerprint: &FileFingerprint,
    ) -> Result<Vec<T>> {
        Ok(self
            .read::<T>(period)?
            .into_iter()
            .filter(|r| r.audit().file_sha256 == fingerprint.as_str())
            .collect())
    }

    /// Distinct fingerprints present in a partition. Files that cannot be
    /// read are reported and skipped.
    pub fn fingerprints(
        &self,
        table: TableKind,
        period: ReportingPeriod,
        logger: &dyn IngestLogger,
    ) -> Result<BTreeSet<String>> {
        let mut seen = BTreeSet::new();
        for file in self.files(table, period)? {
            let batches = match read_batches(&file) {
                Ok(batches) => batches,
                Err(e) => {
                    logger.warn(&format!("Skipping unreadable file {}: {e}", file.display()));
                    continue;
                }
            };
            for batch in &batches {
                match column::<StringArray>(batch, COL_FILE_SHA256, &file) {
                    Ok(values) => seen.extend(values.iter().flatten().map(str::to_string)),
                    Err(e) => logger.warn(&format!("Skipping file without fingerprints: {e}")),
                }
            }
        }
        Ok(seen)
    }
}

/// Writes one batch to `path` through a temporary sibling that is renamed
/// into place once the Parquet footer is closed.
pub fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IngestError::Config(format!("invalid output path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let result = (|| -> Result<()> {
        let file = File::create(&tmp).map_err(IngestError::io(&tmp))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(batch)?;
        writer.close()?;
        fs::rename(&tmp, path).map_err(IngestError::io(path))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path).map_err(IngestError::io(path))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}
