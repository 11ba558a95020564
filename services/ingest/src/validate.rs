//! Schema validation of bronze partitions.
//!
//! Every table declares its columns (type, nullability, value checks) and the
//! columns that must be unique. A partition is validated as a whole: all
//! violations are collected, then diagnostics go to a quarantine directory.
//! Validation only reads bronze data.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use chrono::Utc;

use crate::error::{IngestError, Result};
use crate::logger::IngestLogger;
use crate::period::ReportingPeriod;
use crate::records::{TableKind, COL_AS_OF_MONTH, COL_FILE_SHA256, COL_INGESTED_AT};
use crate::store::{read_batches, PartitionStore};

const SAMPLE_LIMIT: usize = 50;
/// `collected` may exceed `rent_base` by this factor before a warning.
const COLLECTED_TOLERANCE: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Utf8,
    Float64,
    Boolean,
    Date32,
}

impl ColumnType {
    fn matches(self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Self::Utf8, DataType::Utf8)
                | (Self::Utf8, DataType::LargeUtf8)
                | (Self::Float64, DataType::Float64)
                | (Self::Boolean, DataType::Boolean)
                | (Self::Date32, DataType::Date32)
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Check {
    NonNegative,
    OneOf(&'static [&'static str]),
}

#[derive(Debug)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub checks: &'static [Check],
}

#[derive(Debug)]
pub struct TableSchema {
    pub table: TableKind,
    pub columns: &'static [ColumnSpec],
    /// Columns whose values may appear once per ingested file version.
    pub unique: &'static [&'static str],
}

const fn col(name: &'static str, ty: ColumnType, nullable: bool, checks: &'static [Check]) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable,
        checks,
    }
}

const NON_NEGATIVE: &[Check] = &[Check::NonNegative];
const NONE: &[Check] = &[];

static DASHBOARD_SCHEMA: TableSchema = TableSchema {
    table: TableKind::Dashboard,
    columns: &[
        col(COL_AS_OF_MONTH, ColumnType::Utf8, false, NONE),
        col("month", ColumnType::Date32, false, NONE),
        col("rent_base", ColumnType::Float64, true, NON_NEGATIVE),
        col("collected", ColumnType::Float64, true, NON_NEGATIVE),
        // Negative when tenants prepay.
        col("uncollected", ColumnType::Float64, true, NONE),
        col("leased_sqft", ColumnType::Float64, true, NON_NEGATIVE),
        col("price_per_sf_yr", ColumnType::Float64, true, NON_NEGATIVE),
        col(COL_FILE_SHA256, ColumnType::Utf8, false, NONE),
        col(COL_INGESTED_AT, ColumnType::Utf8, false, NONE),
    ],
    unique: &[],
};

static EXPENSES_SCHEMA: TableSchema = TableSchema {
    table: TableKind::Expenses,
    columns: &[
        col(COL_AS_OF_MONTH, ColumnType::Utf8, false, NONE),
        col("month", ColumnType::Date32, false, NONE),
        col("item", ColumnType::Utf8, false, NONE),
        col("actual", ColumnType::Float64, true, NON_NEGATIVE),
        col(
            "expense_category",
            ColumnType::Utf8,
            false,
            &[Check::OneOf(&["fixed", "variable", "other"])],
        ),
        col(COL_FILE_SHA256, ColumnType::Utf8, false, NONE),
        col(COL_INGESTED_AT, ColumnType::Utf8, false, NONE),
    ],
    unique: &[],
};

static LEASE_SCHEMA: TableSchema = TableSchema {
    table: TableKind::LeaseRate,
    columns: &[
        col(COL_AS_OF_MONTH, ColumnType::Utf8, false, NONE),
        col("suite_id", ColumnType::Utf8, false, NONE),
        col("building", ColumnType::Utf8, true, &[Check::OneOf(&["A", "B"])]),
        col("tenant", ColumnType::Utf8, false, NONE),
        col("sqft", ColumnType::Float64, true, NON_NEGATIVE),
        col("rent_monthly", ColumnType::Float64, true, NON_NEGATIVE),
        col("rent_annual", ColumnType::Float64, true, NON_NEGATIVE),
        col("rent_psf_yr", ColumnType::Float64, true, NON_NEGATIVE),
        col("is_vacant", ColumnType::Boolean, false, NONE),
        col("is_own_use", ColumnType::Boolean, false, NONE),
        col(COL_FILE_SHA256, ColumnType::Utf8, false, NONE),
        col(COL_INGESTED_AT, ColumnType::Utf8, false, NONE),
    ],
    unique: &["suite_id"],
};

pub fn schema_for(table: TableKind) -> &'static TableSchema {
    match table {
        TableKind::Dashboard => &DASHBOARD_SCHEMA,
        TableKind::Expenses => &EXPENSES_SCHEMA,
        TableKind::LeaseRate => &LEASE_SCHEMA,
    }
}

/// One broken rule. `row` is `None` for file-level problems (missing
/// column, wrong type, unreadable file).
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub file: PathBuf,
    pub row: Option<usize>,
    pub column: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub table: TableKind,
    pub period: ReportingPeriod,
    pub files: usize,
    pub rows: usize,
    pub violations: Vec<Violation>,
    pub warnings: Vec<String>,
    /// Diagnostics directory, written only when the partition failed.
    pub quarantine: Option<PathBuf>,
}

impl PartitionReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// A failing partition is an error once its diagnostics are written.
    #[default]
    Hard,
    /// Failures are reported and the sweep continues.
    Soft,
}

/// Outcome of validating every table.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub partitions: Vec<PartitionReport>,
    /// Tables whose validation stopped with an error.
    pub errors: Vec<(TableKind, String)>,
}

impl SweepReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.partitions.iter().all(PartitionReport::passed)
    }

    pub fn failed_partitions(&self) -> impl Iterator<Item = &PartitionReport> {
        self.partitions.iter().filter(|p| !p.passed())
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    quarantine_root: PathBuf,
    mode: ValidationMode,
}

impl Validator {
    pub fn new(quarantine_root: impl Into<PathBuf>, mode: ValidationMode) -> Self {
        Self {
            quarantine_root: quarantine_root.into(),
            mode,
        }
    }

    pub fn validate_partition(
        &self,
        store: &PartitionStore,
        table: TableKind,
        period: ReportingPeriod,
        logger: &dyn IngestLogger,
    ) -> Result<PartitionReport> {
        let schema = schema_for(table);
        let files = store.files(table, period)?;
        let mut report = PartitionReport {
            table,
            period,
            files: files.len(),
            rows: 0,
            violations: Vec::new(),
            warnings: Vec::new(),
            quarantine: None,
        };
        if files.is_empty() {
            logger.warn(&format!("No record files in {table}/{}", period.partition_name()));
            return Ok(report);
        }
        logger.info(&format!(
            "Validating {} file(s) in {table}/{}",
            files.len(),
            period.partition_name()
        ));

        let mut loaded = Vec::new();
        for file in files {
            match read_batches(&file) {
                Ok(batches) => loaded.extend(batches.into_iter().map(|b| (file.clone(), b))),
                Err(e) => report.violations.push(Violation {
                    file,
                    row: None,
                    column: String::new(),
                    message: format!("unreadable file: {e}"),
                }),
            }
        }

        // (batch index, row) -> messages, for the sample file.
        let mut flagged: BTreeMap<(usize, usize), Vec<String>> = BTreeMap::new();
        for (index, (file, batch)) in loaded.iter().enumerate() {
            report.rows += batch.num_rows();
            for violation in check_batch(schema, batch, file) {
                if let Some(row) = violation.row {
                    flagged
                        .entry((index, row))
                        .or_default()
                        .push(format!("{}: {}", violation.column, violation.message));
                }
                report.violations.push(violation);
            }
            if table == TableKind::Dashboard {
                report.warnings.extend(collected_warnings(batch));
            }
        }
        for (index, row, violation) in check_unique(schema, &loaded) {
            flagged
                .entry((index, row))
                .or_default()
                .push(format!("{}: {}", violation.column, violation.message));
            report.violations.push(violation);
        }

        for warning in &report.warnings {
            logger.warn(&format!("{table}/{}: {warning}", period.partition_name()));
        }

        if report.passed() {
            logger.info(&format!(
                "Validation passed for {table}/{} ({} rows)",
                period.partition_name(),
                report.rows
            ));
            return Ok(report);
        }

        let dir = self.write_quarantine(schema, &report, &loaded, &flagged)?;
        logger.error(&format!(
            "Validation failed for {table}/{}: {} violation(s), diagnostics in {}",
            period.partition_name(),
            report.violations.len(),
            dir.display()
        ));
        report.quarantine = Some(dir.clone());

        match self.mode {
            ValidationMode::Hard => Err(IngestError::Validation {
                table: table.to_string(),
                partition: period.partition_name(),
                violations: report.violations.len(),
                report: dir,
            }),
            ValidationMode::Soft => Ok(report),
        }
    }

    /// Every partition of one table, oldest first. In hard mode the first
    /// failing partition stops the table.
    pub fn validate_table(
        &self,
        store: &PartitionStore,
        table: TableKind,
        logger: &dyn IngestLogger,
    ) -> Result<Vec<PartitionReport>> {
        let mut reports = Vec::new();
        self.sweep_table(store, table, logger, &mut reports)?;
        Ok(reports)
    }

    /// All tables. An error in one table is recorded and the next table is
    /// still validated.
    pub fn validate_all(&self, store: &PartitionStore, logger: &dyn IngestLogger) -> SweepReport {
        self.validate_tables(store, &TableKind::ALL, logger)
    }

    pub fn validate_tables(
        &self,
        store: &PartitionStore,
        tables: &[TableKind],
        logger: &dyn IngestLogger,
    ) -> SweepReport {
        let mut sweep = SweepReport::default();
        for &table in tables {
            if let Err(e) = self.sweep_table(store, table, logger, &mut sweep.partitions) {
                logger.error(&format!("Validation stopped for {table}: {e}"));
                sweep.errors.push((table, e.to_string()));
            }
        }
        sweep
    }

    /// Pushes each partition report as soon as it completes, so reports from
    /// before an error survive it. Partition directories whose name is not a
    /// valid period cannot be validated and fail the table.
    fn sweep_table(
        &self,
        store: &PartitionStore,
        table: TableKind,
        logger: &dyn IngestLogger,
        reports: &mut Vec<PartitionReport>,
    ) -> Result<()> {
        let scan = store.scan_partitions(table)?;
        if scan.periods.is_empty() && scan.unrecognized.is_empty() {
            logger.warn(&format!("No partitions found for {table}"));
        }
        for period in scan.periods {
            reports.push(self.validate_partition(store, table, period, logger)?);
        }
        if scan.unrecognized.is_empty() {
            return Ok(());
        }
        for dir in &scan.unrecognized {
            logger.warn(&format!("Unrecognized partition directory {}", dir.display()));
        }
        Err(IngestError::UnrecognizedPartitions {
            table: table.to_string(),
            dirs: scan.unrecognized,
        })
    }

    fn write_quarantine(
        &self,
        schema: &TableSchema,
        report: &PartitionReport,
        loaded: &[(PathBuf, RecordBatch)],
        flagged: &BTreeMap<(usize, usize), Vec<String>>,
    ) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let dir = self
            .quarantine_root
            .join(report.table.dir_name())
            .join(report.period.partition_name())
            .join(stamp);
        fs::create_dir_all(&dir).map_err(IngestError::io(&dir))?;

        let report_path = dir.join("report.txt");
        fs::write(&report_path, render_report(report)).map_err(IngestError::io(&report_path))?;

        let sample_path = dir.join("sample_rows.csv");
        let mut writer = csv::Writer::from_path(&sample_path)?;
        let mut header = vec!["_source_file", "_row", "_violations"];
        header.extend(schema.columns.iter().map(|c| c.name));
        writer.write_record(&header)?;

        for ((index, row), messages) in flagged.iter().take(SAMPLE_LIMIT) {
            let (file, batch) = &loaded[*index];
            let mut record = vec![
                file_name(file),
                row.to_string(),
                messages.join("; "),
            ];
            record.extend(schema.columns.iter().map(|c| {
                batch
                    .column_by_name(c.name)
                    .map(|array| render_value(array, *row))
                    .unwrap_or_default()
            }));
            writer.write_record(&record)?;
        }
        writer.flush().map_err(IngestError::io(&sample_path))?;
        Ok(dir)
    }
}

fn check_batch(schema: &TableSchema, batch: &RecordBatch, file: &Path) -> Vec<Violation> {
    let mut violations = Vec::new();
    let violation = |row: Option<usize>, column: &str, message: String| Violation {
        file: file.to_path_buf(),
        row,
        column: column.to_string(),
        message,
    };

    for spec in schema.columns {
        let Some(array) = batch.column_by_name(spec.name) else {
            violations.push(violation(None, spec.name, "column missing".to_string()));
            continue;
        };
        if !spec.ty.matches(array.data_type()) {
            violations.push(violation(
                None,
                spec.name,
                format!("expected {:?}, found {}", spec.ty, array.data_type()),
            ));
            continue;
        }
        for row in 0..array.len() {
            if array.is_null(row) {
                if !spec.nullable {
                    violations.push(violation(Some(row), spec.name, "null in non-nullable column".to_string()));
                }
                continue;
            }
            for check in spec.checks {
                if let Some(message) = apply_check(*check, array, row) {
                    violations.push(violation(Some(row), spec.name, message));
                }
            }
        }
    }
    violations
}

fn apply_check(check: Check, array: &ArrayRef, row: usize) -> Option<String> {
    match check {
        Check::NonNegative => {
            let value = array.as_any().downcast_ref::<Float64Array>()?.value(row);
            (value < 0.0).then(|| format!("{value} is negative"))
        }
        Check::OneOf(allowed) => {
            let value = string_value(array.as_ref(), row)?;
            (!allowed.iter().any(|a| *a == value)).then(|| format!("'{value}' not in {allowed:?}"))
        }
    }
}

/// Duplicate values of the unique columns within one file version
/// (same `_file_sha256`). Versions of a period sit side by side, so the
/// same suite legitimately appears once per version.
fn check_unique(
    schema: &TableSchema,
    loaded: &[(PathBuf, RecordBatch)],
) -> Vec<(usize, usize, Violation)> {
    let mut found = Vec::new();
    for &name in schema.unique {
        let mut seen: HashMap<(String, String), (usize, usize)> = HashMap::new();
        for (index, (file, batch)) in loaded.iter().enumerate() {
            let (Some(values), Some(versions)) = (batch.column_by_name(name), batch.column_by_name(COL_FILE_SHA256))
            else {
                continue;
            };
            for row in 0..batch.num_rows() {
                if values.is_null(row) {
                    continue;
                }
                let Some(value) = string_value(values.as_ref(), row) else {
                    continue;
                };
                let version = if versions.is_null(row) {
                    ""
                } else {
                    string_value(versions.as_ref(), row).unwrap_or_default()
                };
                let key = (version.to_string(), value.to_string());
                if let Some(&(first_index, first_row)) = seen.get(&key) {
                    let first_file = &loaded[first_index].0;
                    found.push((
                        index,
                        row,
                        Violation {
                            file: file.clone(),
                            row: Some(row),
                            column: name.to_string(),
                            message: format!(
                                "duplicate '{}' (first at {} row {first_row})",
                                key.1,
                                file_name(first_file)
                            ),
                        },
                    ));
                } else {
                    seen.insert(key, (index, row));
                }
            }
        }
    }
    found
}

/// Advisory only: collections well above the rent base usually mean a
/// shifted row, but prepayments make them legitimate.
fn collected_warnings(batch: &RecordBatch) -> Vec<String> {
    let column = |name| {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
    };
    let (Some(rent), Some(collected)) = (column("rent_base"), column("collected")) else {
        return Vec::new();
    };
    (0..batch.num_rows())
        .filter(|&row| !rent.is_null(row) && !collected.is_null(row))
        .filter(|&row| collected.value(row) > rent.value(row) * COLLECTED_TOLERANCE)
        .map(|row| {
            format!(
                "row {row}: collected {} exceeds rent_base {} by more than 10%",
                collected.value(row),
                rent.value(row)
            )
        })
        .collect()
}

fn render_report(report: &PartitionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Validation errors for {}/{}", report.table, report.period.partition_name());
    let _ = writeln!(out, "Timestamp: {}", Utc::now().to_rfc3339());
    let _ = writeln!(out, "Files: {}  Rows: {}  Violations: {}", report.files, report.rows, report.violations.len());
    let _ = writeln!(out, "{}", "=".repeat(80));
    for v in &report.violations {
        let row = v.row.map_or_else(|| "-".to_string(), |r| r.to_string());
        let _ = writeln!(out, "{}\trow {row}\t{}\t{}", file_name(&v.file), v.column, v.message);
    }
    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for w in &report.warnings {
            let _ = writeln!(out, "{w}");
        }
    }
    out
}

/// Value of a Utf8 or LargeUtf8 column.
fn string_value(array: &dyn Array, row: usize) -> Option<&str> {
    match array.as_string_opt::<i32>() {
        Some(strings) => Some(strings.value(row)),
        None => array.as_string_opt::<i64>().map(|strings| strings.value(row)),
    }
}

fn render_value(array: &ArrayRef, row: usize) -> String {
    if row >= array.len() || array.is_null(row) {
        return String::new();
    }
    array_value_to_string(array, row).unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FileFingerprint;
    use crate::logger::{LogLevel, MemoryLogger};
    use crate::records::{
        AuditColumns, BronzeTable, ExpenseCategory, MonthlyDashboardFact, MonthlyExpenseFact, SuiteSnapshotFact,
    };
    use crate::store::write_batch;
    use arrow::array::StringArray;
    use arrow::datatypes::{Field, Schema};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn period() -> ReportingPeriod {
        ReportingPeriod::new(2025, 2).unwrap()
    }

    fn audit(fp: &FileFingerprint) -> AuditColumns {
        AuditColumns {
            as_of_month: "2025-02".to_string(),
            file_sha256: fp.as_str().to_string(),
            ingested_at: "2025-02-10T08:00:00+00:00".to_string(),
        }
    }

    fn suite(id: &str, sqft: f64, fp: &FileFingerprint) -> SuiteSnapshotFact {
        SuiteSnapshotFact {
            suite_id: id.to_string(),
            building: crate::classify::extract_building(id),
            tenant: "Acme".to_string(),
            sqft: Some(sqft),
            rent_monthly: Some(1000.0),
            rent_annual: Some(12000.0),
            rent_psf_yr: Some(12000.0 / sqft.max(1.0)),
            is_vacant: false,
            is_own_use: false,
            audit: audit(fp),
        }
    }

    fn setup() -> (tempfile::TempDir, PartitionStore, Validator) {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().join("bronze"));
        let validator = Validator::new(dir.path().join("bronze").join("_errors"), ValidationMode::Soft);
        (dir, store, validator)
    }

    #[test]
    fn test_clean_partition_passes() {
        let (_dir, store, validator) = setup();
        let fp = FileFingerprint::from_bytes(b"v1");
        store
            .write(&[suite("101A", 500.0, &fp), suite("102B", 250.0, &fp)], period(), &fp)
            .unwrap();

        let logger = MemoryLogger::new();
        let report = validator
            .validate_partition(&store, TableKind::LeaseRate, period(), &logger)
            .unwrap();
        assert!(report.passed());
        assert_eq!(report.rows, 2);
        assert!(report.quarantine.is_none());
    }

    #[test]
    fn test_bad_lease_rows_are_quarantined() {
        let (dir, store, validator) = setup();
        let fp = FileFingerprint::from_bytes(b"v1");
        let mut negative = suite("101A", 500.0, &fp);
        negative.sqft = Some(-10.0);
        let duplicate = suite("101A", 500.0, &fp);
        store
            .write(&[negative, suite("205B", 300.0, &fp), duplicate], period(), &fp)
            .unwrap();

        let logger = MemoryLogger::new();
        let report = validator
            .validate_partition(&store, TableKind::LeaseRate, period(), &logger)
            .unwrap();
        assert!(!report.passed());
        assert_eq!(report.violations.len(), 2);
        assert!(report.violations.iter().any(|v| v.column == "sqft" && v.row == Some(0)));
        assert!(report.violations.iter().any(|v| v.column == "suite_id" && v.row == Some(2)));

        let quarantine = report.quarantine.unwrap();
        assert!(quarantine.starts_with(
            dir.path()
                .join("bronze/_errors/raw_lease_rate_snapshot/as_of_month=2025-02")
        ));
        let text = fs::read_to_string(quarantine.join("report.txt")).unwrap();
        assert!(text.contains("Violations: 2"));

        let mut reader = csv::Reader::from_path(quarantine.join("sample_rows.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "_source_file");
        assert_eq!(&headers[3], COL_AS_OF_MONTH);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "0");
        assert!(rows[0][2].contains("negative"));
        assert_eq!(&rows[0][4], "101A");
        assert!(logger.contains(LogLevel::Error, "Validation failed"));
    }

    #[test]
    fn test_same_suite_in_two_versions_is_not_a_duplicate() {
        let (_dir, store, validator) = setup();
        let v1 = FileFingerprint::from_bytes(b"v1");
        let v2 = FileFingerprint::from_bytes(b"v2");
        store.write(&[suite("101A", 500.0, &v1)], period(), &v1).unwrap();
        store.write(&[suite("101A", 520.0, &v2)], period(), &v2).unwrap();

        let logger = MemoryLogger::new();
        let report = validator
            .validate_partition(&store, TableKind::LeaseRate, period(), &logger)
            .unwrap();
        assert!(report.passed());
        assert_eq!(report.files, 2);
    }

    #[test]
    fn test_hard_mode_errors_after_writing_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().join("bronze"));
        let quarantine_root = dir.path().join("bronze").join("_errors");
        let validator = Validator::new(&quarantine_root, ValidationMode::Hard);
        let fp = FileFingerprint::from_bytes(b"v1");

        // Building "C" and an unknown category cannot come out of the
        // extractors, so write the batches by hand.
        let lease = SuiteSnapshotFact::to_batch(&[suite("301", 100.0, &fp)]).unwrap();
        let mut columns = lease.columns().to_vec();
        columns[1] = Arc::new(StringArray::from(vec![Some("C")]));
        let lease = RecordBatch::try_new(lease.schema(), columns).unwrap();
        let part = store.partition_dir(TableKind::LeaseRate, period());
        fs::create_dir_all(&part).unwrap();
        write_batch(&part.join("raw_lease_rate_snapshot_2025-02_manual.parquet"), &lease).unwrap();

        let logger = MemoryLogger::new();
        let err = validator
            .validate_partition(&store, TableKind::LeaseRate, period(), &logger)
            .unwrap_err();
        match err {
            IngestError::Validation { violations, report, .. } => {
                assert_eq!(violations, 1);
                assert!(report.join("report.txt").exists());
                assert!(report.join("sample_rows.csv").exists());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_category_and_missing_column() {
        let (_dir, store, validator) = setup();
        let fp = FileFingerprint::from_bytes(b"v1");
        let expenses = MonthlyExpenseFact::to_batch(&[MonthlyExpenseFact {
            month: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            item: "Water".to_string(),
            actual: 80.0,
            category: ExpenseCategory::Fixed,
            audit: audit(&fp),
        }])
        .unwrap();
        let mut columns = expenses.columns().to_vec();
        columns[3] = Arc::new(StringArray::from(vec!["misc"]));
        let bad = RecordBatch::try_new(expenses.schema(), columns).unwrap();
        let part = store.partition_dir(TableKind::Expenses, period());
        fs::create_dir_all(&part).unwrap();
        write_batch(&part.join("a.parquet"), &bad).unwrap();

        // A file missing `item` entirely.
        let thin_schema = Arc::new(Schema::new(vec![Field::new("month", DataType::Date32, false)]));
        let thin = RecordBatch::try_new(
            thin_schema,
            vec![Arc::new(arrow::array::Date32Array::from(vec![20089]))],
        )
        .unwrap();
        write_batch(&part.join("b.parquet"), &thin).unwrap();

        let logger = MemoryLogger::new();
        let report = validator
            .validate_partition(&store, TableKind::Expenses, period(), &logger)
            .unwrap();
        assert!(report
            .violations
            .iter()
            .any(|v| v.column == "expense_category" && v.message.contains("misc")));
        assert!(report
            .violations
            .iter()
            .any(|v| v.column == "item" && v.row.is_none() && v.message == "column missing"));
    }

    #[test]
    fn test_collected_above_rent_is_only_a_warning() {
        let (_dir, store, validator) = setup();
        let fp = FileFingerprint::from_bytes(b"v1");
        let row = MonthlyDashboardFact {
            month: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            rent_base: Some(1000.0),
            collected: Some(1500.0),
            uncollected: Some(-500.0),
            leased_sqft: Some(8000.0),
            price_per_sf_yr: Some(30.0),
            audit: audit(&fp),
        };
        store.write(&[row], period(), &fp).unwrap();

        let logger = MemoryLogger::new();
        let report = validator
            .validate_partition(&store, TableKind::Dashboard, period(), &logger)
            .unwrap();
        assert!(report.passed());
        assert_eq!(report.warnings.len(), 1);
        assert!(logger.contains(LogLevel::Warn, "exceeds rent_base"));
    }

    #[test]
    fn test_validate_all_sweeps_every_table() {
        let (_dir, store, validator) = setup();
        let fp = FileFingerprint::from_bytes(b"v1");
        store.write(&[suite("101A", 500.0, &fp)], period(), &fp).unwrap();
        let mut bad = suite("102A", 500.0, &fp);
        bad.rent_annual = Some(-1.0);
        let later = ReportingPeriod::new(2025, 3).unwrap();
        store.write(&[bad], later, &fp).unwrap();

        let logger = MemoryLogger::new();
        let sweep = validator.validate_all(&store, &logger);
        assert!(!sweep.passed());
        assert_eq!(sweep.partitions.len(), 2);
        let failed: Vec<_> = sweep.failed_partitions().map(|p| p.period.to_string()).collect();
        assert_eq!(failed, vec!["2025-03"]);
        assert!(logger.contains(LogLevel::Warn, "No partitions found for raw_dashboard_monthly"));
    }

    #[test]
    fn test_hard_sweep_records_error_and_visits_other_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().join("bronze"));
        let validator = Validator::new(dir.path().join("bronze").join("_errors"), ValidationMode::Hard);
        let fp = FileFingerprint::from_bytes(b"v1");

        store.write(&[suite("101A", 500.0, &fp)], period(), &fp).unwrap();
        let mut bad = suite("102A", 500.0, &fp);
        bad.rent_annual = Some(-1.0);
        store.write(&[bad], ReportingPeriod::new(2025, 3).unwrap(), &fp).unwrap();
        let dashboard = MonthlyDashboardFact {
            month: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            rent_base: Some(1000.0),
            collected: Some(900.0),
            uncollected: Some(100.0),
            leased_sqft: Some(8000.0),
            price_per_sf_yr: Some(30.0),
            audit: audit(&fp),
        };
        store.write(&[dashboard], period(), &fp).unwrap();

        let logger = MemoryLogger::new();
        let sweep = validator.validate_all(&store, &logger);
        assert!(!sweep.passed());
        assert_eq!(sweep.errors.len(), 1);
        assert_eq!(sweep.errors[0].0, TableKind::LeaseRate);
        assert!(sweep.errors[0].1.contains("as_of_month=2025-03"));

        // The lease partition validated before the failure is still reported,
        // and the dashboard table after it was still visited.
        let visited: Vec<(TableKind, String)> = sweep
            .partitions
            .iter()
            .map(|p| (p.table, p.period.to_string()))
            .collect();
        assert_eq!(
            visited,
            vec![
                (TableKind::Dashboard, "2025-02".to_string()),
                (TableKind::LeaseRate, "2025-02".to_string()),
            ]
        );
        assert!(sweep.partitions.iter().all(PartitionReport::passed));
    }

    #[test]
    fn test_sweep_fails_on_unparseable_partition_dir() {
        let (_dir, store, validator) = setup();
        let fp = FileFingerprint::from_bytes(b"v1");
        let stray = store.table_dir(TableKind::LeaseRate).join("as_of_month=1899-12");
        fs::create_dir_all(&stray).unwrap();
        let batch = SuiteSnapshotFact::to_batch(&[suite("101A", 500.0, &fp)]).unwrap();
        write_batch(&stray.join("raw_lease_rate_snapshot_1899-12_x.parquet"), &batch).unwrap();

        let logger = MemoryLogger::new();
        let sweep = validator.validate_all(&store, &logger);
        assert!(!sweep.passed());
        assert_eq!(sweep.errors.len(), 1);
        assert_eq!(sweep.errors[0].0, TableKind::LeaseRate);
        assert!(sweep.errors[0].1.contains("as_of_month=1899-12"));
        assert!(logger.contains(LogLevel::Warn, "Unrecognized partition directory"));
    }

    #[test]
    fn test_large_utf8_columns_get_value_checks() {
        let (_dir, store, validator) = setup();
        let fp = FileFingerprint::from_bytes(b"v1");
        let batch = SuiteSnapshotFact::to_batch(&[suite("101A", 500.0, &fp), suite("101A", 500.0, &fp)]).unwrap();
        let mut columns = batch.columns().to_vec();
        columns[1] = Arc::new(StringArray::from(vec![Some("C"), None]));

        let mut fields = Vec::new();
        let mut large = Vec::new();
        for (field, column) in batch.schema().fields().iter().zip(columns) {
            if field.data_type() == &DataType::Utf8 {
                fields.push(Field::new(field.name(), DataType::LargeUtf8, field.is_nullable()));
                large.push(arrow::compute::cast(&column, &DataType::LargeUtf8).unwrap());
            } else {
                fields.push(field.as_ref().clone());
                large.push(column);
            }
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), large).unwrap();
        let part = store.partition_dir(TableKind::LeaseRate, period());
        fs::create_dir_all(&part).unwrap();
        write_batch(&part.join("raw_lease_rate_snapshot_2025-02_large.parquet"), &batch).unwrap();

        let logger = MemoryLogger::new();
        let report = validator
            .validate_partition(&store, TableKind::LeaseRate, period(), &logger)
            .unwrap();
        assert_eq!(report.violations.len(), 2, "{:?}", report.violations);
        assert!(report
            .violations
            .iter()
            .any(|v| v.column == "building" && v.row == Some(0) && v.message.contains("'C'")));
        assert!(report
            .violations
            .iter()
            .any(|v| v.column == "suite_id" && v.row == Some(1) && v.message.contains("duplicate")));
    }
}
