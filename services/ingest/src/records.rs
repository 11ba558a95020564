//! Bronze record shapes and their columnar (Arrow) representation.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Date32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

pub const COL_AS_OF_MONTH: &str = "as_of_month";
pub const COL_FILE_SHA256: &str = "_file_sha256";
pub const COL_INGESTED_AT: &str = "_ingested_at";

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// The three bronze tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    Dashboard,
    Expenses,
    LeaseRate,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [Self::Dashboard, Self::Expenses, Self::LeaseRate];

    /// Directory name under the bronze root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Dashboard => "raw_dashboard_monthly",
            Self::Expenses => "raw_expenses_monthly",
            Self::LeaseRate => "raw_lease_rate_snapshot",
        }
    }

    /// Short name used in logs, errors and the CLI.
    pub fn source_name(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Expenses => "expenses",
            Self::LeaseRate => "lease_rate",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for TableKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.source_name() == s || t.dir_name() == s)
            .ok_or_else(|| IngestError::Config(format!("unknown table '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Fixed,
    Variable,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Variable => "variable",
            Self::Other => "other",
        }
    }
}

impl FromStr for ExpenseCategory {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "variable" => Ok(Self::Variable),
            "other" => Ok(Self::Other),
            other => Err(IngestError::Config(format!("unknown expense category '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Building {
    A,
    B,
}

impl Building {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            _ => None,
        }
    }
}

/// Provenance attached to every bronze row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditColumns {
    pub as_of_month: String,
    pub file_sha256: String,
    pub ingested_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyDashboardFact {
    pub month: NaiveDate,
    pub rent_base: Option<f64>,
    pub collected: Option<f64>,
    /// Negative when tenants prepaid.
    pub uncollected: Option<f64>,
    pub leased_sqft: Option<f64>,
    pub price_per_sf_yr: Option<f64>,
    pub audit: AuditColumns,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyExpenseFact {
    pub month: NaiveDate,
    pub item: String,
    pub actual: f64,
    pub category: ExpenseCategory,
    pub audit: AuditColumns,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuiteSnapshotFact {
    pub suite_id: String,
    pub building: Option<Building>,
    pub tenant: String,
    pub sqft: Option<f64>,
    pub rent_monthly: Option<f64>,
    pub rent_annual: Option<f64>,
    pub rent_psf_yr: Option<f64>,
    pub is_vacant: bool,
    pub is_own_use: bool,
    pub audit: AuditColumns,
}

/// A record shape that lives in one bronze table.
pub trait BronzeTable: Sized {
    const KIND: TableKind;

    fn arrow_schema() -> SchemaRef;
    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;
    /// `file` is only used to name the source in errors.
    fn from_batch(batch: &RecordBatch, file: &Path) -> Result<Vec<Self>>;
    fn audit(&self) -> &AuditColumns;
}

fn audit_fields() -> [Field; 3] {
    [
        Field::new(COL_AS_OF_MONTH, DataType::Utf8, false),
        Field::new(COL_FILE_SHA256, DataType::Utf8, false),
        Field::new(COL_INGESTED_AT, DataType::Utf8, false),
    ]
}

fn audit_arrays<T: BronzeTable>(rows: &[T]) -> [ArrayRef; 3] {
    [
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.audit().as_of_month.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.audit().file_sha256.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.audit().ingested_at.as_str()))),
    ]
}

fn read_audit(batch: &RecordBatch, file: &Path) -> Result<Vec<AuditColumns>> {
    let as_of = column::<StringArray>(batch, COL_AS_OF_MONTH, file)?;
    let sha = column::<StringArray>(batch, COL_FILE_SHA256, file)?;
    let at = column::<StringArray>(batch, COL_INGESTED_AT, file)?;
    Ok((0..batch.num_rows())
        .map(|i| AuditColumns {
            as_of_month: as_of.value(i).to_string(),
            file_sha256: sha.value(i).to_string(),
            ingested_at: at.value(i).to_string(),
        })
        .collect())
}

/// Looks up a column by name and downcasts it to the expected array type.
pub(crate) fn column<'a, A: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
    file: &Path,
) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<A>())
        .ok_or_else(|| IngestError::Column {
            file: file.to_path_buf(),
            column: name.to_string(),
        })
}

fn opt_f64(array: &Float64Array, i: usize) -> Option<f64> {
    (!array.is_null(i)).then(|| array.value(i))
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

fn dates(array: &Date32Array, i: usize, file: &Path, name: &str) -> Result<NaiveDate> {
    days_to_date(array.value(i)).ok_or_else(|| IngestError::Column {
        file: file.to_path_buf(),
        column: name.to_string(),
    })
}

impl BronzeTable for MonthlyDashboardFact {
    const KIND: TableKind = TableKind::Dashboard;

    fn arrow_schema() -> SchemaRef {
        let mut fields = vec![
            Field::new("month", DataType::Date32, false),
            Field::new("rent_base", DataType::Float64, true),
            Field::new("collected", DataType::Float64, true),
            Field::new("uncollected", DataType::Float64, true),
            Field::new("leased_sqft", DataType::Float64, true),
            Field::new("price_per_sf_yr", DataType::Float64, true),
        ];
        fields.extend(audit_fields());
        Arc::new(Schema::new(fields))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from_iter_values(rows.iter().map(|r| date_to_days(r.month)))),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.rent_base).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.collected).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.uncollected).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.leased_sqft).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.price_per_sf_yr).collect::<Vec<_>>())),
        ];
        columns.extend(audit_arrays(rows));
        Ok(RecordBatch::try_new(Self::arrow_schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch, file: &Path) -> Result<Vec<Self>> {
        let month = column::<Date32Array>(batch, "month", file)?;
        let rent_base = column::<Float64Array>(batch, "rent_base", file)?;
        let collected = column::<Float64Array>(batch, "collected", file)?;
        let uncollected = column::<Float64Array>(batch, "uncollected", file)?;
        let leased = column::<Float64Array>(batch, "leased_sqft", file)?;
        let price = column::<Float64Array>(batch, "price_per_sf_yr", file)?;

        read_audit(batch, file)?
            .into_iter()
            .enumerate()
            .map(|(i, audit)| {
                Ok(Self {
                    month: dates(month, i, file, "month")?,
                    rent_base: opt_f64(rent_base, i),
                    collected: opt_f64(collected, i),
                    uncollected: opt_f64(uncollected, i),
                    leased_sqft: opt_f64(leased, i),
                    price_per_sf_yr: opt_f64(price, i),
                    audit,
                })
            })
            .collect()
    }

    fn audit(&self) -> &AuditColumns {
        &self.audit
    }
}

impl BronzeTable for MonthlyExpenseFact {
    const KIND: TableKind = TableKind::Expenses;

    fn arrow_schema() -> SchemaRef {
        let mut fields = vec![
            Field::new("month", DataType::Date32, false),
            Field::new("item", DataType::Utf8, false),
            Field::new("actual", DataType::Float64, true),
            Field::new("expense_category", DataType::Utf8, false),
        ];
        fields.extend(audit_fields());
        Arc::new(Schema::new(fields))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from_iter_values(rows.iter().map(|r| date_to_days(r.month)))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.item.as_str()))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.actual))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.category.as_str()))),
        ];
        columns.extend(audit_arrays(rows));
        Ok(RecordBatch::try_new(Self::arrow_schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch, file: &Path) -> Result<Vec<Self>> {
        let month = column::<Date32Array>(batch, "month", file)?;
        let item = column::<StringArray>(batch, "item", file)?;
        let actual = column::<Float64Array>(batch, "actual", file)?;
        let category = column::<StringArray>(batch, "expense_category", file)?;

        read_audit(batch, file)?
            .into_iter()
            .enumerate()
            .map(|(i, audit)| {
                Ok(Self {
                    month: dates(month, i, file, "month")?,
                    item: item.value(i).to_string(),
                    actual: actual.value(i),
                    category: category.value(i).parse()?,
                    audit,
                })
            })
            .collect()
    }

    fn audit(&self) -> &AuditColumns {
        &self.audit
    }
}

impl BronzeTable for SuiteSnapshotFact {
    const KIND: TableKind = TableKind::LeaseRate;

    fn arrow_schema() -> SchemaRef {
        let mut fields = vec![
            Field::new("suite_id", DataType::Utf8, false),
            Field::new("building", DataType::Utf8, true),
            Field::new("tenant", DataType::Utf8, false),
            Field::new("sqft", DataType::Float64, true),
            Field::new("rent_monthly", DataType::Float64, true),
            Field::new("rent_annual", DataType::Float64, true),
            Field::new("rent_psf_yr", DataType::Float64, true),
            Field::new("is_vacant", DataType::Boolean, false),
            Field::new("is_own_use", DataType::Boolean, false),
        ];
        fields.extend(audit_fields());
        Arc::new(Schema::new(fields))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.suite_id.as_str()))),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.building.map(Building::as_str)).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.tenant.as_str()))),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.sqft).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.rent_monthly).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.rent_annual).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.rent_psf_yr).collect::<Vec<_>>())),
            Arc::new(BooleanArray::from(rows.iter().map(|r| r.is_vacant).collect::<Vec<_>>())),
            Arc::new(BooleanArray::from(rows.iter().map(|r| r.is_own_use).collect::<Vec<_>>())),
        ];
        columns.extend(audit_arrays(rows));
        Ok(RecordBatch::try_new(Self::arrow_schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch, file: &Path) -> Result<Vec<Self>> {
        let suite = column::<StringArray>(batch, "suite_id", file)?;
        let building = column::<StringArray>(batch, "building", file)?;
        let tenant = column::<StringArray>(batch, "tenant", file)?;
        let sqft = column::<Float64Array>(batch, "sqft", file)?;
        let monthly = column::<Float64Array>(batch, "rent_monthly", file)?;
        let annual = column::<Float64Array>(batch, "rent_annual", file)?;
        let psf = column::<Float64Array>(batch, "rent_psf_yr", file)?;
        let vacant = column::<BooleanArray>(batch, "is_vacant", file)?;
        let own_use = column::<BooleanArray>(batch, "is_own_use", file)?;

        Ok(read_audit(batch, file)?
            .into_iter()
            .enumerate()
            .map(|(i, audit)| Self {
                suite_id: suite.value(i).to_string(),
                building: if building.is_null(i) {
                    None
                } else {
                    Building::parse(building.value(i))
                },
                tenant: tenant.value(i).to_string(),
                sqft: opt_f64(sqft, i),
                rent_monthly: opt_f64(monthly, i),
                rent_annual: opt_f64(annual, i),
                rent_psf_yr: opt_f64(psf, i),
                is_vacant: vacant.value(i),
                is_own_use: own_use.value(i),
                audit,
            })
            .collect())
    }

    fn audit(&self) -> &AuditColumns {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit() -> AuditColumns {
        AuditColumns {
            as_of_month: "2025-03".to_string(),
            file_sha256: "sha256:abc".to_string(),
            ingested_at: "2025-03-05T10:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_date32_conversion_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(epoch), 0);
        let d = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(days_to_date(date_to_days(d)), Some(d));
    }

    #[test]
    fn test_suite_batch_keeps_null_building() {
        let rows = vec![SuiteSnapshotFact {
            suite_id: "999".to_string(),
            building: None,
            tenant: "Acme".to_string(),
            sqft: Some(250.0),
            rent_monthly: None,
            rent_annual: Some(6000.0),
            rent_psf_yr: Some(24.0),
            is_vacant: false,
            is_own_use: false,
            audit: audit(),
        }];
        let batch = SuiteSnapshotFact::to_batch(&rows).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 12);

        let back = SuiteSnapshotFact::from_batch(&batch, Path::new("mem")).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_from_batch_reports_missing_column() {
        let rows = vec![MonthlyExpenseFact {
            month: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            item: "Water".to_string(),
            actual: 120.5,
            category: ExpenseCategory::Fixed,
            audit: audit(),
        }];
        let batch = MonthlyExpenseFact::to_batch(&rows).unwrap();
        let err = MonthlyDashboardFact::from_batch(&batch, Path::new("x.parquet")).unwrap_err();
        assert!(err.to_string().contains("rent_base"));
    }

    #[test]
    fn test_table_kind_parse() {
        assert_eq!("lease_rate".parse::<TableKind>().unwrap(), TableKind::LeaseRate);
        assert_eq!(
            "raw_expenses_monthly".parse::<TableKind>().unwrap(),
            TableKind::Expenses
        );
        assert!("gold".parse::<TableKind>().is_err());
    }
}
