//! Fixed-layout extractors for the three bronze tables.
//!
//! Each extractor locates its sheet, reads it at the coordinates given by its
//! layout descriptor and returns either records or an explicit absence.
//! Cell coercion never fails an extraction; a cell that does not read as the
//! expected type is an absent value.

pub mod dashboard;
pub mod expenses;
pub mod lease;

use std::fmt;

use chrono::NaiveDate;

use crate::error::{IngestError, Result};
use crate::logger::IngestLogger;
use crate::period::ReportingPeriod;
use crate::records::AuditColumns;
use crate::workbook::{cell_text, month_of_label, Sheet};

pub use dashboard::extract_dashboard;
pub use expenses::extract_expenses;
pub use lease::extract_lease_snapshot;

/// Per-run values every extractor stamps onto its records.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub period: ReportingPeriod,
    pub audit: AuditColumns,
}

impl ExtractContext {
    pub fn new(period: ReportingPeriod, file_sha256: &str, ingested_at: &str) -> Self {
        Self {
            period,
            audit: AuditColumns {
                as_of_month: period.to_string(),
                file_sha256: file_sha256.to_string(),
                ingested_at: ingested_at.to_string(),
            },
        }
    }

    /// First day of `month` in the reporting year.
    pub(crate) fn month_date(&self, month: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.period.year(), month, 1)
    }
}

/// Columns of a header row whose label resolves to a month.
#[derive(Debug, Default)]
pub(crate) struct MonthHeader {
    /// `(column, month number)` in sheet order.
    pub columns: Vec<(u32, u32)>,
    pub unresolved: Vec<String>,
}

pub(crate) fn read_month_header(
    sheet: &Sheet,
    row: u32,
    first_col: u32,
    max_months: u32,
    skip_labels: &[String],
) -> MonthHeader {
    let mut header = MonthHeader::default();
    for col in first_col..first_col.saturating_add(max_months) {
        let Some(cell) = sheet.at(row, col) else {
            continue;
        };
        let Some(label) = cell_text(cell) else {
            continue;
        };
        if skip_labels.iter().any(|s| s.eq_ignore_ascii_case(&label)) {
            continue;
        }
        match month_of_label(cell) {
            Some(month) => header.columns.push((col, month)),
            None => header.unresolved.push(label),
        }
    }
    header
}

#[derive(Debug, Clone, PartialEq)]
pub enum Absence {
    SheetNotFound { patterns: Vec<String> },
    /// The sheet exists but the layout found nothing to read.
    NoData(String),
}

impl fmt::Display for Absence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SheetNotFound { patterns } => write!(f, "no sheet matches {patterns:?}"),
            Self::NoData(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Records(Vec<T>),
    Absent { reason: Absence },
}

impl<T> Extraction<T> {
    pub fn no_data(reason: impl Into<String>) -> Self {
        Self::Absent {
            reason: Absence::NoData(reason.into()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent { .. })
    }

    /// Records of a source the run cannot do without; absence is fatal.
    pub fn required(self, source_name: &'static str) -> Result<Vec<T>> {
        match self {
            Self::Records(rows) => Ok(rows),
            Self::Absent {
                reason: Absence::SheetNotFound { patterns },
            } => Err(IngestError::MissingSheet {
                source_name,
                patterns,
            }),
            Self::Absent {
                reason: Absence::NoData(reason),
            } => Err(IngestError::NoData {
                source_name,
                reason,
            }),
        }
    }

    /// Records of a source the run may skip; absence is a warning.
    pub fn optional(self, source_name: &str, logger: &dyn IngestLogger) -> Vec<T> {
        match self {
            Self::Records(rows) => rows,
            Self::Absent { reason } => {
                logger.warn(&format!("Skipping {source_name}: {reason}"));
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{LogLevel, MemoryLogger};
    use calamine::Data;

    #[test]
    fn test_required_absence_maps_to_error() {
        let missing: Extraction<u8> = Extraction::Absent {
            reason: Absence::SheetNotFound {
                patterns: vec!["lease".to_string()],
            },
        };
        assert!(matches!(
            missing.required("lease_rate"),
            Err(IngestError::MissingSheet { source_name: "lease_rate", .. })
        ));

        let empty: Extraction<u8> = Extraction::no_data("no month labels in row 29");
        let err = empty.required("dashboard").unwrap_err();
        assert_eq!(err.to_string(), "no dashboard data extracted: no month labels in row 29");
    }

    #[test]
    fn test_optional_absence_warns() {
        let logger = MemoryLogger::new();
        let rows = Extraction::<u8>::no_data("no month labels in row 40").optional("expenses", &logger);
        assert!(rows.is_empty());
        assert!(logger.contains(LogLevel::Warn, "Skipping expenses: no month labels"));
    }

    #[test]
    fn test_context_month_date_uses_period_year() {
        let ctx = ExtractContext::new(ReportingPeriod::new(2025, 6).unwrap(), "sha256:ab", "t");
        assert_eq!(ctx.month_date(2), NaiveDate::from_ymd_opt(2025, 2, 1));
        assert_eq!(ctx.audit.as_of_month, "2025-06");
        assert_eq!(ctx.month_date(13), None);
    }

    #[test]
    fn test_month_header_skips_labels_and_blanks() {
        let cells = vec![
            ((29, 9), Data::String("Collection Target".to_string())),
            ((29, 11), Data::String("Enero".to_string())),
            ((29, 12), Data::String("Total".to_string())),
            ((29, 22), Data::String("March".to_string())),
        ];
        let sheet = Sheet::from_cells("Dashboard", cells);
        let skip = vec!["collection target".to_string()];
        let header = read_month_header(&sheet, 29, 9, 12, &skip);
        assert_eq!(header.columns, vec![(11, 1)]);
        assert_eq!(header.unresolved, vec!["Total".to_string()]);
    }
}
