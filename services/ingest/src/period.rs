//! Reporting period (`YYYY-MM`) of a workbook snapshot.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use calamine::Data;
use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::config::PeriodRules;
use crate::error::{IngestError, Result};
use crate::logger::IngestLogger;
use crate::workbook::{cell_date, Sheet, Workbook};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportingPeriod {
    year: i32,
    month: u32,
}

impl ReportingPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1900..=9999).contains(&year) {
            return Err(IngestError::InvalidPeriod(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// Fails for years outside 1900..=9999, e.g. the 1899-12-30 that a
    /// time-only cell reads as.
    pub fn from_date(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), date.month())
    }

    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Partition directory name, `as_of_month=YYYY-MM`.
    pub fn partition_name(&self) -> String {
        format!("as_of_month={self}")
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for ReportingPeriod {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || IngestError::InvalidPeriod(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

/// Where a detected period came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodSource {
    DashboardMonthColumn,
    PeriodCell { sheet: String },
    FileName,
    /// Nothing in the workbook or its name gave a period.
    CurrentMonthFallback,
}

impl PeriodSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DashboardMonthColumn => "dashboard_month_column",
            Self::PeriodCell { .. } => "period_cell",
            Self::FileName => "file_name",
            Self::CurrentMonthFallback => "current_month_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPeriod {
    pub period: ReportingPeriod,
    pub source: PeriodSource,
}

impl DetectedPeriod {
    pub fn is_fallback(&self) -> bool {
        self.source == PeriodSource::CurrentMonthFallback
    }
}

/// Tries the dashboard month column, then any "Period" cell, then the file
/// name, and finally the current month with a warning.
pub fn detect_period(
    workbook: &Workbook,
    dashboard: Option<&Sheet>,
    file_path: &Path,
    rules: &PeriodRules,
    logger: &dyn IngestLogger,
) -> DetectedPeriod {
    let found = dashboard
        .and_then(|sheet| from_month_column(sheet, rules))
        .map(|period| (period, PeriodSource::DashboardMonthColumn))
        .or_else(|| {
            from_period_cell(workbook, rules)
                .map(|(period, sheet)| (period, PeriodSource::PeriodCell { sheet }))
        })
        .or_else(|| from_file_name(file_path).map(|period| (period, PeriodSource::FileName)));

    if let Some((period, source)) = found {
        logger.info(&format!("Detected as_of_month {period} from {}", source.as_str()));
        return DetectedPeriod { period, source };
    }

    let period = ReportingPeriod::current();
    logger.warn(&format!(
        "Could not detect as_of_month for {}; using current month {period}. \
         Partitioning for this run is unreliable",
        file_path.display()
    ));
    DetectedPeriod {
        period,
        source: PeriodSource::CurrentMonthFallback,
    }
}

/// First non-empty value under the `month` column of the dashboard table.
pub fn from_month_column(sheet: &Sheet, rules: &PeriodRules) -> Option<ReportingPeriod> {
    let header = rules.month_header_row;
    let label = rules.month_column_label.to_lowercase();
    let col = (1..=sheet.last_col())
        .find(|&c| sheet.text(header, c).is_some_and(|t| t.to_lowercase() == label))?;

    let first = ((header + 1)..=sheet.last_row()).find_map(|row| {
        sheet
            .at(row, col)
            .filter(|cell| !matches!(cell, Data::Empty))
            .filter(|cell| !matches!(cell, Data::String(s) if s.trim().is_empty()))
    })?;
    cell_date(first).and_then(|date| ReportingPeriod::from_date(date).ok())
}

/// A text cell mentioning the marker ("period"), with a date one or two
/// cells to its right. Only the first `scan_rows` rows of each sheet are read.
pub fn from_period_cell(workbook: &Workbook, rules: &PeriodRules) -> Option<(ReportingPeriod, String)> {
    let marker = rules.marker.to_lowercase();
    for sheet in workbook.sheets() {
        let last_row = sheet.last_row().min(rules.scan_rows);
        for row in 1..=last_row {
            for col in 1..=sheet.last_col() {
                let is_marker = matches!(
                    sheet.at(row, col),
                    Some(Data::String(s)) if s.to_lowercase().contains(&marker)
                );
                if !is_marker {
                    continue;
                }
                for offset in [1, 2] {
                    let period = sheet
                        .date(row, col + offset)
                        .and_then(|date| ReportingPeriod::from_date(date).ok());
                    if let Some(period) = period {
                        return Some((period, sheet.name().to_string()));
                    }
                }
            }
        }
    }
    None
}

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(20\d{2})[-_](\d{2})").expect("static regex"))
}

/// `YYYY-MM` or `YYYY_MM` anywhere in the file stem.
pub fn from_file_name(path: &Path) -> Option<ReportingPeriod> {
    let stem = path.file_stem()?.to_string_lossy();
    file_name_pattern().captures_iter(&stem).find_map(|caps| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        ReportingPeriod::new(year, month).ok()
    })
}
