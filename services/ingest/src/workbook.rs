//! Read-only, in-memory view of a workbook.
//!
//! Every sheet is loaded once with calamine. Coordinates handed to [`Sheet::at`]
//! are 1-based Excel coordinates; calamine ranges do not necessarily start at
//! A1, so lookups go through absolute positions.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Datelike, NaiveDate};

use crate::error::{IngestError, Result};

#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    cells: Range<Data>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, cells: Range<Data>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Builds a sheet from `((row, col), value)` pairs in 1-based coordinates.
    pub fn from_cells(name: impl Into<String>, cells: Vec<((u32, u32), Data)>) -> Self {
        let max_row = cells.iter().map(|((r, _), _)| *r).max().unwrap_or(1).max(1);
        let max_col = cells.iter().map(|((_, c), _)| *c).max().unwrap_or(1).max(1);
        let mut range = Range::new((0, 0), (max_row - 1, max_col - 1));
        for ((row, col), value) in cells {
            if row >= 1 && col >= 1 {
                range.set_value((row - 1, col - 1), value);
            }
        }
        Self::new(name, range)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell at a 1-based (row, col); `None` outside the used range.
    pub fn at(&self, row: u32, col: u32) -> Option<&Data> {
        let (r, c) = (row.checked_sub(1)?, col.checked_sub(1)?);
        self.cells.get_value((r, c))
    }

    /// Last used row, 1-based; 0 for an empty sheet.
    pub fn last_row(&self) -> u32 {
        self.cells.end().map(|(r, _)| r + 1).unwrap_or(0)
    }

    /// Last used column, 1-based; 0 for an empty sheet.
    pub fn last_col(&self) -> u32 {
        self.cells.end().map(|(_, c)| c + 1).unwrap_or(0)
    }

    pub fn number(&self, row: u32, col: u32) -> Option<f64> {
        self.at(row, col).and_then(cell_number)
    }

    pub fn text(&self, row: u32, col: u32) -> Option<String> {
        self.at(row, col).and_then(cell_text)
    }

    pub fn date(&self, row: u32, col: u32) -> Option<NaiveDate> {
        self.at(row, col).and_then(cell_date)
    }

    pub fn is_blank_row(&self, row: u32) -> bool {
        (1..=self.last_col()).all(|col| self.at(row, col).map_or(true, is_blank))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    /// Every sheet name in workbook order, readable or not.
    names: Vec<String>,
    sheets: Vec<Sheet>,
    /// Sheets calamine failed to load, with the reason.
    unreadable: Vec<(String, String)>,
}

impl Workbook {
    /// Opens xls/xlsx/xlsb/ods and loads every sheet. A sheet calamine
    /// cannot read is remembered with its error instead of failing the open.
    pub fn open(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let names = workbook.sheet_names().to_vec();

        let mut sheets = Vec::with_capacity(names.len());
        let mut unreadable = Vec::new();
        for name in &names {
            match workbook.worksheet_range(name) {
                Ok(range) => sheets.push(Sheet::new(name.clone(), range)),
                Err(e) => unreadable.push((name.clone(), e.to_string())),
            }
        }
        Ok(Self {
            names,
            sheets,
            unreadable,
        })
    }

    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self {
            names: sheets.iter().map(|s| s.name.clone()).collect(),
            sheets,
            unreadable: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_unreadable_sheet(mut self, name: &str, reason: &str) -> Self {
        self.names.push(name.to_string());
        self.unreadable.push((name.to_string(), reason.to_string()));
        self
    }

    /// Sheet names in workbook order, including sheets that failed to load.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Like [`Workbook::sheet`], but a sheet that exists and failed to load
    /// is an error rather than a miss.
    pub fn try_sheet(&self, name: &str) -> Result<Option<&Sheet>> {
        if let Some((_, reason)) = self.unreadable.iter().find(|(n, _)| n == name) {
            return Err(IngestError::UnreadableSheet {
                sheet: name.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.sheet(name))
    }

    /// Loaded sheets only.
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn unreadable_sheets(&self) -> &[(String, String)] {
        &self.unreadable
    }
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Numeric value of a cell. Text is accepted when it reads as a number once
/// currency symbols and thousands separators are removed; anything else is
/// absent rather than an error.
pub fn cell_number(cell: &Data) -> Option<f64> {
    let value = match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Trimmed text of a cell. Whole numbers render without a decimal part so a
/// suite typed as `101` reads back as "101".
pub fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::DateTime(_) => cell_date(cell)?.format("%Y-%m-%d").to_string(),
        Data::Error(_) | Data::Empty => return None,
    };
    (!text.is_empty()).then_some(text)
}

pub fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.date()),
        Data::DateTimeIso(s) | Data::String(s) => parse_date_text(s),
        _ => None,
    }
}

/// Best-effort date parsing for the shapes seen in hand-kept workbooks.
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    // ISO timestamps: keep the date part.
    let head = s.get(..10).unwrap_or(s);
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // Month-only forms: "2025-03", "March 2025", "Mar 2025".
    for fmt in ["%Y-%m-%d", "%d %B %Y", "%d %b %Y"] {
        let candidate = if fmt == "%Y-%m-%d" {
            format!("{s}-01")
        } else {
            format!("1 {s}")
        };
        if let Ok(d) = NaiveDate::parse_from_str(&candidate, fmt) {
            return Some(d);
        }
    }
    None
}

/// Month number for a header label. Accepts English and Spanish month names,
/// their three-letter abbreviations, and date-typed cells.
pub fn month_of_label(cell: &Data) -> Option<u32> {
    if let Data::DateTime(_) | Data::DateTimeIso(_) = cell {
        return cell_date(cell).map(|d| d.month());
    }
    let label = cell_text(cell)?.to_lowercase();
    let label = label.trim_end_matches('.');
    let month = match label {
        "january" | "jan" | "enero" | "ene" => 1,
        "february" | "feb" | "febrero" => 2,
        "march" | "mar" | "marzo" => 3,
        "april" | "apr" | "abril" | "abr" => 4,
        "may" | "mayo" => 5,
        "june" | "jun" | "junio" => 6,
        "july" | "jul" | "julio" => 7,
        "august" | "aug" | "agosto" | "ago" => 8,
        "september" | "sep" | "sept" | "septiembre" | "setiembre" => 9,
        "october" | "oct" | "octubre" => 10,
        "november" | "nov" | "noviembre" => 11,
        "december" | "dec" | "diciembre" | "dic" => 12,
        _ => return None,
    };
    Some(month)
}
