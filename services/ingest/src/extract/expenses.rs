//! Monthly expense lines from the block under the dashboard metrics.

use crate::config::{ExpenseLayout, IngestRules};
use crate::error::Result;
use crate::locate::pick_sheet;
use crate::logger::IngestLogger;
use crate::records::{ExpenseCategory, MonthlyExpenseFact};
use crate::workbook::{Sheet, Workbook};

use super::{read_month_header, Absence, ExtractContext, Extraction};

pub fn extract_expenses(
    workbook: &Workbook,
    rules: &IngestRules,
    ctx: &ExtractContext,
    logger: &dyn IngestLogger,
) -> Result<Extraction<MonthlyExpenseFact>> {
    let names = workbook.sheet_names();
    let sheet = match pick_sheet(&names, &rules.sheets.expenses, logger) {
        Some(name) => workbook.try_sheet(name)?,
        None => None,
    };
    let Some(sheet) = sheet else {
        return Ok(Extraction::Absent {
            reason: Absence::SheetNotFound {
                patterns: rules.sheets.expenses.clone(),
            },
        });
    };
    Ok(read_expenses(sheet, &rules.expenses, ctx, logger))
}

/// One record per (line, month) with a numeric amount. A non-empty label in
/// the label column wins over the configured one.
pub fn read_expenses(
    sheet: &Sheet,
    layout: &ExpenseLayout,
    ctx: &ExtractContext,
    logger: &dyn IngestLogger,
) -> Extraction<MonthlyExpenseFact> {
    let header = read_month_header(sheet, layout.header_row, layout.first_month_col, layout.max_months, &[]);
    if header.columns.is_empty() {
        return Extraction::no_data(format!(
            "no month labels in row {} of '{}'",
            layout.header_row,
            sheet.name()
        ));
    }
    for label in &header.unresolved {
        logger.warn(&format!("Dropping expense column with unrecognized month '{label}'"));
    }

    let mut records = Vec::new();
    for line in &layout.lines {
        let item = sheet
            .text(line.row, layout.label_col)
            .unwrap_or_else(|| line.label.clone());
        for &(col, month) in &header.columns {
            let (Some(actual), Some(month)) = (sheet.number(line.row, col), ctx.month_date(month)) else {
                continue;
            };
            records.push(MonthlyExpenseFact {
                month,
                item: item.clone(),
                actual,
                category: line.category,
                audit: ctx.audit.clone(),
            });
        }
    }

    let count = |c: ExpenseCategory| records.iter().filter(|r| r.category == c).count();
    logger.info(&format!(
        "Extracted {} expense records (fixed {}, variable {}, other {})",
        records.len(),
        count(ExpenseCategory::Fixed),
        count(ExpenseCategory::Variable),
        count(ExpenseCategory::Other)
    ));
    Extraction::Records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::ReportingPeriod;
    use crate::logger::MemoryLogger;
    use calamine::Data;
    use chrono::NaiveDate;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn ctx() -> ExtractContext {
        ExtractContext::new(ReportingPeriod::new(2025, 2).unwrap(), "sha256:feed", "t")
    }

    #[test]
    fn test_lines_across_categories() {
        let logger = MemoryLogger::new();
        let sheet = Sheet::from_cells(
            "Dashboard 2025",
            vec![
                ((40, 9), s("January")),
                ((40, 10), s("February")),
                ((42, 5), s("Electricity (FPL)")),
                ((42, 9), Data::Float(310.5)),
                ((42, 10), Data::Float(295.0)),
                ((53, 9), s("$1,200")),
                ((68, 10), Data::Int(5000)),
                ((45, 9), s("pending")),
            ],
        );
        let Extraction::Records(rows) = read_expenses(&sheet, &ExpenseLayout::default(), &ctx(), &logger) else {
            panic!("expected records");
        };

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].item, "Electricity (FPL)");
        assert_eq!(rows[0].category, ExpenseCategory::Fixed);
        assert_eq!(rows[1].month, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());

        let repairs = rows.iter().find(|r| r.item == "Repairs").unwrap();
        assert_eq!(repairs.actual, 1200.0);
        assert_eq!(repairs.category, ExpenseCategory::Variable);

        let capex = rows.iter().find(|r| r.item == "CAPEX").unwrap();
        assert_eq!(capex.category, ExpenseCategory::Other);
        assert_eq!(capex.month, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());

        // "pending" is not an amount.
        assert!(rows.iter().all(|r| r.item != "Water"));
    }

    #[test]
    fn test_header_without_values_yields_no_rows() {
        let logger = MemoryLogger::new();
        let sheet = Sheet::from_cells("Dashboard", vec![((40, 9), s("Enero"))]);
        let extraction = read_expenses(&sheet, &ExpenseLayout::default(), &ctx(), &logger);
        assert_eq!(extraction, Extraction::Records(Vec::new()));
    }

    #[test]
    fn test_missing_header_is_absent() {
        let logger = MemoryLogger::new();
        let sheet = Sheet::from_cells("Dashboard", vec![((42, 9), Data::Float(10.0))]);
        let extraction = read_expenses(&sheet, &ExpenseLayout::default(), &ctx(), &logger);
        assert!(extraction.is_absent());
    }

    #[test]
    fn test_missing_sheet_is_absent() {
        let logger = MemoryLogger::new();
        let workbook = Workbook::from_sheets(vec![Sheet::from_cells("Lease Rate", vec![((1, 1), s("x"))])]);
        let extraction = extract_expenses(&workbook, &IngestRules::default(), &ctx(), &logger).unwrap();
        assert!(matches!(
            extraction,
            Extraction::Absent {
                reason: Absence::SheetNotFound { .. }
            }
        ));
    }
}
