//! Monthly rent metrics from the dashboard sheet.

use crate::config::{DashboardLayout, IngestRules};
use crate::error::Result;
use crate::locate::pick_sheet;
use crate::logger::IngestLogger;
use crate::records::MonthlyDashboardFact;
use crate::workbook::{Sheet, Workbook};

use super::{read_month_header, Absence, ExtractContext, Extraction};

pub fn extract_dashboard(
    workbook: &Workbook,
    rules: &IngestRules,
    ctx: &ExtractContext,
    logger: &dyn IngestLogger,
) -> Result<Extraction<MonthlyDashboardFact>> {
    let names = workbook.sheet_names();
    let sheet = match pick_sheet(&names, &rules.sheets.dashboard, logger) {
        Some(name) => workbook.try_sheet(name)?,
        None => None,
    };
    let Some(sheet) = sheet else {
        return Ok(Extraction::Absent {
            reason: Absence::SheetNotFound {
                patterns: rules.sheets.dashboard.clone(),
            },
        });
    };
    Ok(read_dashboard(sheet, &rules.dashboard, ctx, logger))
}

/// One record per month column of the header row. Months resolve with the
/// reporting period's year.
pub fn read_dashboard(
    sheet: &Sheet,
    layout: &DashboardLayout,
    ctx: &ExtractContext,
    logger: &dyn IngestLogger,
) -> Extraction<MonthlyDashboardFact> {
    let header = read_month_header(
        sheet,
        layout.header_row,
        layout.first_month_col,
        layout.max_months,
        &layout.skip_labels,
    );
    for label in &header.unresolved {
        logger.warn(&format!("Dropping dashboard column with unrecognized month '{label}'"));
    }
    if header.columns.is_empty() {
        return Extraction::no_data(format!(
            "no month labels in row {} of '{}'",
            layout.header_row,
            sheet.name()
        ));
    }

    let rows = &layout.rows;
    let records: Vec<MonthlyDashboardFact> = header
        .columns
        .iter()
        .filter_map(|&(col, month)| {
            Some(MonthlyDashboardFact {
                month: ctx.month_date(month)?,
                rent_base: sheet.number(rows.rent_base, col),
                collected: sheet.number(rows.collected, col),
                uncollected: sheet.number(rows.uncollected, col),
                leased_sqft: sheet.number(rows.leased_sqft, col),
                price_per_sf_yr: sheet.number(rows.price_per_sf_yr, col),
                audit: ctx.audit.clone(),
            })
        })
        .collect();

    logger.info(&format!(
        "Extracted {} monthly dashboard records from '{}'",
        records.len(),
        sheet.name()
    ));
    Extraction::Records(records)
}
