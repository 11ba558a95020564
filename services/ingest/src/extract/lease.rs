//! Suite-level lease snapshot from the lease/rate sheet.

use std::collections::HashMap;

use crate::classify::{extract_building, TextClassifier};
use crate::config::IngestRules;
use crate::error::Result;
use crate::locate::pick_sheet;
use crate::logger::IngestLogger;
use crate::normalize::normalize_columns;
use crate::records::SuiteSnapshotFact;
use crate::workbook::{Sheet, Workbook};

use super::{Absence, ExtractContext, Extraction};

pub fn extract_lease_snapshot(
    workbook: &Workbook,
    rules: &IngestRules,
    ctx: &ExtractContext,
    logger: &dyn IngestLogger,
) -> Result<Extraction<SuiteSnapshotFact>> {
    let names = workbook.sheet_names();
    let sheet = match pick_sheet(&names, &rules.sheets.lease_rate, logger) {
        Some(name) => workbook.try_sheet(name)?,
        None => None,
    };
    let Some(sheet) = sheet else {
        return Ok(Extraction::Absent {
            reason: Absence::SheetNotFound {
                patterns: rules.sheets.lease_rate.clone(),
            },
        });
    };
    let records = read_lease_snapshot(sheet, rules, ctx, logger);
    if records.is_empty() {
        return Ok(Extraction::no_data(format!(
            "no suite rows below header row {} of '{}'",
            rules.lease.header_row,
            sheet.name()
        )));
    }
    Ok(Extraction::Records(records))
}

/// Column positions by canonical name; the first occurrence wins.
struct HeaderIndex(HashMap<String, u32>);

impl HeaderIndex {
    fn read(sheet: &Sheet, row: u32, rules: &IngestRules) -> Self {
        let labels: Vec<String> = (1..=sheet.last_col())
            .map(|col| sheet.text(row, col).unwrap_or_default())
            .collect();
        let mut index = HashMap::new();
        for (i, name) in normalize_columns(&labels, &rules.column_aliases).into_iter().enumerate() {
            if !name.is_empty() {
                index.entry(name).or_insert(i as u32 + 1);
            }
        }
        Self(index)
    }

    fn col(&self, name: &str) -> Option<u32> {
        self.0.get(name).copied()
    }
}

pub fn read_lease_snapshot(
    sheet: &Sheet,
    rules: &IngestRules,
    ctx: &ExtractContext,
    logger: &dyn IngestLogger,
) -> Vec<SuiteSnapshotFact> {
    let layout = &rules.lease;
    let header = HeaderIndex::read(sheet, layout.header_row, rules);
    let classifier = TextClassifier::new(&rules.vacancy_phrases, &rules.own_use_phrases);

    let suite_col = header.col("suite_id");
    let tenant_col = header.col("tenant");
    if suite_col.is_none() {
        logger.warn(&format!(
            "No suite column in '{}'; assigning {}<n> ids",
            sheet.name(),
            layout.placeholder_prefix
        ));
    }
    // An absent amount column reads as zero for every suite.
    let amount = |name: &str, row: u32| match header.col(name) {
        Some(col) => sheet.number(row, col),
        None => Some(0.0),
    };

    let mut records = Vec::new();
    let mut position = 0usize;
    for row in (layout.header_row + 1)..=sheet.last_row() {
        if sheet.is_blank_row(row) {
            continue;
        }
        position += 1;

        let suite_id = match suite_col {
            Some(col) => sheet.text(row, col).unwrap_or_default(),
            None => format!("{}{position}", layout.placeholder_prefix),
        };
        if suite_id.is_empty() {
            continue;
        }
        let tenant = match tenant_col {
            Some(col) => sheet.text(row, col).unwrap_or_default(),
            None => layout.unknown_tenant.clone(),
        };

        let sqft = amount("sqft", row);
        let rent_annual = amount("rent_annual", row);
        let rent_psf_yr = match sqft {
            Some(area) if area > 0.0 => rent_annual.map(|annual| annual / area),
            _ => Some(0.0),
        };

        records.push(SuiteSnapshotFact {
            building: extract_building(&suite_id),
            is_vacant: classifier.is_vacant(Some(&tenant)),
            is_own_use: classifier.is_own_use(Some(&tenant), &suite_id),
            suite_id,
            tenant,
            sqft,
            rent_monthly: amount("rent_monthly", row),
            rent_annual,
            rent_psf_yr,
            audit: ctx.audit.clone(),
        });
    }

    logger.info(&format!(
        "Extracted {} lease records ({} vacant, {} own-use)",
        records.len(),
        records.iter().filter(|r| r.is_vacant).count(),
        records.iter().filter(|r| r.is_own_use).count()
    ));
    records
}
