//! One ingestion run: workbook in, bronze partitions and an audit line out.
//!
//! Every required extraction finishes before anything is written, so a
//! failed run leaves no partial version behind that the duplicate guard
//! would later mistake for a completed one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::extract::{extract_dashboard, extract_expenses, extract_lease_snapshot, ExtractContext};
use crate::fingerprint::{already_ingested, FileFingerprint};
use crate::locate::pick_sheet;
use crate::logger::IngestLogger;
use crate::period::{detect_period, DetectedPeriod, ReportingPeriod};
use crate::records::{BronzeTable, TableKind};
use crate::store::audit_log::{append_entry, AuditEntry, RunStatus};
use crate::store::{PartitionStore, WriteOutcome};
use crate::summary::RentRollSummary;
use crate::workbook::Workbook;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Extract and report, but write neither partitions nor the audit log.
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub fingerprint: FileFingerprint,
    pub period: DetectedPeriod,
    /// Rows extracted per table (written too unless this was a dry run).
    pub rows: BTreeMap<TableKind, usize>,
    /// Files created by this run; files left by an interrupted earlier run
    /// of the same workbook are not listed.
    pub written: Vec<PathBuf>,
    pub summary: Option<RentRollSummary>,
    pub dry_run: bool,
}

impl IngestOutcome {
    pub fn total_rows(&self) -> usize {
        self.rows.values().sum()
    }
}

/// What is known about the run so far; feeds the audit line on every path.
struct RunState {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    fingerprint: Option<FileFingerprint>,
    period: Option<DetectedPeriod>,
    rows_written: usize,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    logger: &'a dyn IngestLogger,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, logger: &'a dyn IngestLogger) -> Self {
        Self { config, logger }
    }

    pub fn store(&self) -> PartitionStore {
        PartitionStore::new(self.config.bronze_dir())
    }

    pub fn run(&self, file: &Path, options: RunOptions) -> Result<IngestOutcome> {
        let mut state = RunState {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            fingerprint: None,
            period: None,
            rows_written: 0,
        };
        self.logger.info(&format!("Ingestion run {} for {}", state.run_id, file.display()));

        match self.execute(file, options, &mut state) {
            Ok(outcome) => {
                if !options.dry_run {
                    let detail = success_detail(&outcome);
                    self.record(&state, outcome.status, detail)?;
                }
                Ok(outcome)
            }
            Err(e) => {
                self.logger.error(&format!("Ingestion failed: {e}"));
                if !options.dry_run {
                    if let Err(log_err) = self.record(&state, RunStatus::Failed, e.to_string()) {
                        self.logger.error(&format!("Could not append to ingestion log: {log_err}"));
                    }
                }
                Err(e)
            }
        }
    }

    fn execute(&self, file: &Path, options: RunOptions, state: &mut RunState) -> Result<IngestOutcome> {
        let rules = &self.config.rules;
        let fingerprint = FileFingerprint::compute(file)?;
        self.logger.info(&format!("File fingerprint: {fingerprint}"));
        state.fingerprint = Some(fingerprint.clone());

        let workbook = Workbook::open(file)?;
        for (sheet, reason) in workbook.unreadable_sheets() {
            self.logger.warn(&format!("Could not read sheet '{sheet}': {reason}"));
        }
        let names = workbook.sheet_names();
        let dashboard_sheet = pick_sheet(&names, &rules.sheets.dashboard, self.logger)
            .and_then(|name| workbook.sheet(name));
        let detected = detect_period(&workbook, dashboard_sheet, file, &rules.period, self.logger);
        let period = detected.period;
        state.period = Some(detected.clone());

        let store = self.store();
        let mut outcome = IngestOutcome {
            run_id: state.run_id,
            status: RunStatus::Success,
            fingerprint: fingerprint.clone(),
            period: detected,
            rows: BTreeMap::new(),
            written: Vec::new(),
            summary: None,
            dry_run: options.dry_run,
        };

        if already_ingested(&store, &fingerprint, period, self.logger)? {
            self.logger.info("File already ingested, skipping");
            outcome.status = RunStatus::Skipped;
            return Ok(outcome);
        }

        let ctx = ExtractContext::new(period, fingerprint.as_str(), &Utc::now().to_rfc3339());
        let dashboard = extract_dashboard(&workbook, rules, &ctx, self.logger)?
            .required(TableKind::Dashboard.source_name())?;
        let expenses = match extract_expenses(&workbook, rules, &ctx, self.logger) {
            Ok(extraction) => extraction.optional(TableKind::Expenses.source_name(), self.logger),
            Err(e) => {
                self.logger.warn(&format!("Failed to extract expenses: {e}"));
                Vec::new()
            }
        };
        if expenses.is_empty() {
            self.logger.warn("No expense data extracted");
        }
        let lease = extract_lease_snapshot(&workbook, rules, &ctx, self.logger)?
            .required(TableKind::LeaseRate.source_name())?;

        outcome.rows.insert(TableKind::Dashboard, dashboard.len());
        outcome.rows.insert(TableKind::Expenses, expenses.len());
        outcome.rows.insert(TableKind::LeaseRate, lease.len());

        let summary = RentRollSummary::from_snapshot(&lease, self.config.total_sqft);
        self.logger.info(&format!("Rent roll {period}: {summary}"));
        outcome.summary = Some(summary);

        if options.dry_run {
            self.logger.info(&format!(
                "Dry run: {} rows extracted for {period}, nothing written",
                outcome.total_rows()
            ));
            return Ok(outcome);
        }

        // The dashboard file is what the duplicate guard looks for, so it
        // goes last: an interrupted run is retried rather than skipped.
        self.persist(&store, &lease, period, &fingerprint, state, &mut outcome)?;
        self.persist(&store, &expenses, period, &fingerprint, state, &mut outcome)?;
        self.persist(&store, &dashboard, period, &fingerprint, state, &mut outcome)?;

        self.logger.info(&format!(
            "Bronze ingestion completed for {period} ({} total rows)",
            outcome.total_rows()
        ));
        Ok(outcome)
    }

    fn persist<T: BronzeTable>(
        &self,
        store: &PartitionStore,
        records: &[T],
        period: ReportingPeriod,
        fingerprint: &FileFingerprint,
        state: &mut RunState,
        outcome: &mut IngestOutcome,
    ) -> Result<()> {
        match store.write(records, period, fingerprint)? {
            Some(WriteOutcome::Written(path)) => {
                self.logger.info(&format!("Saved {} rows to {}", records.len(), path.display()));
                state.rows_written += records.len();
                outcome.written.push(path);
            }
            Some(WriteOutcome::Existing(path)) => {
                self.logger
                    .info(&format!("Keeping {} from an earlier run of this file", path.display()));
            }
            None => {}
        }
        Ok(())
    }

    fn record(&self, state: &RunState, status: RunStatus, detail: String) -> Result<()> {
        let entry = AuditEntry {
            run_id: state.run_id.to_string(),
            file_sha256: state
                .fingerprint
                .as_ref()
                .map(|f| f.as_str().to_string())
                .unwrap_or_default(),
            as_of_month: state
                .period
                .as_ref()
                .map(|p| p.period.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            rows_ingested: state.rows_written,
            started_at: state.started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            status,
            detail,
        };
        append_entry(&self.config.ingestion_log_path(), &entry)
    }
}

fn success_detail(outcome: &IngestOutcome) -> String {
    let mut parts: Vec<String> = Vec::new();
    if outcome.status == RunStatus::Skipped {
        parts.push("already ingested".to_string());
    } else {
        parts.extend(
            outcome
                .rows
                .iter()
                .map(|(table, rows)| format!("{}={rows}", table.source_name())),
        );
    }
    parts.push(format!("period from {}", outcome.period.source.as_str()));
    parts.join("; ")
}
