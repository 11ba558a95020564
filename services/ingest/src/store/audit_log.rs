//! Append-only CSV log with one line per ingestion attempt.

use std::fs::{self, OpenOptions};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub run_id: String,
    #[serde(rename = "_file_sha256")]
    pub file_sha256: String,
    pub as_of_month: String,
    pub rows_ingested: usize,
    pub started_at: String,
    pub finished_at: String,
    pub status: RunStatus,
    pub detail: String,
}

/// Appends one entry, writing the header first when the log is new or empty.
pub fn append_entry(path: &Path, entry: &AuditEntry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(IngestError::io(parent))?;
    }
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(IngestError::io(path))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(entry)?;
    writer.flush().map_err(IngestError::io(path))?;
    Ok(())
}

/// All entries in file order; a missing log has none.
pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let entries = reader.deserialize().collect::<std::result::Result<Vec<AuditEntry>, _>>()?;
    Ok(entries)
}
