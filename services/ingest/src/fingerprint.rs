//! Content fingerprint of a source file and the duplicate-ingestion guard.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{IngestError, Result};
use crate::logger::IngestLogger;
use crate::period::ReportingPeriod;
use crate::records::TableKind;
use crate::store::PartitionStore;

const PREFIX: &str = "sha256:";

/// SHA-256 of the raw file bytes, rendered `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileFingerprint(String);

impl FileFingerprint {
    pub fn compute(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(IngestError::io(path))?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf).map_err(IngestError::io(path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(format!("{PREFIX}{:x}", hasher.finalize())))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("{PREFIX}{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, used to name partition files.
    pub fn short(&self) -> &str {
        let hex = self.0.strip_prefix(PREFIX).unwrap_or(&self.0);
        hex.get(..12).unwrap_or(hex)
    }
}

impl fmt::Display for FileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when any record file in the dashboard partition for `period` already
/// carries `fingerprint`. Every file of the partition is consulted.
pub fn already_ingested(
    store: &PartitionStore,
    fingerprint: &FileFingerprint,
    period: ReportingPeriod,
    logger: &dyn IngestLogger,
) -> Result<bool> {
    let seen = store.fingerprints(TableKind::Dashboard, period, logger)?;
    let duplicate = seen.contains(fingerprint.as_str());
    if duplicate {
        logger.info(&format!("File {fingerprint} already ingested for {period}"));
    }
    Ok(duplicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fingerprint_matches_known_digest() {
        let fp = FileFingerprint::from_bytes(b"abc");
        assert_eq!(
            fp.as_str(),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fp.short(), "ba7816bf8f01");
    }

    #[test]
    fn test_fingerprint_is_content_based() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("TCO Excel.xlsx");
        let b = dir.path().join("renamed copy.xlsx");
        std::fs::File::create(&a).unwrap().write_all(b"same bytes").unwrap();
        std::fs::File::create(&b).unwrap().write_all(b"same bytes").unwrap();

        let fa = FileFingerprint::compute(&a).unwrap();
        let fb = FileFingerprint::compute(&b).unwrap();
        assert_eq!(fa, fb);
        assert_eq!(fa, FileFingerprint::from_bytes(b"same bytes"));

        std::fs::File::create(&b).unwrap().write_all(b"same bytes!").unwrap();
        assert_ne!(fa, FileFingerprint::compute(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_missing_file_names_path() {
        let err = FileFingerprint::compute(Path::new("/nonexistent/tco.xlsx")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tco.xlsx"));
    }
}
