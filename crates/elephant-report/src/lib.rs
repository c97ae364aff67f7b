//! C10 — Reporter.
//!
//! Two append-only CSV sinks (errors, warnings), each given a header row
//! at construction. Every row is flushed before the write call returns,
//! so a crash loses at most the in-flight row, never a previously
//! acknowledged one. Concurrent callers are serialized behind a mutex
//! per sink — CSV rows must be appended in the order the engine produces
//! them (spec §5's ordering guarantee).

use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to open report sink at {path}: {cause}")]
    Open { path: PathBuf, cause: String },
    #[error("failed to write row to {path}: {cause}")]
    Write { path: PathBuf, cause: String },
}

#[derive(Debug, Serialize)]
struct ErrorRow {
    #[serde(rename = "propertyCid")]
    property_cid: String,
    #[serde(rename = "dataGroupCid")]
    data_group_cid: String,
    #[serde(rename = "filePath")]
    file_path: String,
    error: String,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct WarningRow {
    #[serde(rename = "propertyCid")]
    property_cid: String,
    #[serde(rename = "dataGroupCid")]
    data_group_cid: String,
    #[serde(rename = "filePath")]
    file_path: String,
    reason: String,
    timestamp: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportSummary {
    pub error_count: usize,
    pub warning_count: usize,
}

struct Sink {
    writer: Mutex<csv::Writer<File>>,
    path: PathBuf,
    count: Mutex<usize>,
}

impl Sink {
    fn open(path: &Path) -> Result<Self, ReportError> {
        let file = File::create(path).map_err(|e| ReportError::Open {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        Ok(Self {
            writer: Mutex::new(csv::Writer::from_writer(file)),
            path: path.to_path_buf(),
            count: Mutex::new(0),
        })
    }

    fn write<T: Serialize>(&self, row: &T) -> Result<(), ReportError> {
        let mut writer = self.writer.lock().unwrap();
        writer.serialize(row).map_err(|e| ReportError::Write {
            path: self.path.clone(),
            cause: e.to_string(),
        })?;
        writer.flush().map_err(|e| ReportError::Write {
            path: self.path.clone(),
            cause: e.to_string(),
        })?;
        *self.count.lock().unwrap() += 1;
        Ok(())
    }

    fn count(&self) -> usize {
        *self.count.lock().unwrap()
    }
}

/// Owns the two CSV sinks for one pipeline run.
pub struct Reporter {
    errors: Sink,
    warnings: Sink,
}

impl Reporter {
    /// Open both sinks at the configured paths, writing their header
    /// rows immediately (so an all-skip run still produces two
    /// header-only files, matching the empty-directory scenario).
    pub fn new(errors_path: &Path, warnings_path: &Path) -> Result<Self, ReportError> {
        Ok(Self {
            errors: Sink::open(errors_path)?,
            warnings: Sink::open(warnings_path)?,
        })
    }

    pub fn record_error(
        &self,
        property_cid: &str,
        data_group_cid: &str,
        file_path: &str,
        error: &str,
    ) -> Result<(), ReportError> {
        self.errors.write(&ErrorRow {
            property_cid: property_cid.to_string(),
            data_group_cid: data_group_cid.to_string(),
            file_path: file_path.to_string(),
            error: error.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    pub fn record_warning(
        &self,
        property_cid: &str,
        data_group_cid: &str,
        file_path: &str,
        reason: &str,
    ) -> Result<(), ReportError> {
        self.warnings.write(&WarningRow {
            property_cid: property_cid.to_string(),
            data_group_cid: data_group_cid.to_string(),
            file_path: file_path.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// Flush and close both sinks, returning final row counts.
    #[must_use]
    pub fn finalize(&self) -> ReportSummary {
        ReportSummary {
            error_count: self.errors.count(),
            warning_count: self.warnings.count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn header_written_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let errors = dir.path().join("errors.csv");
        let warnings = dir.path().join("warnings.csv");
        let _reporter = Reporter::new(&errors, &warnings).unwrap();

        let contents = fs::read_to_string(&errors).unwrap();
        assert_eq!(
            contents.lines().next().unwrap(),
            "propertyCid,dataGroupCid,filePath,error,timestamp"
        );
    }

    #[test]
    fn rows_are_appended_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let errors = dir.path().join("errors.csv");
        let warnings = dir.path().join("warnings.csv");
        let reporter = Reporter::new(&errors, &warnings).unwrap();

        reporter
            .record_error("QmProp", "QmGroup", "QmProp/QmGroup.json", "schema violation")
            .unwrap();
        reporter
            .record_warning("QmProp2", "QmGroup2", "QmProp2/QmGroup2.json", "already exists")
            .unwrap();

        let summary = reporter.finalize();
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.warning_count, 1);

        let contents = fs::read_to_string(&errors).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn empty_run_produces_header_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let errors = dir.path().join("errors.csv");
        let warnings = dir.path().join("warnings.csv");
        let reporter = Reporter::new(&errors, &warnings).unwrap();
        let summary = reporter.finalize();
        assert_eq!(summary.error_count, 0);
        assert_eq!(summary.warning_count, 0);
        assert_eq!(fs::read_to_string(&errors).unwrap().lines().count(), 1);
    }
}
