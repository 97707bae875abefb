use std::path::{Path, PathBuf};
use std::sync::Arc;

use elblog_repository::{LogRecord, LogStore};
use serde::Serialize;
use tracing::{error, info, trace};

use crate::error::Result;
use crate::record::{LineOutcome, RecordBuilder};
use crate::source::LogFileSource;

/// Per-file counters for one pass over a log file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub lines: usize,
    pub records: usize,
    pub no_match: usize,
    pub invalid: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

impl FileReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct ParsedFile {
    pub records: Vec<LogRecord>,
    pub report: FileReport,
}

pub struct IngestionDriver {
    builder: RecordBuilder,
    store: Arc<dyn LogStore>,
}

impl IngestionDriver {
    pub fn new(builder: RecordBuilder, store: Arc<dyn LogStore>) -> Self {
        Self { builder, store }
    }

    pub fn parse_file(&mut self, path: &Path) -> Result<ParsedFile> {
        parse_log_file(&mut self.builder, path)
    }

    /// Parses `path` and writes its records to the store as one batch.
    pub async fn ingest_file(&mut self, path: &Path) -> Result<FileReport> {
        let ParsedFile {
            records,
            mut report,
        } = self.parse_file(path)?;

        let inserted = self.store.insert_batch(&records).await?;
        report.inserted = inserted.inserted;
        report.duplicates = inserted.duplicates;

        info!(
            path = %report.path,
            lines = report.lines,
            records = report.records,
            no_match = report.no_match,
            invalid = report.invalid,
            inserted = report.inserted,
            duplicates = report.duplicates,
            "ingested log file"
        );
        Ok(report)
    }

    /// Ingests files one after another; the first fatal error stops the run.
    pub async fn ingest_files(&mut self, paths: &[PathBuf]) -> Result<Vec<FileReport>> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.ingest_file(path).await?);
        }

        info!(
            files = reports.len(),
            inserted = reports.iter().map(|r| r.inserted).sum::<usize>(),
            duplicates = reports.iter().map(|r| r.duplicates).sum::<usize>(),
            invalid = reports.iter().map(|r| r.invalid).sum::<usize>(),
            distinct_ips = self.builder.geo().cached_len(),
            "ingestion run complete"
        );
        Ok(reports)
    }
}

/// Builds records for every matching line of `path` without storing them.
/// Lines with an unusable timestamp are logged and counted, not returned.
pub fn parse_log_file(builder: &mut RecordBuilder, path: &Path) -> Result<ParsedFile> {
    let mut report = FileReport::new(path);
    let mut records = Vec::new();

    for (index, line) in LogFileSource::open(path)?.lines().enumerate() {
        let line = line?;
        report.lines += 1;

        match builder.parse_line(&line)? {
            LineOutcome::Record(record) => records.push(*record),
            LineOutcome::NoMatch => {
                trace!(path = %path.display(), line = index + 1, "line does not match log grammar");
                report.no_match += 1;
            }
            LineOutcome::Invalid(err) => {
                error!(path = %path.display(), line = index + 1, error = %err, "skipping invalid log line");
                report.invalid += 1;
            }
        }
    }

    report.records = records.len();
    Ok(ParsedFile { records, report })
}
