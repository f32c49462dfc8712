//
// models.rs
// Image-Tools-rs
//
// Serializable outcome of a batch run, per job and in aggregate.
//

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a single job ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Processed,
    /// Cancellation was already set when the job started.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Aggregate counts for one run of the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub operation: String,
    pub source: PathBuf,
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub submitted: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Jobs that had not reported back when the completion wait gave up.
    pub abandoned: usize,
    pub cancelled: bool,
    pub timed_out: bool,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    pub fn new(operation: impl Into<String>, source: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            operation: operation.into(),
            source: source.into(),
            workers,
            started_at: Utc::now(),
            finished_at: None,
            submitted: 0,
            processed: 0,
            skipped: 0,
            failed: 0,
            abandoned: 0,
            cancelled: false,
            timed_out: false,
            failures: Vec::new(),
        }
    }

    pub fn completed(&self) -> usize {
        self.processed + self.skipped + self.failed
    }

    pub fn record_failure(&mut self, path: PathBuf, message: impl Into<String>) {
        self.failed += 1;
        self.failures.push(FileFailure {
            path,
            message: message.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.abandoned == 0 && !self.timed_out
    }
}
