//! Outcome of a live maintenance run.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::error;

use crate::quarantine::QuarantineFailure;
use crate::torrent_client::TorrentClientError;

/// Counts for one executed operation.
///
/// Every torrent is independent: a failure is counted and the operation
/// carries on with the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationReport {
    pub operation: String,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl OperationReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    /// Count a batched call covering `count` torrents.
    pub fn record_batch(&mut self, what: &str, count: usize, result: Result<(), TorrentClientError>) {
        match result {
            Ok(()) => self.succeeded += count,
            Err(e) => {
                error!("{} failed for {} torrents: {}", what, count, e);
                self.failed += count;
                self.notes.push(format!("{}: {}", what, e));
            }
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Report of a live run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub operations: Vec<OperationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quarantine_failures: Vec<QuarantineFailure>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.quarantine_failures.is_empty() || self.operations.iter().any(|op| op.failed > 0)
    }

    pub fn total_succeeded(&self) -> usize {
        self.operations.iter().map(|op| op.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.operations.iter().map(|op| op.failed).sum()
    }

    /// Paths that could not be moved into the recycle bin.
    pub fn failed_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.quarantine_failures.iter().map(|f| &f.path)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Maintenance run report")?;
        if self.operations.is_empty() {
            writeln!(f, "  No operations were run")?;
        }
        for op in &self.operations {
            writeln!(
                f,
                "  {}: {} succeeded, {} failed",
                op.operation, op.succeeded, op.failed
            )?;
            for note in &op.notes {
                writeln!(f, "    - {}", note)?;
            }
        }
        if !self.quarantine_failures.is_empty() {
            writeln!(
                f,
                "  Quarantine failures ({}):",
                self.quarantine_failures.len()
            )?;
            for failure in &self.quarantine_failures {
                writeln!(f, "    - {}: {}", failure.path.display(), failure.error)?;
            }
        }
        write!(
            f,
            "Total: {} succeeded, {} failed",
            self.total_succeeded(),
            self.total_failed()
        )
    }
}
