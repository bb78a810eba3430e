//! Types for the quarantine module.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Reason a file was quarantined; the first directory level of the recycle bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionType {
    Orphaned,
    Unregistered,
}

impl DeletionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionType::Orphaned => "orphaned",
            DeletionType::Unregistered => "unregistered",
        }
    }

    /// Parse a deletion type name; unknown names fall back to `Orphaned`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "orphaned" => DeletionType::Orphaned,
            "unregistered" => DeletionType::Unregistered,
            other => {
                warn!("Invalid deletion type '{}', defaulting to 'orphaned'", other);
                DeletionType::Orphaned
            }
        }
    }
}

impl fmt::Display for DeletionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file that could not be quarantined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantineFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of quarantining a batch of files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuarantineReport {
    /// Files moved, or that would have been moved in a dry run.
    pub moved: usize,
    pub failures: Vec<QuarantineFailure>,
}

impl QuarantineReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
