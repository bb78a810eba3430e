//! Impact summary accumulated by a dry-run analysis.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::ImpactThresholds;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const RULE_WIDTH: usize = 70;

/// What a run would change.
///
/// Accumulation is plain appending: the same hash may be recorded more than
/// once, and only [`total_torrents_affected`](Self::total_torrents_affected)
/// deduplicates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImpactSummary {
    /// Delete reason (tag or operation) to hashes.
    pub torrents_to_delete: BTreeMap<String, Vec<String>>,
    pub torrents_to_tag: BTreeMap<String, Vec<String>>,
    pub torrents_to_pause: Vec<String>,
    pub torrents_to_resume: Vec<String>,
    pub orphaned_files: Vec<String>,
    pub disk_to_free_bytes: u64,
    pub operation_details: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(skip)]
    thresholds: ImpactThresholds,
}

impl ImpactSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: ImpactThresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    pub fn add_deletion(&mut self, tag: &str, hash: &str, size_bytes: u64) {
        self.torrents_to_delete
            .entry(tag.to_string())
            .or_default()
            .push(hash.to_string());
        self.disk_to_free_bytes += size_bytes;
    }

    pub fn add_tagging(&mut self, tag: &str, hash: &str) {
        self.torrents_to_tag
            .entry(tag.to_string())
            .or_default()
            .push(hash.to_string());
    }

    pub fn add_pause(&mut self, hash: &str) {
        self.torrents_to_pause.push(hash.to_string());
    }

    pub fn add_resume(&mut self, hash: &str) {
        self.torrents_to_resume.push(hash.to_string());
    }

    pub fn add_orphaned_file(&mut self, path: &str, size_bytes: u64) {
        self.orphaned_files.push(path.to_string());
        self.disk_to_free_bytes += size_bytes;
    }

    pub fn set_operation_detail(&mut self, operation: &str, key: &str, value: impl ToString) {
        self.operation_details
            .entry(operation.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Whether `hash` is already recorded for deletion under any reason.
    pub fn is_deleting(&self, hash: &str) -> bool {
        self.torrents_to_delete
            .values()
            .any(|hashes| hashes.iter().any(|h| h == hash))
    }

    /// Number of distinct torrents in any delete, tag, pause or resume list.
    pub fn total_torrents_affected(&self) -> usize {
        let mut affected: HashSet<&str> = HashSet::new();
        for hashes in self
            .torrents_to_delete
            .values()
            .chain(self.torrents_to_tag.values())
        {
            affected.extend(hashes.iter().map(String::as_str));
        }
        affected.extend(self.torrents_to_pause.iter().map(String::as_str));
        affected.extend(self.torrents_to_resume.iter().map(String::as_str));
        affected.len()
    }

    pub fn total_deletions(&self) -> usize {
        self.torrents_to_delete.values().map(Vec::len).sum()
    }

    pub fn total_taggings(&self) -> usize {
        self.torrents_to_tag.values().map(Vec::len).sum()
    }

    pub fn gb_to_free(&self) -> f64 {
        self.disk_to_free_bytes as f64 / BYTES_PER_GB
    }

    /// Warnings for large-scale changes.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let gb = self.gb_to_free();
        if gb > self.thresholds.max_free_gb {
            warnings.push(format!(
                "WARNING: {:.2} GB will be freed. Verify this is expected!",
                gb
            ));
        }

        let deletions = self.total_deletions();
        if deletions > self.thresholds.max_deletions {
            warnings.push(format!(
                "WARNING: {} torrents will be deleted. This is a large operation!",
                deletions
            ));
        }

        if self.orphaned_files.len() > self.thresholds.max_orphaned_files {
            warnings.push(format!(
                "WARNING: {} orphaned files will be deleted. Verify these are not needed!",
                self.orphaned_files.len()
            ));
        }

        warnings
    }

    pub fn is_empty(&self) -> bool {
        self.torrents_to_delete.is_empty()
            && self.torrents_to_tag.is_empty()
            && self.torrents_to_pause.is_empty()
            && self.torrents_to_resume.is_empty()
            && self.orphaned_files.is_empty()
    }

    /// Human-readable preview.
    pub fn format_summary(&self, show_details: bool) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut lines = vec![rule.clone(), "DRY-RUN IMPACT PREVIEW".to_string(), rule.clone()];

        if !self.torrents_to_delete.is_empty() {
            lines.push(String::new());
            lines.push(format!("Torrents to DELETE: {}", self.total_deletions()));
            for (tag, hashes) in &self.torrents_to_delete {
                lines.push(format!("   - Tag '{}': {} torrents", tag, hashes.len()));
                if show_details && !hashes.is_empty() {
                    let preview: Vec<&str> = hashes.iter().take(3).map(String::as_str).collect();
                    lines.push(format!("     Hashes: {}", preview.join(", ")));
                    if hashes.len() > 3 {
                        lines.push(format!("     ... and {} more", hashes.len() - 3));
                    }
                }
            }
        }

        if !self.torrents_to_tag.is_empty() {
            lines.push(String::new());
            lines.push(format!("Torrents to TAG: {}", self.total_taggings()));
            for (tag, hashes) in &self.torrents_to_tag {
                lines.push(format!("   - Tag '{}': {} torrents", tag, hashes.len()));
            }
        }

        if !self.torrents_to_pause.is_empty() {
            lines.push(String::new());
            lines.push(format!("Torrents to PAUSE: {}", self.torrents_to_pause.len()));
        }

        if !self.torrents_to_resume.is_empty() {
            lines.push(String::new());
            lines.push(format!("Torrents to RESUME: {}", self.torrents_to_resume.len()));
        }

        if !self.orphaned_files.is_empty() {
            lines.push(String::new());
            lines.push(format!(
                "Orphaned files to DELETE: {}",
                self.orphaned_files.len()
            ));
            if show_details {
                for path in self.orphaned_files.iter().take(5) {
                    lines.push(format!("   - {}", path));
                }
                if self.orphaned_files.len() > 5 {
                    lines.push(format!("   ... and {} more", self.orphaned_files.len() - 5));
                }
            }
        }

        if self.disk_to_free_bytes > 0 {
            lines.push(String::new());
            let gb = self.gb_to_free();
            if gb >= 1.0 {
                lines.push(format!("Disk space to free: {:.2} GB", gb));
            } else {
                lines.push(format!(
                    "Disk space to free: {:.2} MB",
                    self.disk_to_free_bytes as f64 / BYTES_PER_MB
                ));
            }
        }

        if !self.operation_details.is_empty() {
            lines.push(String::new());
            lines.push("Operation details:".to_string());
            for (operation, details) in &self.operation_details {
                lines.push(format!("   {}:", operation));
                for (key, value) in details {
                    lines.push(format!("      {}: {}", key, value));
                }
            }
        }

        if self.is_empty() {
            lines.push(String::new());
            lines.push("No changes will be made".to_string());
        }

        let warnings = self.warnings();
        if !warnings.is_empty() {
            let bang = "!".repeat(RULE_WIDTH);
            lines.push(String::new());
            lines.push(bang.clone());
            lines.extend(warnings);
            lines.push(bang);
        }

        lines.push(rule);
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_empty_summary() {
        let summary = ImpactSummary::new();
        assert!(summary.is_empty());
        assert_eq!(summary.total_torrents_affected(), 0);
        assert!(summary.warnings().is_empty());
        assert!(summary.format_summary(false).contains("No changes will be made"));
    }

    #[test]
    fn test_accumulation_allows_duplicates() {
        let mut summary = ImpactSummary::new();
        summary.add_tagging("unregistered", "a");
        summary.add_tagging("unregistered", "a");
        summary.add_deletion("unregistered", "a", 10);
        summary.add_pause("b");
        summary.add_resume("c");

        assert_eq!(summary.torrents_to_tag["unregistered"].len(), 2);
        assert_eq!(summary.total_torrents_affected(), 3);
        assert_eq!(summary.disk_to_free_bytes, 10);
        assert!(summary.is_deleting("a"));
        assert!(!summary.is_deleting("b"));
    }

    #[test]
    fn test_orphaned_files_count_toward_disk_but_not_torrents() {
        let mut summary = ImpactSummary::new();
        summary.add_orphaned_file("/data/leftover.mkv", 500);

        assert!(!summary.is_empty());
        assert_eq!(summary.total_torrents_affected(), 0);
        assert_eq!(summary.disk_to_free_bytes, 500);
    }

    #[test]
    fn test_warning_thresholds_are_strict() {
        let mut summary = ImpactSummary::new();
        for i in 0..20 {
            summary.add_deletion("unregistered", &format!("h{}", i), 0);
        }
        for i in 0..50 {
            summary.add_orphaned_file(&format!("/o/{}", i), 0);
        }
        summary.disk_to_free_bytes = 50 * GB;
        assert!(summary.warnings().is_empty());

        summary.add_deletion("unregistered", "h20", GB);
        summary.add_orphaned_file("/o/50", 0);
        let warnings = summary.warnings();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("51.00 GB"));
        assert!(warnings[1].contains("21 torrents"));
        assert!(warnings[2].contains("51 orphaned files"));
    }

    #[test]
    fn test_custom_thresholds() {
        let mut summary = ImpactSummary::with_thresholds(ImpactThresholds {
            max_free_gb: 1.0,
            max_deletions: 1,
            max_orphaned_files: 0,
        });
        summary.add_deletion("unregistered", "a", 0);
        assert!(summary.warnings().is_empty());
        summary.add_deletion("unregistered", "b", 0);
        assert_eq!(summary.warnings().len(), 1);
    }

    #[test]
    fn test_format_summary_contents() {
        let mut summary = ImpactSummary::new();
        for hash in ["a", "b", "c", "d"] {
            summary.add_deletion("unregistered", hash, 2 * GB);
        }
        summary.add_tagging("unregistered:crossseeding", "e");
        summary.add_pause("f");
        summary.add_orphaned_file("/data/x", 0);
        summary.set_operation_detail("orphaned", "note", "disk scan not performed");

        let text = summary.format_summary(true);
        assert!(text.contains("Torrents to DELETE: 4"));
        assert!(text.contains("Tag 'unregistered': 4 torrents"));
        assert!(text.contains("Hashes: a, b, c"));
        assert!(text.contains("... and 1 more"));
        assert!(text.contains("Torrents to TAG: 1"));
        assert!(text.contains("Torrents to PAUSE: 1"));
        assert!(text.contains("Orphaned files to DELETE: 1"));
        assert!(text.contains("Disk space to free: 8.00 GB"));
        assert!(text.contains("note: disk scan not performed"));
        assert!(!text.contains("No changes will be made"));

        let brief = summary.format_summary(false);
        assert!(!brief.contains("Hashes:"));
    }

    #[test]
    fn test_format_summary_small_sizes_in_mb() {
        let mut summary = ImpactSummary::new();
        summary.add_deletion("unregistered", "a", 5 * 1024 * 1024);
        assert!(summary.format_summary(false).contains("Disk space to free: 5.00 MB"));
    }
}
