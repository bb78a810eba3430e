//! Tag-driven torrent deletion.

use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::DeletionConfig;
use crate::quarantine::{DeletionType, QuarantineFailure, QuarantineMover};
use crate::torrent_client::{Torrent, TorrentClient};

use super::safety::{CrossSeedCheck, CrossSeedChecker};

/// What a deletion pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionReport {
    /// Torrent records deleted (or that would be, in a dry run).
    pub deleted: usize,
    /// Torrents whose deletion failed or was aborted.
    pub failed: usize,
    /// Files moved into the recycle bin.
    pub quarantined: usize,
    pub quarantine_failures: Vec<QuarantineFailure>,
    /// Hashes deleted without their files because another torrent uses them.
    pub kept_shared: Vec<String>,
    pub notes: Vec<String>,
}

/// Deletes torrents carrying a configured delete tag.
///
/// The first configured tag a torrent carries decides how it is deleted:
/// record only, record and files, or, with a recycle bin, files quarantined
/// after a cross-seed check and the record deleted without files.
#[derive(Debug, Clone)]
pub struct DeletionExecutor {
    policy: DeletionConfig,
    checker: CrossSeedChecker,
    mover: Option<QuarantineMover>,
}

impl DeletionExecutor {
    pub fn new(policy: DeletionConfig) -> Self {
        let mover = policy.recycle_bin.clone().map(QuarantineMover::new);
        Self {
            policy,
            checker: CrossSeedChecker::new(),
            mover,
        }
    }

    pub async fn run<C: TorrentClient + ?Sized>(
        &self,
        client: &C,
        torrents: &[Torrent],
        dry_run: bool,
    ) -> DeletionReport {
        let mut report = DeletionReport::default();
        if !self.policy.use_delete_tags {
            debug!("Delete tags disabled, skipping deletion");
            return report;
        }

        for torrent in torrents {
            let Some(tag) = self.policy.matching_tag(|t| torrent.has_tag(t)) else {
                continue;
            };
            let delete_files = self.policy.deletes_files(tag);

            match (&self.mover, delete_files) {
                (_, false) => {
                    if dry_run {
                        info!(
                            "[dry run] Would delete torrent '{}' with hash {}",
                            torrent.name, torrent.hash
                        );
                        report.deleted += 1;
                        continue;
                    }
                    self.delete_record(client, torrent, false, &mut report).await;
                }
                (None, true) => {
                    if dry_run {
                        info!(
                            "[dry run] Would delete torrent '{}' with hash {} and its files",
                            torrent.name, torrent.hash
                        );
                        report.deleted += 1;
                        continue;
                    }
                    self.delete_record(client, torrent, true, &mut report).await;
                }
                (Some(mover), true) => {
                    if dry_run {
                        info!(
                            "[dry run] Would move files of '{}' ({}) to {} and delete the torrent",
                            torrent.name,
                            torrent.hash,
                            mover.root().display()
                        );
                        report.deleted += 1;
                        continue;
                    }
                    self.quarantine_and_delete(client, mover, torrent, &mut report)
                        .await;
                }
            }
        }

        report
    }

    async fn quarantine_and_delete<C: TorrentClient + ?Sized>(
        &self,
        client: &C,
        mover: &QuarantineMover,
        torrent: &Torrent,
        report: &mut DeletionReport,
    ) {
        // Must happen before the record is gone.
        let paths = existing_file_paths(client, torrent).await;

        match self.checker.check(client, &paths, &torrent.hash).await {
            Err(e) => {
                error!(
                    "Cross-seed check failed for '{}' ({}), not deleting: {}",
                    torrent.name, torrent.hash, e
                );
                report.failed += 1;
                report
                    .notes
                    .push(format!("deletion of {} aborted: {}", torrent.hash, e));
            }
            Ok(CrossSeedCheck::Shared(names)) => {
                info!(
                    "Files of '{}' are shared with {}, deleting torrent only",
                    torrent.name,
                    names.join(", ")
                );
                if self.delete_record(client, torrent, false, report).await {
                    report.kept_shared.push(torrent.hash.clone());
                }
            }
            Ok(CrossSeedCheck::Clear) => {
                let category = torrent.category().unwrap_or("uncategorized");
                let moved = mover
                    .quarantine(&paths, DeletionType::Unregistered, category, false)
                    .await;
                report.quarantined += moved.moved;
                report.quarantine_failures.extend(moved.failures);
                self.delete_record(client, torrent, false, report).await;
            }
        }
    }

    async fn delete_record<C: TorrentClient + ?Sized>(
        &self,
        client: &C,
        torrent: &Torrent,
        delete_files: bool,
        report: &mut DeletionReport,
    ) -> bool {
        match client.delete_torrent(&torrent.hash, delete_files).await {
            Ok(()) => {
                if delete_files {
                    info!(
                        "Deleted torrent '{}' with hash {} and its files",
                        torrent.name, torrent.hash
                    );
                } else {
                    info!("Deleted torrent '{}' with hash {}", torrent.name, torrent.hash);
                }
                report.deleted += 1;
                true
            }
            Err(e) => {
                error!("Failed to delete torrent '{}' ({}): {}", torrent.name, torrent.hash, e);
                report.failed += 1;
                report
                    .notes
                    .push(format!("deletion of {} failed: {}", torrent.hash, e));
                false
            }
        }
    }
}

/// Files of `torrent` that exist on disk. A failed lookup yields none.
async fn existing_file_paths<C: TorrentClient + ?Sized>(client: &C, torrent: &Torrent) -> Vec<PathBuf> {
    let files = match client.list_files(&torrent.hash).await {
        Ok(files) => files,
        Err(e) => {
            warn!(
                "Failed to list files of '{}' ({}), nothing to quarantine: {}",
                torrent.name, torrent.hash, e
            );
            return Vec::new();
        }
    };

    let mut existing = Vec::with_capacity(files.len());
    for path in files.iter().filter_map(|file| torrent.file_path(file)) {
        if fs::symlink_metadata(&path).await.is_ok() {
            existing.push(path);
        } else {
            debug!("File does not exist (may have been moved): {}", path.display());
        }
    }
    existing
}
