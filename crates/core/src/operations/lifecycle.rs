//! Pause, resume and auto-removal.

use tracing::info;

use crate::report::OperationReport;
use crate::torrent_client::{Torrent, TorrentClient};

/// Completed torrents, which auto-remove deletes.
pub fn plan_auto_remove(torrents: &[Torrent]) -> Vec<&Torrent> {
    torrents.iter().filter(|t| t.is_complete()).collect()
}

/// Hashes of every torrent that is not paused.
pub fn plan_pause(torrents: &[Torrent]) -> Vec<String> {
    torrents
        .iter()
        .filter(|t| !t.is_paused())
        .map(|t| t.hash.clone())
        .collect()
}

/// Hashes of every paused torrent.
pub fn plan_resume(torrents: &[Torrent]) -> Vec<String> {
    torrents
        .iter()
        .filter(|t| t.is_paused())
        .map(|t| t.hash.clone())
        .collect()
}

/// Delete the records (never the files) of completed torrents.
pub async fn apply_auto_remove<C: TorrentClient + ?Sized>(
    client: &C,
    torrents: &[&Torrent],
    dry_run: bool,
    report: &mut OperationReport,
) {
    for torrent in torrents {
        if dry_run {
            info!("[dry run] Would remove completed torrent: {}", torrent.name);
            continue;
        }
        let result = client.delete_torrent(&torrent.hash, false).await;
        if result.is_ok() {
            info!("Removed completed torrent: {}", torrent.name);
        }
        report.record_batch(&format!("remove {}", torrent.hash), 1, result);
    }
}

pub async fn apply_pause<C: TorrentClient + ?Sized>(
    client: &C,
    hashes: &[String],
    dry_run: bool,
    report: &mut OperationReport,
) {
    if hashes.is_empty() {
        return;
    }
    if dry_run {
        info!("[dry run] Would pause {} torrents", hashes.len());
        return;
    }
    let result = client.pause(hashes).await;
    if result.is_ok() {
        info!("Paused {} torrents", hashes.len());
    }
    report.record_batch("pause", hashes.len(), result);
}

pub async fn apply_resume<C: TorrentClient + ?Sized>(
    client: &C,
    hashes: &[String],
    dry_run: bool,
    report: &mut OperationReport,
) {
    if hashes.is_empty() {
        return;
    }
    if dry_run {
        info!("[dry run] Would resume {} torrents", hashes.len());
        return;
    }
    let result = client.resume(hashes).await;
    if result.is_ok() {
        info!("Resumed {} torrents", hashes.len());
    }
    report.record_batch("resume", hashes.len(), result);
}
