//! Hard-link organisation of completed torrents.

use std::path::Path;

use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::torrent_client::{Torrent, TorrentReader};

/// Outcome of a hard-link pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardlinkReport {
    pub linked: usize,
    /// Destinations that already existed.
    pub skipped: usize,
    pub failed: usize,
}

/// Completed torrents with a save path, which get linked.
pub fn plan_hardlinks(torrents: &[Torrent]) -> Vec<&Torrent> {
    torrents
        .iter()
        .filter(|t| t.is_complete() && t.save_path.is_some())
        .collect()
}

/// Link every file of every completed torrent into `target_dir`, keeping the
/// torrent's relative layout. Existing destinations are left alone.
pub async fn create_hardlinks<R: TorrentReader + ?Sized>(
    reader: &R,
    torrents: &[&Torrent],
    target_dir: &Path,
    dry_run: bool,
) -> HardlinkReport {
    let mut report = HardlinkReport::default();

    for torrent in torrents {
        let files = match reader.list_files(&torrent.hash).await {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list files of '{}': {}", torrent.name, e);
                report.failed += 1;
                continue;
            }
        };

        for file in &files {
            let Some(source) = torrent.file_path(file) else {
                continue;
            };
            let destination = target_dir.join(&file.name);

            if dry_run {
                info!(
                    "[dry run] Would link {} -> {}",
                    source.display(),
                    destination.display()
                );
                report.linked += 1;
                continue;
            }

            match link(&source, &destination).await {
                Ok(true) => report.linked += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    error!(
                        "Failed to create hard link for '{}' ({}): {}",
                        torrent.name,
                        source.display(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        info!("Hard links created for torrent '{}'", torrent.name);
    }

    report
}

/// `Ok(false)` when the destination already exists.
async fn link(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
    if fs::symlink_metadata(destination).await.is_ok() {
        debug!("{} exists, skipping", destination.display());
        return Ok(false);
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::hard_link(source, destination).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTorrentClient};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_links_files_and_skips_existing() {
        let temp = TempDir::new().unwrap();
        let save = temp.path().join("downloads");
        std::fs::create_dir_all(save.join("Show")).unwrap();
        std::fs::write(save.join("Show/e01.mkv"), "one").unwrap();
        std::fs::write(save.join("Show/e02.mkv"), "two").unwrap();
        let target = temp.path().join("library");
        std::fs::create_dir_all(target.join("Show")).unwrap();
        std::fs::write(target.join("Show/e02.mkv"), "already here").unwrap();

        let client = MockTorrentClient::new();
        let torrent = fixtures::torrent("a", "Show", &save.to_string_lossy());
        client.add_torrent(torrent.clone()).await;
        client
            .set_files(
                "a",
                vec![fixtures::file("Show/e01.mkv", 3), fixtures::file("Show/e02.mkv", 3)],
            )
            .await;

        let torrents = vec![torrent];
        let report = create_hardlinks(&client, &plan_hardlinks(&torrents), &target, false).await;

        assert_eq!(
            report,
            HardlinkReport {
                linked: 1,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(std::fs::read_to_string(target.join("Show/e01.mkv")).unwrap(), "one");
        assert_eq!(
            std::fs::read_to_string(target.join("Show/e02.mkv")).unwrap(),
            "already here"
        );
        assert!(save.join("Show/e01.mkv").exists());
    }

    #[tokio::test]
    async fn test_incomplete_torrents_are_not_planned() {
        let mut torrent = fixtures::torrent("a", "A", "/d");
        torrent.progress = 0.5;
        assert!(plan_hardlinks(&[torrent]).is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let client = MockTorrentClient::new();
        let torrent = fixtures::torrent("a", "A", &temp.path().to_string_lossy());
        client.add_torrent(torrent.clone()).await;
        client.set_files("a", vec![fixtures::file("A/x.mkv", 1)]).await;
        let target = temp.path().join("library");

        let torrents = vec![torrent];
        let report = create_hardlinks(&client, &plan_hardlinks(&torrents), &target, true).await;

        assert_eq!(report.linked, 1);
        assert!(!target.exists());
    }
}
