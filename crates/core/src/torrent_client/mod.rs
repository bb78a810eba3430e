//! Torrent client abstraction.
//!
//! This module provides the `TorrentReader`/`TorrentClient` traits, the
//! qBittorrent Web API backend and a per-run response cache.

mod cached;
mod qbittorrent;
mod types;

pub use cached::CachedClient;
pub use qbittorrent::QBittorrentClient;
pub use types::*;

use tracing::{debug, warn};

/// Fetch every torrent and attach its trackers.
///
/// Fails only if the torrent list itself cannot be fetched. A failed tracker
/// lookup leaves that torrent without trackers, so it can never be flagged.
pub async fn load_snapshot<R: TorrentReader + ?Sized>(
    reader: &R,
) -> Result<Vec<Torrent>, TorrentClientError> {
    let mut torrents = reader.list_torrents().await?;

    for torrent in &mut torrents {
        match reader.list_trackers(&torrent.hash).await {
            Ok(trackers) => torrent.trackers = trackers,
            Err(e) => {
                warn!(
                    "Failed to fetch trackers for {} ({}): {}",
                    torrent.name, torrent.hash, e
                );
                torrent.trackers.clear();
            }
        }
    }

    debug!(
        "Loaded snapshot of {} torrents from {}",
        torrents.len(),
        reader.name()
    );
    Ok(torrents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTorrentClient};

    #[tokio::test]
    async fn test_load_snapshot_attaches_trackers() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(fixtures::torrent("aaa", "One", "/data/x"))
            .await;
        client
            .set_trackers(
                "aaa",
                vec![Tracker::new(
                    "https://tracker.example/announce",
                    TrackerStatus::NotWorking,
                    "Unregistered torrent",
                )],
            )
            .await;

        let snapshot = load_snapshot(&client).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].trackers.len(), 1);
    }

    #[tokio::test]
    async fn test_load_snapshot_tolerates_tracker_failure() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(fixtures::torrent("aaa", "One", "/data/x"))
            .await;
        client
            .add_torrent(fixtures::torrent("bbb", "Two", "/data/x"))
            .await;
        client
            .set_trackers("bbb", vec![fixtures::working_tracker()])
            .await;
        client.fail_trackers_for("aaa").await;

        let snapshot = load_snapshot(&client).await.unwrap();
        let one = snapshot.iter().find(|t| t.hash == "aaa").unwrap();
        let two = snapshot.iter().find(|t| t.hash == "bbb").unwrap();
        assert!(one.trackers.is_empty());
        assert_eq!(two.trackers.len(), 1);
    }

    #[tokio::test]
    async fn test_load_snapshot_propagates_list_failure() {
        let client = MockTorrentClient::new();
        client
            .set_next_error(TorrentClientError::ConnectionFailed("refused".into()))
            .await;

        assert!(matches!(
            load_snapshot(&client).await,
            Err(TorrentClientError::ConnectionFailed(_))
        ));
    }
}
