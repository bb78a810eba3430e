//! Testing utilities and mock implementations.
//!
//! This module provides a recording mock of the torrent client traits,
//! allowing the maintenance pipeline to be tested without a real qBittorrent.
//!
//! # Example
//!
//! ```rust,ignore
//! use seedkeeper_core::testing::{fixtures, MockTorrentClient};
//!
//! let client = MockTorrentClient::new();
//! client.add_torrent(fixtures::torrent("abc", "Show", "/data/tv")).await;
//! client.set_files("abc", vec![fixtures::file("Show/e01.mkv", 1024)]).await;
//! ```

mod mock_torrent_client;

pub use mock_torrent_client::{MockTorrentClient, ReadCounts, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::torrent_client::{Torrent, TorrentFile, Tracker, TrackerStatus};

    /// Create a completed, seeding torrent at `save_path`.
    pub fn torrent(hash: &str, name: &str, save_path: &str) -> Torrent {
        let mut torrent = Torrent::new(hash, name);
        torrent.save_path = Some(save_path.to_string());
        torrent.size_bytes = 1024 * 1024 * 100; // 100 MB
        torrent
    }

    /// Create a torrent carrying the given tags.
    pub fn tagged_torrent(hash: &str, name: &str, save_path: &str, tags: &[&str]) -> Torrent {
        let mut torrent = torrent(hash, name, save_path);
        torrent.tags = tags.iter().map(|t| t.to_string()).collect();
        torrent
    }

    /// A "not working" tracker reporting `message`.
    pub fn unregistered_tracker(message: &str) -> Tracker {
        Tracker::new(
            "https://tracker.example/announce",
            TrackerStatus::NotWorking,
            message,
        )
    }

    /// A healthy tracker.
    pub fn working_tracker() -> Tracker {
        Tracker::new("https://tracker.example/announce", TrackerStatus::Working, "")
    }

    /// A tracker entry for `url` with the given status.
    pub fn tracker(url: &str, status: TrackerStatus) -> Tracker {
        Tracker::new(url, status, "")
    }

    pub fn file(name: &str, size: u64) -> TorrentFile {
        TorrentFile {
            name: name.to_string(),
            size,
        }
    }
}
