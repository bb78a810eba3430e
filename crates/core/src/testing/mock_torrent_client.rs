//! Mock torrent client for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{
    Torrent, TorrentClient, TorrentClientError, TorrentFile, TorrentReader, TorrentState, Tracker,
};

/// A recorded mutating call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    AddTags {
        hashes: Vec<String>,
        tags: Vec<String>,
    },
    RemoveTags {
        hashes: Vec<String>,
        tags: Vec<String>,
    },
    Delete {
        hash: String,
        delete_files: bool,
    },
    Pause {
        hashes: Vec<String>,
    },
    Resume {
        hashes: Vec<String>,
    },
    SetShareLimits {
        hashes: Vec<String>,
        ratio_limit: f64,
        seeding_time_limit: i64,
    },
    SetPreferences {
        preferences: serde_json::Value,
    },
}

/// Number of read calls made, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCounts {
    pub list_torrents: usize,
    pub list_trackers: usize,
    pub list_files: usize,
}

/// Mock implementation of the `TorrentReader` and `TorrentClient` traits.
///
/// Provides controllable behavior for testing:
/// - Pre-populate torrents, trackers and files
/// - Record every mutating call for assertions
/// - Simulate failures, either once or per hash
///
/// Mutations are applied to the held state, so a second `list_torrents`
/// sees tags added and torrents deleted by the first pass.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add_torrent(fixtures::torrent("abc", "Show", "/data/tv")).await;
/// client.set_trackers("abc", vec![fixtures::unregistered_tracker("Unregistered torrent")]).await;
///
/// // ... run something against the client ...
///
/// assert_eq!(client.mutating_calls().await.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockTorrentClient {
    torrents: Arc<RwLock<BTreeMap<String, Torrent>>>,
    trackers: Arc<RwLock<HashMap<String, Vec<Tracker>>>>,
    files: Arc<RwLock<HashMap<String, Vec<TorrentFile>>>>,
    /// Recorded mutating calls, in order.
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    reads: Arc<RwLock<ReadCounts>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    failing_trackers: Arc<RwLock<HashSet<String>>>,
    failing_files: Arc<RwLock<HashSet<String>>>,
    /// Application preferences, merged across `set_preferences` calls.
    preferences: Arc<RwLock<serde_json::Map<String, serde_json::Value>>>,
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a torrent.
    pub async fn add_torrent(&self, torrent: Torrent) {
        self.torrents
            .write()
            .await
            .insert(torrent.hash.clone(), torrent);
    }

    /// Set the trackers returned for a torrent.
    pub async fn set_trackers(&self, hash: &str, trackers: Vec<Tracker>) {
        self.trackers
            .write()
            .await
            .insert(hash.to_string(), trackers);
    }

    /// Set the files returned for a torrent.
    pub async fn set_files(&self, hash: &str, files: Vec<TorrentFile>) {
        self.files.write().await.insert(hash.to_string(), files);
    }

    /// Make every tracker lookup for `hash` fail.
    pub async fn fail_trackers_for(&self, hash: &str) {
        self.failing_trackers.write().await.insert(hash.to_string());
    }

    /// Make every file lookup for `hash` fail.
    pub async fn fail_files_for(&self, hash: &str) {
        self.failing_files.write().await.insert(hash.to_string());
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    /// Current application preferences.
    pub async fn preferences(&self) -> serde_json::Map<String, serde_json::Value> {
        self.preferences.read().await.clone()
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Get all recorded mutating calls.
    pub async fn mutating_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Recorded delete calls as `(hash, delete_files)`.
    pub async fn deletions(&self) -> Vec<(String, bool)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Delete { hash, delete_files } => Some((hash.clone(), *delete_files)),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded calls and read counters.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
        *self.reads.write().await = ReadCounts::default();
    }

    pub async fn read_counts(&self) -> ReadCounts {
        *self.reads.read().await
    }

    /// Current state of a torrent.
    pub async fn torrent(&self, hash: &str) -> Option<Torrent> {
        self.torrents.read().await.get(hash).cloned()
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.contains_key(hash)
    }

    /// Get the number of torrents.
    pub async fn torrent_count(&self) -> usize {
        self.torrents.read().await.len()
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<TorrentClientError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, call: RecordedCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl TorrentReader for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_torrents(&self) -> Result<Vec<Torrent>, TorrentClientError> {
        self.reads.write().await.list_torrents += 1;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self.torrents.read().await.values().cloned().collect())
    }

    async fn list_trackers(&self, hash: &str) -> Result<Vec<Tracker>, TorrentClientError> {
        self.reads.write().await.list_trackers += 1;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if self.failing_trackers.read().await.contains(hash) {
            return Err(TorrentClientError::ApiError(format!(
                "tracker lookup failed for {}",
                hash
            )));
        }
        if !self.has_torrent(hash).await {
            return Err(TorrentClientError::TorrentNotFound(hash.to_string()));
        }

        Ok(self
            .trackers
            .read()
            .await
            .get(hash)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        self.reads.write().await.list_files += 1;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if self.failing_files.read().await.contains(hash) {
            return Err(TorrentClientError::ApiError(format!(
                "file lookup failed for {}",
                hash
            )));
        }
        if !self.has_torrent(hash).await {
            return Err(TorrentClientError::TorrentNotFound(hash.to_string()));
        }

        Ok(self
            .files
            .read()
            .await
            .get(hash)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    async fn add_tags(&self, hashes: &[String], tags: &[String]) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record(RecordedCall::AddTags {
            hashes: hashes.to_vec(),
            tags: tags.to_vec(),
        })
        .await;

        let mut torrents = self.torrents.write().await;
        for hash in hashes {
            if let Some(torrent) = torrents.get_mut(hash) {
                torrent.tags.extend(tags.iter().cloned());
            }
        }
        Ok(())
    }

    async fn remove_tags(
        &self,
        hashes: &[String],
        tags: &[String],
    ) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record(RecordedCall::RemoveTags {
            hashes: hashes.to_vec(),
            tags: tags.to_vec(),
        })
        .await;

        let mut torrents = self.torrents.write().await;
        for hash in hashes {
            if let Some(torrent) = torrents.get_mut(hash) {
                for tag in tags {
                    torrent.tags.remove(tag);
                }
            }
        }
        Ok(())
    }

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record(RecordedCall::Delete {
            hash: hash.to_string(),
            delete_files,
        })
        .await;

        if self.torrents.write().await.remove(hash).is_some() {
            self.files.write().await.remove(hash);
            self.trackers.write().await.remove(hash);
            Ok(())
        } else {
            Err(TorrentClientError::TorrentNotFound(hash.to_string()))
        }
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record(RecordedCall::Pause {
            hashes: hashes.to_vec(),
        })
        .await;

        let mut torrents = self.torrents.write().await;
        for hash in hashes {
            if let Some(torrent) = torrents.get_mut(hash) {
                torrent.state = TorrentState::Paused;
            }
        }
        Ok(())
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record(RecordedCall::Resume {
            hashes: hashes.to_vec(),
        })
        .await;

        let mut torrents = self.torrents.write().await;
        for hash in hashes {
            if let Some(torrent) = torrents.get_mut(hash) {
                torrent.state = if torrent.is_complete() {
                    TorrentState::Seeding
                } else {
                    TorrentState::Downloading
                };
            }
        }
        Ok(())
    }

    async fn set_share_limits(
        &self,
        hashes: &[String],
        ratio_limit: f64,
        seeding_time_limit: i64,
    ) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record(RecordedCall::SetShareLimits {
            hashes: hashes.to_vec(),
            ratio_limit,
            seeding_time_limit,
        })
        .await;
        Ok(())
    }

    async fn set_preferences(
        &self,
        preferences: &serde_json::Value,
    ) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record(RecordedCall::SetPreferences {
            preferences: preferences.clone(),
        })
        .await;
        if let Some(values) = preferences.as_object() {
            let mut current = self.preferences.write().await;
            for (key, value) in values {
                current.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_list_torrents_returns_populated_torrents() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(fixtures::torrent("bbb", "Two", "/data"))
            .await;
        client
            .add_torrent(fixtures::torrent("aaa", "One", "/data"))
            .await;

        let torrents = client.list_torrents().await.unwrap();
        let hashes: Vec<_> = torrents.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["aaa", "bbb"]);
        assert_eq!(client.read_counts().await.list_torrents, 1);
    }

    #[tokio::test]
    async fn test_add_tags_is_recorded_and_applied() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(fixtures::torrent("aaa", "One", "/data"))
            .await;

        client
            .add_tags(&["aaa".to_string()], &["unregistered".to_string()])
            .await
            .unwrap();

        assert!(client.torrent("aaa").await.unwrap().has_tag("unregistered"));
        assert_eq!(
            client.mutating_calls().await,
            vec![RecordedCall::AddTags {
                hashes: vec!["aaa".to_string()],
                tags: vec!["unregistered".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_torrent() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(fixtures::torrent("aaa", "One", "/data"))
            .await;

        client.delete_torrent("aaa", false).await.unwrap();

        assert!(!client.has_torrent("aaa").await);
        assert_eq!(client.deletions().await, vec![("aaa".to_string(), false)]);
        assert!(matches!(
            client.list_files("aaa").await,
            Err(TorrentClientError::TorrentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(fixtures::torrent("aaa", "One", "/data"))
            .await;
        let hashes = vec!["aaa".to_string()];

        client.pause(&hashes).await.unwrap();
        assert!(client.torrent("aaa").await.unwrap().is_paused());

        client.resume(&hashes).await.unwrap();
        assert_eq!(
            client.torrent("aaa").await.unwrap().state,
            TorrentState::Seeding
        );
    }

    #[tokio::test]
    async fn test_error_injection() {
        let client = MockTorrentClient::new();
        client
            .add_torrent(fixtures::torrent("aaa", "One", "/data"))
            .await;

        client
            .set_next_error(TorrentClientError::ConnectionFailed("Test error".into()))
            .await;
        assert!(client.list_torrents().await.is_err());
        // Error is consumed
        assert!(client.list_torrents().await.is_ok());

        client.fail_files_for("aaa").await;
        assert!(client.list_files("aaa").await.is_err());
        assert!(client.list_trackers("aaa").await.is_ok());
    }

    #[tokio::test]
    async fn test_preferences_merge() {
        let client = MockTorrentClient::new();

        client
            .set_preferences(&serde_json::json!({ "auto_tmm_enabled": false, "dht": true }))
            .await
            .unwrap();
        client
            .set_preferences(&serde_json::json!({ "auto_tmm_enabled": true }))
            .await
            .unwrap();

        let preferences = client.preferences().await;
        assert_eq!(preferences["auto_tmm_enabled"], true);
        assert_eq!(preferences["dht"], true);
        assert_eq!(client.mutating_calls().await.len(), 2);
    }
}
