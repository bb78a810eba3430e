//! Per-run response cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{TorrentClient, TorrentClientError, Torrent, TorrentFile, TorrentReader, Tracker};

type Entries<T> = RwLock<HashMap<String, (Instant, Vec<T>)>>;

/// Caches tracker and file lookups of an inner client.
///
/// Constructed at the start of a run and dropped at its end, so a new run
/// never sees answers from a previous one. The torrent list is never cached.
pub struct CachedClient {
    inner: Arc<dyn TorrentClient>,
    ttl: Duration,
    trackers: Entries<Tracker>,
    files: Entries<TorrentFile>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedClient {
    pub fn new(inner: Arc<dyn TorrentClient>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            trackers: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    async fn lookup<T: Clone>(&self, entries: &Entries<T>, hash: &str) -> Option<Vec<T>> {
        let entries = entries.read().await;
        match entries.get(hash) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn store<T>(entries: &Entries<T>, hash: &str, value: Vec<T>) {
        entries
            .write()
            .await
            .insert(hash.to_string(), (Instant::now(), value));
    }

    async fn invalidate(&self, hash: &str) {
        self.trackers.write().await.remove(hash);
        self.files.write().await.remove(hash);
        debug!("Invalidated cached lookups for {}", hash);
    }
}

#[async_trait]
impl TorrentReader for CachedClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_torrents(&self) -> Result<Vec<Torrent>, TorrentClientError> {
        self.inner.list_torrents().await
    }

    async fn list_trackers(&self, hash: &str) -> Result<Vec<Tracker>, TorrentClientError> {
        if let Some(trackers) = self.lookup(&self.trackers, hash).await {
            return Ok(trackers);
        }
        let trackers = self.inner.list_trackers(hash).await?;
        Self::store(&self.trackers, hash, trackers.clone()).await;
        Ok(trackers)
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        if let Some(files) = self.lookup(&self.files, hash).await {
            return Ok(files);
        }
        let files = self.inner.list_files(hash).await?;
        Self::store(&self.files, hash, files.clone()).await;
        Ok(files)
    }
}

#[async_trait]
impl TorrentClient for CachedClient {
    async fn add_tags(&self, hashes: &[String], tags: &[String]) -> Result<(), TorrentClientError> {
        self.inner.add_tags(hashes, tags).await
    }

    async fn remove_tags(
        &self,
        hashes: &[String],
        tags: &[String],
    ) -> Result<(), TorrentClientError> {
        self.inner.remove_tags(hashes, tags).await
    }

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<(), TorrentClientError> {
        let result = self.inner.delete_torrent(hash, delete_files).await;
        self.invalidate(hash).await;
        result
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.inner.pause(hashes).await
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        self.inner.resume(hashes).await
    }

    async fn set_share_limits(
        &self,
        hashes: &[String],
        ratio_limit: f64,
        seeding_time_limit: i64,
    ) -> Result<(), TorrentClientError> {
        self.inner
            .set_share_limits(hashes, ratio_limit, seeding_time_limit)
            .await
    }

    async fn set_preferences(
        &self,
        preferences: &serde_json::Value,
    ) -> Result<(), TorrentClientError> {
        self.inner.set_preferences(preferences).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTorrentClient};

    async fn setup() -> Arc<MockTorrentClient> {
        let mock = Arc::new(MockTorrentClient::new());
        mock.add_torrent(fixtures::torrent("aaa", "One", "/data")).await;
        mock.set_files("aaa", vec![fixtures::file("one.mkv", 10)]).await;
        mock.set_trackers("aaa", vec![fixtures::working_tracker()])
            .await;
        mock
    }

    #[tokio::test]
    async fn test_repeated_lookups_hit_cache() {
        let mock = setup().await;
        let cached = CachedClient::new(mock.clone(), Duration::from_secs(60));

        cached.list_files("aaa").await.unwrap();
        cached.list_files("aaa").await.unwrap();
        cached.list_trackers("aaa").await.unwrap();
        cached.list_trackers("aaa").await.unwrap();

        let reads = mock.read_counts().await;
        assert_eq!(reads.list_files, 1);
        assert_eq!(reads.list_trackers, 1);
        assert_eq!(cached.hits(), 2);
        assert_eq!(cached.misses(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let mock = setup().await;
        let cached = CachedClient::new(mock.clone(), Duration::ZERO);

        cached.list_files("aaa").await.unwrap();
        cached.list_files("aaa").await.unwrap();

        assert_eq!(mock.read_counts().await.list_files, 2);
        assert_eq!(cached.hits(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let mock = setup().await;
        let cached = CachedClient::new(mock.clone(), Duration::from_secs(60));

        mock.set_next_error(TorrentClientError::Timeout).await;
        assert!(cached.list_files("aaa").await.is_err());
        assert_eq!(cached.list_files("aaa").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_invalidates_entries() {
        let mock = setup().await;
        let cached = CachedClient::new(mock.clone(), Duration::from_secs(60));

        cached.list_files("aaa").await.unwrap();
        cached.delete_torrent("aaa", false).await.unwrap();

        assert!(matches!(
            cached.list_files("aaa").await,
            Err(TorrentClientError::TorrentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_new_cache_starts_empty() {
        let mock = setup().await;
        {
            let first = CachedClient::new(mock.clone(), Duration::from_secs(60));
            first.list_files("aaa").await.unwrap();
        }
        let second = CachedClient::new(mock.clone(), Duration::from_secs(60));
        second.list_files("aaa").await.unwrap();

        assert_eq!(mock.read_counts().await.list_files, 2);
    }
}
