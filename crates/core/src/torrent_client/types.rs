//! Types for torrent client operations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// State of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Downloading from peers.
    Downloading,
    /// Seeding to peers.
    Seeding,
    /// Download or upload is paused.
    Paused,
    /// Checking file integrity.
    Checking,
    /// Queued for download.
    Queued,
    /// Stalled (no peers).
    Stalled,
    /// Error state.
    Error,
    /// Unknown state.
    Unknown,
}

impl TorrentState {
    /// Returns the string representation for reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Paused => "paused",
            TorrentState::Checking => "checking",
            TorrentState::Queued => "queued",
            TorrentState::Stalled => "stalled",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }
}

/// Tracker status as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    Disabled,
    NotContacted,
    Working,
    Updating,
    /// Contacted and failed; the only status whose message is actionable.
    NotWorking,
    Unknown,
}

impl TrackerStatus {
    /// Map the numeric qBittorrent status code.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => TrackerStatus::Disabled,
            1 => TrackerStatus::NotContacted,
            2 => TrackerStatus::Working,
            3 => TrackerStatus::Updating,
            4 => TrackerStatus::NotWorking,
            _ => TrackerStatus::Unknown,
        }
    }
}

/// A tracker entry of one torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub url: String,
    pub status: TrackerStatus,
    /// Free-text message from the last announce.
    pub message: String,
}

impl Tracker {
    pub fn new(url: impl Into<String>, status: TrackerStatus, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Host part of the URL, lowercased. `None` for pseudo-trackers like `** [DHT] **`.
    pub fn host(&self) -> Option<String> {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }
}

/// A file belonging to a torrent, relative to its save path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    pub name: String,
    pub size: u64,
}

/// Snapshot of one torrent, normalised at the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Torrent {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub state: TorrentState,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Total size in bytes.
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Filled by [`load_snapshot`](super::load_snapshot); empty when the lookup failed.
    #[serde(default)]
    pub trackers: Vec<Tracker>,
}

impl Torrent {
    /// A torrent with the given hash and name and empty everything else.
    pub fn new(hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            name: name.into(),
            save_path: None,
            category: None,
            tags: BTreeSet::new(),
            state: TorrentState::Seeding,
            progress: 1.0,
            size_bytes: 0,
            added_at: None,
            completed_at: None,
            trackers: Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn is_paused(&self) -> bool {
        self.state == TorrentState::Paused
    }

    /// Category, or `None` when uncategorized.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }

    /// Absolute location of a file of this torrent, if the save path is known.
    pub fn file_path(&self, file: &TorrentFile) -> Option<PathBuf> {
        self.save_path
            .as_deref()
            .map(|save_path| Path::new(save_path).join(&file.name))
    }
}

/// Read half of a torrent client.
///
/// Components that must never mutate the client (the impact analyzer, the
/// cross-seed safety check) only ever see this trait.
#[async_trait]
pub trait TorrentReader: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// List every torrent. Trackers are not populated.
    async fn list_torrents(&self) -> Result<Vec<Torrent>, TorrentClientError>;

    /// List the trackers of a torrent.
    async fn list_trackers(&self, hash: &str) -> Result<Vec<Tracker>, TorrentClientError>;

    /// List the files of a torrent, relative to its save path.
    async fn list_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError>;
}

/// Trait for torrent client backends.
///
/// Every operation except deletion takes a batch of hashes so that callers
/// group their work into one request per destination.
#[async_trait]
pub trait TorrentClient: TorrentReader {
    /// Add tags to torrents.
    async fn add_tags(&self, hashes: &[String], tags: &[String]) -> Result<(), TorrentClientError>;

    /// Remove tags from torrents.
    async fn remove_tags(
        &self,
        hashes: &[String],
        tags: &[String],
    ) -> Result<(), TorrentClientError>;

    /// Remove a torrent.
    /// If `delete_files` is true, also delete downloaded files.
    async fn delete_torrent(&self, hash: &str, delete_files: bool)
        -> Result<(), TorrentClientError>;

    /// Pause torrents.
    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError>;

    /// Resume torrents.
    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError>;

    /// Set share limits (-2 = use global, -1 = unlimited).
    async fn set_share_limits(
        &self,
        hashes: &[String],
        ratio_limit: f64,
        seeding_time_limit: i64,
    ) -> Result<(), TorrentClientError>;

    /// Update application preferences. Keys absent from `preferences` keep
    /// their current value.
    async fn set_preferences(
        &self,
        preferences: &serde_json::Value,
    ) -> Result<(), TorrentClientError>;
}
