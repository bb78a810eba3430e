//! qBittorrent torrent client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{
    TorrentClient, TorrentClientError, Torrent, TorrentFile, TorrentReader, TorrentState, Tracker,
    TrackerStatus,
};

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Session ID cookie (refreshed on auth failure).
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            // Session cookie is stored by the cookie jar
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    /// Drop the session and log in again.
    async fn reauthenticate(&self) -> Result<(), TorrentClientError> {
        warn!("qBittorrent session expired, re-authenticating");
        {
            let mut session = self.session.write().await;
            *session = None;
        }
        self.login().await
    }

    /// Make an authenticated GET request.
    async fn get(&self, endpoint: &str) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self.client.get(&url).send().await.map_err(map_send_error)?;

        if response.status().as_u16() == 403 {
            self.reauthenticate().await?;
            let response = self.client.get(&url).send().await.map_err(map_send_error)?;
            return read_body(endpoint, response).await;
        }

        read_body(endpoint, response).await
    }

    /// Make an authenticated POST request with form data.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(map_send_error)?;

        if response.status().as_u16() == 403 {
            self.reauthenticate().await?;
            let response = self
                .client
                .post(&url)
                .form(params)
                .send()
                .await
                .map_err(map_send_error)?;
            return read_body(endpoint, response).await;
        }

        read_body(endpoint, response).await
    }

    /// POST to `endpoint`, retrying on `fallback` when the endpoint does not exist.
    ///
    /// qBittorrent 5 renamed pause/resume to stop/start.
    async fn post_form_with_fallback(
        &self,
        endpoint: &str,
        fallback: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        match self.post_form(endpoint, params).await {
            Err(TorrentClientError::EndpointNotFound(_)) => {
                debug!("{} not available, using {}", endpoint, fallback);
                self.post_form(fallback, params).await
            }
            other => other,
        }
    }
}

fn map_send_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

async fn read_body(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<String, TorrentClientError> {
    let status = response.status();
    if status.as_u16() == 404 {
        return Err(TorrentClientError::EndpointNotFound(endpoint.to_string()));
    }
    if !status.is_success() {
        return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
    }

    response
        .text()
        .await
        .map_err(|e| TorrentClientError::ApiError(e.to_string()))
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, TorrentClientError> {
    serde_json::from_str(body)
        .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))
}

/// Join hashes the way qBittorrent expects them in batch requests.
fn join_hashes(hashes: &[String]) -> String {
    hashes
        .iter()
        .map(|h| h.to_lowercase())
        .collect::<Vec<_>>()
        .join("|")
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    tags: String,
}

impl QBTorrentInfo {
    fn into_torrent(self) -> Torrent {
        Torrent {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            added_at: timestamp_to_datetime(self.added_on),
            completed_at: timestamp_to_datetime(self.completion_on),
            save_path: if self.save_path.is_empty() {
                None
            } else {
                Some(self.save_path)
            },
            category: if self.category.is_empty() {
                None
            } else {
                Some(self.category)
            },
            tags: self
                .tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            trackers: Vec::new(),
        }
    }
}

/// qBittorrent tracker response.
#[derive(Debug, Deserialize)]
struct QBTracker {
    url: String,
    status: i64,
    #[serde(default)]
    msg: String,
}

/// qBittorrent file response.
#[derive(Debug, Deserialize)]
struct QBFile {
    name: String,
    #[serde(default)]
    size: i64,
}

/// Parse qBittorrent state string to TorrentState.
fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "downloading" | "forcedDL" | "metaDL" | "forcedMetaDL" | "allocating" => {
            TorrentState::Downloading
        }
        "uploading" | "forcedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" | "stalledUP" => TorrentState::Stalled,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

#[async_trait]
impl TorrentReader for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn list_torrents(&self) -> Result<Vec<Torrent>, TorrentClientError> {
        let response = self.get("/api/v2/torrents/info").await?;
        let torrents: Vec<QBTorrentInfo> = parse_json(&response)?;
        Ok(torrents.into_iter().map(QBTorrentInfo::into_torrent).collect())
    }

    async fn list_trackers(&self, hash: &str) -> Result<Vec<Tracker>, TorrentClientError> {
        let endpoint = format!(
            "/api/v2/torrents/trackers?hash={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let response = match self.get(&endpoint).await {
            Err(TorrentClientError::EndpointNotFound(_)) => {
                return Err(TorrentClientError::TorrentNotFound(hash.to_string()))
            }
            other => other?,
        };
        let trackers: Vec<QBTracker> = parse_json(&response)?;
        Ok(trackers
            .into_iter()
            .map(|t| Tracker {
                url: t.url,
                status: TrackerStatus::from_code(t.status),
                message: t.msg,
            })
            .collect())
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        let endpoint = format!(
            "/api/v2/torrents/files?hash={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let response = match self.get(&endpoint).await {
            Err(TorrentClientError::EndpointNotFound(_)) => {
                return Err(TorrentClientError::TorrentNotFound(hash.to_string()))
            }
            other => other?,
        };
        let files: Vec<QBFile> = parse_json(&response)?;
        Ok(files
            .into_iter()
            .map(|f| TorrentFile {
                name: f.name,
                size: f.size.max(0) as u64,
            })
            .collect())
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    async fn add_tags(&self, hashes: &[String], tags: &[String]) -> Result<(), TorrentClientError> {
        if hashes.is_empty() || tags.is_empty() {
            return Ok(());
        }
        let hashes = join_hashes(hashes);
        let tags = tags.join(",");
        self.post_form(
            "/api/v2/torrents/addTags",
            &[("hashes", &hashes), ("tags", &tags)],
        )
        .await?;
        Ok(())
    }

    async fn remove_tags(
        &self,
        hashes: &[String],
        tags: &[String],
    ) -> Result<(), TorrentClientError> {
        if hashes.is_empty() || tags.is_empty() {
            return Ok(());
        }
        let hashes = join_hashes(hashes);
        let tags = tags.join(",");
        self.post_form(
            "/api/v2/torrents/removeTags",
            &[("hashes", &hashes), ("tags", &tags)],
        )
        .await?;
        Ok(())
    }

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let delete_str = if delete_files { "true" } else { "false" };

        self.post_form(
            "/api/v2/torrents/delete",
            &[("hashes", &hash_lower), ("deleteFiles", delete_str)],
        )
        .await?;

        Ok(())
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let hashes = join_hashes(hashes);
        self.post_form_with_fallback(
            "/api/v2/torrents/pause",
            "/api/v2/torrents/stop",
            &[("hashes", &hashes)],
        )
        .await?;
        Ok(())
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let hashes = join_hashes(hashes);
        self.post_form_with_fallback(
            "/api/v2/torrents/resume",
            "/api/v2/torrents/start",
            &[("hashes", &hashes)],
        )
        .await?;
        Ok(())
    }

    async fn set_share_limits(
        &self,
        hashes: &[String],
        ratio_limit: f64,
        seeding_time_limit: i64,
    ) -> Result<(), TorrentClientError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let hashes = join_hashes(hashes);
        let ratio = ratio_limit.to_string();
        let minutes = seeding_time_limit.to_string();
        self.post_form(
            "/api/v2/torrents/setShareLimits",
            &[
                ("hashes", &hashes),
                ("ratioLimit", &ratio),
                ("seedingTimeLimit", &minutes),
                ("inactiveSeedingTimeLimit", "-2"),
            ],
        )
        .await?;
        Ok(())
    }

    async fn set_preferences(
        &self,
        preferences: &serde_json::Value,
    ) -> Result<(), TorrentClientError> {
        let json = preferences.to_string();
        self.post_form("/api/v2/app/setPreferences", &[("json", &json)])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_qb_state_downloading() {
        assert_eq!(parse_qb_state("downloading"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("forcedDL"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("metaDL"), TorrentState::Downloading);
    }

    #[test]
    fn test_parse_qb_state_paused() {
        assert_eq!(parse_qb_state("pausedDL"), TorrentState::Paused);
        assert_eq!(parse_qb_state("pausedUP"), TorrentState::Paused);
        assert_eq!(parse_qb_state("stoppedDL"), TorrentState::Paused);
        assert_eq!(parse_qb_state("stoppedUP"), TorrentState::Paused);
    }

    #[test]
    fn test_parse_qb_state_other() {
        assert_eq!(parse_qb_state("uploading"), TorrentState::Seeding);
        assert_eq!(parse_qb_state("stalledUP"), TorrentState::Stalled);
        assert_eq!(parse_qb_state("missingFiles"), TorrentState::Error);
        assert_eq!(parse_qb_state("something_else"), TorrentState::Unknown);
    }

    #[test]
    fn test_timestamp_to_datetime() {
        let dt = timestamp_to_datetime(1703980800).unwrap();
        assert_eq!(dt.year(), 2023);

        assert!(timestamp_to_datetime(-1).is_none());
        assert!(timestamp_to_datetime(0).is_none());
    }

    #[test]
    fn test_join_hashes() {
        let hashes = vec!["ABC".to_string(), "def".to_string()];
        assert_eq!(join_hashes(&hashes), "abc|def");
        assert_eq!(join_hashes(&[]), "");
    }

    #[test]
    fn test_torrent_info_normalisation() {
        let json = r#"[{
            "hash": "ABC123",
            "name": "Test Torrent",
            "state": "stalledUP",
            "progress": 1.0,
            "size": 1000000,
            "added_on": 1703980800,
            "completion_on": 0,
            "save_path": "/downloads",
            "category": "",
            "tags": "unregistered, AITHER,"
        }]"#;

        let infos: Vec<QBTorrentInfo> = parse_json(json).unwrap();
        let torrent = infos.into_iter().next().unwrap().into_torrent();

        assert_eq!(torrent.hash, "abc123");
        assert_eq!(torrent.state, TorrentState::Stalled);
        assert_eq!(torrent.size_bytes, 1000000);
        assert!(torrent.added_at.is_some());
        assert!(torrent.completed_at.is_none());
        assert_eq!(torrent.save_path.as_deref(), Some("/downloads"));
        assert_eq!(torrent.category, None);
        assert_eq!(torrent.tags.len(), 2);
        assert!(torrent.has_tag("unregistered"));
        assert!(torrent.has_tag("AITHER"));
    }

    #[test]
    fn test_tracker_parsing() {
        let json = r#"[
            {"url": "** [DHT] **", "status": 0, "msg": ""},
            {"url": "https://tracker.example/announce", "status": 4, "msg": "Unregistered torrent"}
        ]"#;
        let trackers: Vec<QBTracker> = parse_json(json).unwrap();
        assert_eq!(trackers.len(), 2);
        assert_eq!(TrackerStatus::from_code(trackers[1].status), TrackerStatus::NotWorking);
        assert_eq!(trackers[1].msg, "Unregistered torrent");
    }

    #[test]
    fn test_client_construction() {
        let client = QBittorrentClient::new(QBittorrentConfig {
            url: "http://localhost:8080/".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.name(), "qbittorrent");
    }
}
