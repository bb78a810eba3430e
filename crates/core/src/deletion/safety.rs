//! Cross-seed safety check.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::torrent_client::{TorrentClientError, TorrentReader};

/// The check could not establish whether files are shared.
///
/// Never to be read as "not shared": it blocks the destructive path.
#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("Failed to list torrents: {0}")]
    ListTorrents(#[source] TorrentClientError),

    #[error("Failed to list files of {name} ({hash}): {source}")]
    ListFiles {
        hash: String,
        name: String,
        #[source]
        source: TorrentClientError,
    },

    #[error("Save path of {name} ({hash}) is unknown, its files cannot be compared")]
    UnknownLocation { hash: String, name: String },
}

/// Outcome of a cross-seed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossSeedCheck {
    /// No other torrent references the candidate files.
    Clear,
    /// Names of the torrents sharing at least one candidate file.
    Shared(Vec<String>),
}

impl CrossSeedCheck {
    pub fn is_shared(&self) -> bool {
        matches!(self, CrossSeedCheck::Shared(_))
    }
}

/// Canonical absolute form of `path`.
///
/// Symlinks are resolved when the path exists; otherwise the path is made
/// absolute lexically.
pub async fn canonical_path(path: &Path) -> PathBuf {
    match fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Detects files shared with other torrents.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossSeedChecker;

impl CrossSeedChecker {
    pub fn new() -> Self {
        Self
    }

    /// Check whether any torrent other than `excluding_hash` references one of
    /// `candidates`.
    ///
    /// Reports each sharing torrent once, on its first overlapping file. Any
    /// enumeration failure is an error, and so is another torrent whose save
    /// path is unknown.
    pub async fn check<R: TorrentReader + ?Sized>(
        &self,
        reader: &R,
        candidates: &[PathBuf],
        excluding_hash: &str,
    ) -> Result<CrossSeedCheck, SafetyError> {
        if candidates.is_empty() {
            return Ok(CrossSeedCheck::Clear);
        }

        let mut resolved = HashSet::with_capacity(candidates.len());
        for path in candidates {
            resolved.insert(canonical_path(path).await);
        }
        let torrents = reader
            .list_torrents()
            .await
            .map_err(SafetyError::ListTorrents)?;

        let mut sharing = Vec::new();
        for torrent in torrents.iter().filter(|t| t.hash != excluding_hash) {
            let Some(save_path) = torrent.save_path.as_deref() else {
                warn!(
                    "Cannot compare files of '{}' ({}): no save path",
                    torrent.name, torrent.hash
                );
                return Err(SafetyError::UnknownLocation {
                    hash: torrent.hash.clone(),
                    name: torrent.name.clone(),
                });
            };
            let files = reader
                .list_files(&torrent.hash)
                .await
                .map_err(|source| SafetyError::ListFiles {
                    hash: torrent.hash.clone(),
                    name: torrent.name.clone(),
                    source,
                })?;

            for file in &files {
                let path = canonical_path(&Path::new(save_path).join(&file.name)).await;
                if resolved.contains(&path) {
                    debug!("{} shares {}", torrent.name, path.display());
                    sharing.push(torrent.name.clone());
                    break;
                }
            }
        }

        if sharing.is_empty() {
            Ok(CrossSeedCheck::Clear)
        } else {
            Ok(CrossSeedCheck::Shared(sharing))
        }
    }
}
