//! Recycle bin placement.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use tokio::fs;
use tracing::{debug, error, info};

use super::error::QuarantineError;
use super::types::{DeletionType, QuarantineFailure, QuarantineReport};

const UNCATEGORIZED: &str = "uncategorized";

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// An empty category becomes `uncategorized`.
pub fn sanitize_category(category: &str) -> String {
    let sanitized: String = category
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        sanitized
    }
}

/// `path` with its filesystem root removed; a Windows drive `C:` becomes `C_`.
fn strip_root(path: &Path) -> PathBuf {
    let mut stripped = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                let drive = prefix.as_os_str().to_string_lossy().replace(':', "_");
                stripped.push(drive);
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                stripped.pop();
            }
            Component::Normal(part) => stripped.push(part),
        }
    }
    stripped
}

/// `dest` with `_<YYYYMMDD_HHMMSS>` appended to the file stem.
fn timestamped(dest: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut name = OsString::new();
    if let Some(stem) = dest.file_stem() {
        name.push(stem);
    }
    name.push("_");
    name.push(&stamp);
    if let Some(ext) = dest.extension() {
        name.push(".");
        name.push(ext);
    }
    dest.with_file_name(name)
}

async fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Resolve to an absolute path, following symlinks when the file exists.
async fn resolve(path: &Path) -> PathBuf {
    match fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Moves files into `root/<type>/<category>/<original path>`.
///
/// Never overwrites: a taken destination gets a timestamp suffix, and if that
/// is taken too the file is reported as failed.
#[derive(Debug, Clone)]
pub struct QuarantineMover {
    root: PathBuf,
}

impl QuarantineMover {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination of `path` before collision handling.
    pub fn destination_for(&self, path: &Path, deletion_type: DeletionType, category: &str) -> PathBuf {
        self.root
            .join(deletion_type.as_str())
            .join(sanitize_category(category))
            .join(strip_root(path))
    }

    /// Quarantine every path.
    ///
    /// Failures are collected per file and never abort the batch. In a dry run
    /// nothing on disk changes and every file counts as moved.
    pub async fn quarantine(
        &self,
        paths: &[PathBuf],
        deletion_type: DeletionType,
        category: &str,
        dry_run: bool,
    ) -> QuarantineReport {
        let mut report = QuarantineReport::default();
        let label = format!("{}/{}", deletion_type, sanitize_category(category));

        for path in paths {
            let destination = self.destination_for(&resolve(path).await, deletion_type, category);

            if dry_run {
                info!(
                    "[dry run] Would move to recycle bin ({}): {} -> {}",
                    label,
                    path.display(),
                    destination.display()
                );
                report.moved += 1;
                continue;
            }

            match self.move_file(path, &destination).await {
                Ok(placed) => {
                    info!(
                        "Moved to recycle bin ({}): {} -> {}",
                        label,
                        path.display(),
                        placed.display()
                    );
                    report.moved += 1;
                }
                Err(e) => {
                    error!("Failed to move {} to recycle bin: {}", path.display(), e);
                    report.failures.push(QuarantineFailure {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    async fn move_file(&self, source: &Path, destination: &Path) -> Result<PathBuf, QuarantineError> {
        if !exists(source).await {
            return Err(QuarantineError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        let mut destination = destination.to_path_buf();
        if exists(&destination).await {
            let alternative = timestamped(&destination);
            info!(
                "Destination {} exists, using {}",
                destination.display(),
                alternative.display()
            );
            if exists(&alternative).await {
                return Err(QuarantineError::DestinationExists { path: alternative });
            }
            destination = alternative;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| QuarantineError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        if !Self::try_atomic_move(source, &destination).await.map_err(|e| {
            QuarantineError::move_failed(source.to_path_buf(), destination.clone(), e)
        })? {
            debug!(
                "Cross-filesystem move, copying {} to {}",
                source.display(),
                destination.display()
            );
            fs::copy(source, &destination).await.map_err(|e| {
                QuarantineError::copy_failed(source.to_path_buf(), destination.clone(), e)
            })?;
            fs::remove_file(source)
                .await
                .map_err(|e| QuarantineError::CleanupFailed {
                    path: source.to_path_buf(),
                    source: e,
                })?;
        }

        Ok(destination)
    }

    /// Attempts to move a file atomically (rename).
    ///
    /// `Ok(false)` means source and destination are on different filesystems.
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // Cross-filesystem moves fail with EXDEV (18 on Linux)
                if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }
}
