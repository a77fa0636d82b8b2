//! Filesystem-backed archive state.
//!
//! The archive keeps no database. A submission is archived iff its metadata
//! marker file (`<originalFilename>.<id>.html`) exists directly in the
//! submission's directory; the directory contents *are* the index. The
//! helpers here uphold the ordering that makes that sound: payload bytes are
//! fsynced before the marker ever appears, and the marker appears only via
//! an atomic rename.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Directory permissions for newly created archive directories.
#[cfg(unix)]
const ARCHIVE_DIR_MODE: u32 = 0o750;

/// Errors raised by archive filesystem operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem operation failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The target path is not in lexically-normal form.
    #[error("refusing to write to non-canonical path: {path}")]
    SuspiciousPath {
        /// The rejected path.
        path: PathBuf,
    },
}

impl ArchiveError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Returns true iff a completion marker for `id` exists directly in `dir`.
///
/// The marker name embeds the original filename, so the check matches on
/// the `.<id>.html` suffix. A missing or unreadable directory simply means
/// nothing is archived there yet; erring toward "not archived" only costs a
/// re-download, never a lost submission.
pub async fn is_archived(id: u64, dir: &Path) -> bool {
    let suffix = format!(".{id}.html");
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return false;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().ends_with(&suffix) {
            return true;
        }
    }
    false
}

/// Creates `dir` and any missing parents, owner-rwx.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] if directory creation fails.
pub async fn create_archive_dir(dir: &Path) -> Result<(), ArchiveError> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(ARCHIVE_DIR_MODE);
    builder
        .create(dir)
        .await
        .map_err(|e| ArchiveError::io(dir, e))
}

/// Writes `data` to `path` and fsyncs it.
///
/// The fsync is what gives the marker protocol its crash-safety: the
/// submission payload must be durable before the marker rename happens, so
/// an interruption leaves either no marker (safe re-attempt) or a complete
/// pair.
///
/// # Errors
///
/// Returns [`ArchiveError::SuspiciousPath`] for a non-canonical target path
/// and [`ArchiveError::Io`] on write or sync failure.
pub async fn write_durably(path: &Path, data: &[u8]) -> Result<(), ArchiveError> {
    ensure_clean_path(path)?;

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ArchiveError::io(path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| ArchiveError::io(path, e))?;
    file.sync_all()
        .await
        .map_err(|e| ArchiveError::io(path, e))?;

    debug!(path = %path.display(), bytes = data.len(), "wrote and synced file");
    Ok(())
}

/// Rejects paths that are not already in lexically-normal form.
///
/// Target paths are built from sanitized URL segments; a `.`/`..` component
/// or a redundant separator can only mean a crafted name slipped through.
///
/// # Errors
///
/// Returns [`ArchiveError::SuspiciousPath`] when the path normalizes to
/// something other than itself.
pub fn ensure_clean_path(path: &Path) -> Result<(), ArchiveError> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir | Component::ParentDir => {
                return Err(ArchiveError::SuspiciousPath {
                    path: path.to_path_buf(),
                });
            }
            other => normalized.push(other),
        }
    }
    // Compare the raw strings: Path equality ignores redundant separators.
    if normalized.as_os_str() != path.as_os_str() {
        return Err(ArchiveError::SuspiciousPath {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
