use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};
use tracing::{info, warn};

use crate::repository::{RepoError, RepositoryState};

/// Public URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads/";

const FALLBACK_NAME: &str = "upload";
// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: u32 = 16;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not write upload: {0}")]
    Write(#[source] std::io::Error),
    #[error("could not read upload directory: {0}")]
    Scan(#[source] std::io::Error),
    #[error(transparent)]
    Store(#[from] RepoError),
}

impl From<StorageError> for crate::error::ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Store(repo) => repo.into(),
            other => crate::error::ApiError::Storage(other.to_string()),
        }
    }
}

/// UploadManager
///
/// Owns the upload directory. Files are flat, named
/// `<unix-nanos>_<sanitized base name>`, and addressed publicly as
/// `/uploads/<name>`.
pub struct UploadManager {
    dir: PathBuf,
    // Files younger than this are never reclaimed.
    grace: Duration,
}

/// UploadState
///
/// Shared handle to the upload manager used in the application state.
pub type UploadState = Arc<UploadManager>;

impl UploadManager {
    /// Creates the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>, grace: Duration) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(StorageError::Write)?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir, grace })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// store
    ///
    /// Writes `bytes` under a fresh collision-resistant name derived from the
    /// client's filename and returns the public path. Only the base name of the
    /// client value is used, so the file always lands directly in the upload
    /// directory.
    pub async fn store(&self, bytes: &[u8], original_name: &str) -> Result<String, StorageError> {
        let base = sanitize_filename(original_name);
        let mut stamp = unix_nanos();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = format!("{stamp}_{base}");
            let path = self.dir.join(&name);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    write_or_discard(&path, file, bytes).await?;
                    info!(file = %name, size = bytes.len(), "stored upload");
                    return Ok(format!("{PUBLIC_PREFIX}{name}"));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(StorageError::Write(e)),
            }
        }
        Err(StorageError::Write(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "no free upload name",
        )))
    }

    /// True when `public_path` names a file that currently exists in the upload
    /// directory. Paths outside `/uploads/` or with directory components never do.
    pub async fn exists(&self, public_path: &str) -> bool {
        let Some(name) = public_path.strip_prefix(PUBLIC_PREFIX) else {
            return false;
        };
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return false;
        }
        fs::metadata(self.dir.join(name))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// reconcile
    ///
    /// Deletes stored files no card references and returns how many went.
    ///
    /// A file is kept if it is younger than the grace period, if it was in the
    /// referenced set snapshotted at the start of the scan, or if a card
    /// references it when re-checked right before deletion. Concurrent card
    /// writes can therefore only cause over-retention.
    pub async fn reconcile(&self, repo: &RepositoryState) -> Result<usize, StorageError> {
        let referenced = repo.card_images().await?;
        let mut entries = fs::read_dir(&self.dir).await.map_err(StorageError::Scan)?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Scan)? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if self.within_grace(meta.modified().ok()) {
                continue;
            }

            let public = format!("{PUBLIC_PREFIX}{name}");
            if referenced.contains(&public) {
                continue;
            }
            match repo.count_cards_with_image(&public).await {
                Ok(0) => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(file = %name, error = %e, "skipping file, reference check failed");
                    continue;
                }
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    info!(file = %name, "removed orphaned upload");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(file = %name, error = %e, "could not remove orphaned upload"),
            }
        }

        Ok(removed)
    }

    fn within_grace(&self, modified: Option<SystemTime>) -> bool {
        match modified.and_then(|m| SystemTime::now().duration_since(m).ok()) {
            Some(age) => age < self.grace,
            // Unknown age or a timestamp in the future: keep it.
            None => true,
        }
    }
}

/// Writes and flushes `bytes`. On failure the partial file at `path` is
/// removed before the error is returned.
async fn write_or_discard<W>(path: &Path, mut file: W, bytes: &[u8]) -> Result<(), StorageError>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    let Err(e) = written else {
        return Ok(());
    };

    drop(file);
    if let Err(cleanup) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %cleanup, "could not remove partial upload");
    }
    Err(StorageError::Write(e))
}

/// Background task that reclaims orphaned uploads on a fixed interval.
pub async fn run_sweep_loop(uploads: UploadState, repo: RepositoryState, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately; skip it so startup is not a sweep.
    interval.tick().await;

    loop {
        interval.tick().await;

        match uploads.reconcile(&repo).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: removed {} orphaned uploads", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}

/// sanitize_filename
///
/// Reduces a client-supplied filename to a safe base name: the last path
/// component only, with every character outside `[A-Za-z0-9._-]` replaced by
/// `_`. Empty names and the dot entries fall back to `upload`.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        pin::Pin,
        task::{Context, Poll},
    };

    use super::*;

    // Accepts nothing, like a full disk.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::other("disk full")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_write_removes_partial_file() {
        let dir = std::env::temp_dir().join(format!("bell-storage-{}", unix_nanos()));
        fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("partial.bin");
        fs::write(&path, b"half").await.unwrap();

        let result = write_or_discard(&path, FullDisk, b"payload").await;

        assert!(matches!(result, Err(StorageError::Write(_))));
        assert!(!path.exists());
        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn successful_write_keeps_file() {
        let dir = std::env::temp_dir().join(format!("bell-storage-{}", unix_nanos()));
        fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("whole.bin");
        let file = fs::File::create(&path).await.unwrap();

        write_or_discard(&path, file, b"payload").await.unwrap();

        assert_eq!(fs::read(&path).await.unwrap(), b"payload");
        let _ = fs::remove_dir_all(&dir).await;
    }
}
