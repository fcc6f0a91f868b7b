//! Filesystem-based object storage.
//!
//! Stores each blob as a file, so checkpoints survive process restarts
//! without a cloud account. Used by the `eventide` binary and by restart
//! tests.
//!
//! # Directory Structure
//!
//! Blobs are stored at: `{base_path}/{container}/{name}`, so a lease for
//! partition 3 of group `$Default` on hub `telemetry` lives at
//! `{base_path}/telemetry/$Default/3`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::error::{BlobError, BlobResult};
use crate::storage::{BlobKey, ObjectStorage};

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for filesystem-based object storage.
#[derive(Debug, Clone)]
pub struct FilesystemConfig {
    /// Base directory for all blobs.
    pub base_path: PathBuf,

    /// Whether to call fsync after writes for durability.
    ///
    /// Default: `true`. Set to `false` for faster tests.
    pub sync_on_write: bool,

    /// Create base directory if it doesn't exist.
    ///
    /// Default: `true`.
    pub create_if_missing: bool,
}

impl FilesystemConfig {
    /// Creates a new configuration with the given base path.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            sync_on_write: true,
            create_if_missing: true,
        }
    }

    /// Creates a configuration for tests (no fsync).
    #[must_use]
    pub fn for_testing(base_path: impl Into<PathBuf>) -> Self {
        Self {
            sync_on_write: false,
            ..Self::new(base_path)
        }
    }
}

// -----------------------------------------------------------------------------
// FilesystemObjectStorage
// -----------------------------------------------------------------------------

/// Filesystem-based object storage implementation.
#[derive(Debug, Clone)]
pub struct FilesystemObjectStorage {
    config: FilesystemConfig,
    /// Disambiguates temp files written concurrently by this process.
    temp_counter: Arc<AtomicU64>,
}

impl FilesystemObjectStorage {
    /// Creates a new filesystem storage with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `create_if_missing` is true and directory creation fails.
    ///
    /// # Panics
    ///
    /// Panics if `base_path` is empty.
    pub async fn new(config: FilesystemConfig) -> BlobResult<Self> {
        assert!(
            !config.base_path.as_os_str().is_empty(),
            "base_path must not be empty"
        );

        if config.create_if_missing {
            tokio::fs::create_dir_all(&config.base_path)
                .await
                .map_err(|e| BlobError::Io {
                    operation: "create_base_dir",
                    message: format!(
                        "failed to create base directory '{}': {e}",
                        config.base_path.display()
                    ),
                })?;
        }

        Ok(Self {
            config,
            temp_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Returns the full filesystem path for a blob key.
    fn blob_path(&self, key: &BlobKey) -> PathBuf {
        self.config
            .base_path
            .join(key.container())
            .join(key.name())
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        path.with_extension(format!("tmp-{}-{n}", std::process::id()))
    }

    /// Ensures parent directories exist for a path.
    async fn ensure_parent_dirs(path: &Path) -> BlobResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Io {
                    operation: "create_parent_dirs",
                    message: format!(
                        "failed to create parent directories for '{}': {e}",
                        path.display()
                    ),
                })?;
        }
        Ok(())
    }

    /// Writes `data` to a fresh temp file next to `path` and returns its path.
    async fn write_temp(&self, key: &BlobKey, path: &Path, data: &[u8]) -> BlobResult<PathBuf> {
        let temp_path = self.temp_path(path);
        let upload_failed = |what: &str, e: std::io::Error| BlobError::UploadFailed {
            key: key.to_string(),
            message: format!("failed to {what}: {e}"),
        };

        let result = async {
            let mut file = tokio::fs::File::create(&temp_path)
                .await
                .map_err(|e| upload_failed("create temp file", e))?;
            file.write_all(data)
                .await
                .map_err(|e| upload_failed("write data", e))?;
            if self.config.sync_on_write {
                file.sync_all()
                    .await
                    .map_err(|e| upload_failed("sync file", e))?;
            }
            Ok::<(), BlobError>(())
        }
        .await;

        // Clean up temp file on error.
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(temp_path)
    }
}

// -----------------------------------------------------------------------------
// ObjectStorage Implementation
// -----------------------------------------------------------------------------

#[async_trait]
impl ObjectStorage for FilesystemObjectStorage {
    async fn put(&self, key: &BlobKey, data: Bytes) -> BlobResult<()> {
        let path = self.blob_path(key);
        Self::ensure_parent_dirs(&path).await?;
        let temp_path = self.write_temp(key, &path, &data).await?;

        // Atomic rename.
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(BlobError::UploadFailed {
                key: key.to_string(),
                message: format!("failed to rename temp file: {e}"),
            });
        }
        Ok(())
    }

    async fn put_if_absent(&self, key: &BlobKey, data: Bytes) -> BlobResult<bool> {
        let path = self.blob_path(key);
        Self::ensure_parent_dirs(&path).await?;
        let temp_path = self.write_temp(key, &path, &data).await?;

        // hard_link fails if the target exists, so readers never observe a
        // partially written blob and an existing blob is never replaced.
        let linked = tokio::fs::hard_link(&temp_path, &path).await;
        let _ = tokio::fs::remove_file(&temp_path).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(BlobError::UploadFailed {
                key: key.to_string(),
                message: format!("failed to link blob: {e}"),
            }),
        }
    }

    async fn get(&self, key: &BlobKey) -> BlobResult<Bytes> {
        let path = self.blob_path(key);

        let data = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BlobError::NotFound {
                    key: key.to_string(),
                }
            } else {
                BlobError::DownloadFailed {
                    key: key.to_string(),
                    message: format!("failed to read file: {e}"),
                }
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn exists(&self, key: &BlobKey) -> BlobResult<bool> {
        let path = self.blob_path(key);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| BlobError::Io {
                operation: "exists",
                message: format!("failed to stat '{}': {e}", path.display()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn storage(dir: &TempDir) -> FilesystemObjectStorage {
        FilesystemObjectStorage::new(FilesystemConfig::for_testing(dir.path()))
            .await
            .unwrap()
    }

    fn key() -> BlobKey {
        BlobKey::new("telemetry", "$Default/3")
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        storage.put(&key(), Bytes::from("v1")).await.unwrap();
        storage.put(&key(), Bytes::from("v2")).await.unwrap();

        assert_eq!(storage.get(&key()).await.unwrap(), Bytes::from("v2"));
        assert!(dir.path().join("telemetry").join("$Default").join("3").exists());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        assert!(matches!(
            storage.get(&key()).await,
            Err(BlobError::NotFound { .. })
        ));
        assert!(!storage.exists(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_if_absent_does_not_clobber() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        assert!(storage
            .put_if_absent(&key(), Bytes::from("first"))
            .await
            .unwrap());
        assert!(!storage
            .put_if_absent(&key(), Bytes::from("second"))
            .await
            .unwrap());
        assert_eq!(storage.get(&key()).await.unwrap(), Bytes::from("first"));
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        storage.put_if_absent(&key(), Bytes::from("a")).await.unwrap();
        storage.put_if_absent(&key(), Bytes::from("b")).await.unwrap();
        storage.put(&key(), Bytes::from("c")).await.unwrap();

        let mut entries = std::fs::read_dir(dir.path().join("telemetry").join("$Default"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        entries.sort();
        assert_eq!(entries, vec!["3".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_creators_one_wins() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .put_if_absent(&key(), Bytes::from(format!("writer-{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
