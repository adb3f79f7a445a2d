use crate::keys::FileName;
use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

const HASH_CHUNK_SIZE: usize = 4096;

/// Local filesystem storage rooted at a single flat upload directory
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// The root is made absolute immediately but is only created on disk by
    /// [`Storage::ensure_root`].
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        if base_path.as_os_str().is_empty() {
            return Err(StorageError::ConfigError(
                "Upload root must not be empty".to_string(),
            ));
        }

        let base_path = std::path::absolute(&base_path).map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to resolve upload root {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Create a LocalStorage and its root directory
    pub async fn open(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let storage = Self::new(base_path)?;
        storage.ensure_root().await?;
        Ok(storage)
    }

    /// Convert a file name to a filesystem path with containment validation
    ///
    /// `FileName` already guarantees a single component; the prefix comparison
    /// and the canonical check catch anything a future key format could let through,
    /// including a symlink planted inside the root.
    fn key_to_path(&self, name: &FileName) -> StorageResult<PathBuf> {
        let path = self.base_path.join(name);

        if path.parent() != Some(self.base_path.as_path()) || !path.starts_with(&self.base_path) {
            return Err(StorageError::PathEscape(path.display().to_string()));
        }

        if let (Ok(base_canonical), Ok(canonical)) =
            (self.base_path.canonicalize(), path.canonicalize())
        {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::PathEscape(path.display().to_string()));
            }
        }

        Ok(path)
    }

    /// Sidecar used by `replace` before the atomic rename
    fn temp_name(name: &FileName) -> StorageResult<FileName> {
        FileName::parse(&format!(".{}.{}.tmp", Uuid::new_v4().simple(), name))
    }

    async fn write_exclusive(&self, path: &Path, data: &[u8]) -> StorageResult<u64> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let written = async {
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(path).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %cleanup,
                    "Failed to remove partially written file"
                );
            }
            return Err(StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )));
        }

        Ok(data.len() as u64)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn root(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, name: &FileName) -> StorageResult<PathBuf> {
        self.key_to_path(name)
    }

    async fn ensure_root(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create upload directory {}: {}",
                self.base_path.display(),
                e
            ))
        })
    }

    async fn write_new(&self, name: &FileName, data: &[u8]) -> StorageResult<u64> {
        let path = self.key_to_path(name)?;
        let start = std::time::Instant::now();

        let size = self.write_exclusive(&path, data).await?;

        tracing::info!(
            path = %path.display(),
            file_name = %name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(size)
    }

    async fn replace(&self, name: &FileName, data: &[u8]) -> StorageResult<u64> {
        let path = self.key_to_path(name)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let temp = Self::temp_name(name)?;
        let temp_path = self.key_to_path(&temp)?;
        let size = self.write_exclusive(&temp_path, data).await?;

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to replace file {}: {}",
                path.display(),
                e
            )));
        }

        tracing::debug!(
            path = %path.display(),
            file_name = %name,
            size_bytes = size,
            "Local storage replace successful"
        );

        Ok(size)
    }

    async fn read(&self, name: &FileName) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(name)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(name.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    async fn content_length(&self, name: &FileName) -> StorageResult<u64> {
        let path = self.key_to_path(name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn exists(&self, name: &FileName) -> StorageResult<bool> {
        let path = self.key_to_path(name)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, name: &FileName) -> StorageResult<bool> {
        let path = self.key_to_path(name)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }

        match fs::remove_file(&path).await {
            Ok(()) => {}
            // Lost a race with a concurrent delete
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::info!(
            path = %path.display(),
            file_name = %name,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(true)
    }

    async fn sha256(&self, name: &FileName) -> StorageResult<String> {
        let path = self.key_to_path(name)?;

        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(hex::encode(hasher.finalize()))
    }
}
