//! Storage abstraction trait
//!
//! This module defines the Storage trait that upload backends implement.

use async_trait::async_trait;
use horizon_core::UploadError;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::keys::FileName;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Path escapes upload root: {0}")]
    PathEscape(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(_) | StorageError::PathEscape(_) => {
                UploadError::StorageFailure("Invalid file path".to_string())
            }
            StorageError::NotFound(_) => UploadError::NotFound("File not found".to_string()),
            StorageError::UploadFailed(msg) => {
                UploadError::StorageFailure(format!("Upload error: {}", msg))
            }
            StorageError::DeleteFailed(msg) => {
                UploadError::StorageFailure(format!("Delete error: {}", msg))
            }
            other => UploadError::StorageFailure(other.to_string()),
        }
    }
}

/// Storage abstraction trait
///
/// The persister works against this trait so that its write-verify-rollback
/// logic can be exercised against any backend, including fault-injecting ones.
#[async_trait]
pub trait Storage: Send + Sync {
    /// The upload root every key resolves under
    fn root(&self) -> &Path;

    /// Absolute path of `name` inside the upload root, re-verified by prefix comparison
    fn resolve(&self, name: &FileName) -> StorageResult<PathBuf>;

    /// Create the upload root if it is missing. Idempotent.
    async fn ensure_root(&self) -> StorageResult<()>;

    /// Write a new file; fails if `name` already exists. Returns bytes written.
    async fn write_new(&self, name: &FileName, data: &[u8]) -> StorageResult<u64>;

    /// Atomically replace the contents of an existing file. Returns the new size.
    async fn replace(&self, name: &FileName, data: &[u8]) -> StorageResult<u64>;

    async fn read(&self, name: &FileName) -> StorageResult<Vec<u8>>;

    /// Size in bytes of the stored file as reported by the backend
    async fn content_length(&self, name: &FileName) -> StorageResult<u64>;

    async fn exists(&self, name: &FileName) -> StorageResult<bool>;

    /// Remove a file. Returns `false` if it was already absent.
    async fn delete(&self, name: &FileName) -> StorageResult<bool>;

    /// Lowercase hex SHA-256 of the stored file
    async fn sha256(&self, name: &FileName) -> StorageResult<String>;
}
