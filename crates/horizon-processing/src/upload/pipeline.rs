//! Upload persistence: validate → name → write → verify → recompress.
//!
//! [`UploadPersister`] owns no mutable state. Concurrent uploads coordinate only
//! through their random names and the create-new semantics of
//! [`Storage::write_new`], so a persister is shared freely behind an `Arc`.

use anyhow::Context;
use chrono::Utc;
use horizon_core::{
    AppConfig, CompressionReport, CompressionSettings, DeleteOutcome, FileCategory, StoredFile,
    UploadError, UploadPolicy, UploadResult,
};
use horizon_storage::{FileName, LocalStorage, Storage};
use std::io::{Read, Seek};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::naming::generate_name;
use crate::candidate::UploadCandidate;
use crate::image::ImageCompressor;
use crate::sniff::{default_sniffer, ContentSniffer, NoopSniffer};
use crate::validator::UploadValidator;

const CORRUPTION_REASON: &str = "File corruption detected during save";

/// Per-upload post-processing switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOptions {
    pub compress_images: bool,
    pub compression: CompressionSettings,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            compress_images: true,
            compression: CompressionSettings::default(),
        }
    }
}

pub struct UploadPersister {
    validator: Arc<UploadValidator>,
    storage: Arc<dyn Storage>,
    options: PersistOptions,
}

impl UploadPersister {
    pub fn new(validator: Arc<UploadValidator>, storage: Arc<dyn Storage>) -> Self {
        Self {
            validator,
            storage,
            options: PersistOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PersistOptions) -> Self {
        self.options = options;
        self
    }

    /// Persister over a [`LocalStorage`] at the configured upload root
    pub fn from_config(config: &AppConfig) -> UploadResult<Self> {
        let sniffer: Arc<dyn ContentSniffer> = if config.mime_sniffing {
            default_sniffer()
        } else {
            Arc::new(NoopSniffer)
        };
        let validator = UploadValidator::new(config.policy.clone(), sniffer);
        let storage = LocalStorage::new(config.upload_root.clone())?;

        Ok(Self::new(Arc::new(validator), Arc::new(storage)).with_options(PersistOptions {
            compress_images: config.compress_images,
            compression: config.compression,
        }))
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn options(&self) -> &PersistOptions {
        &self.options
    }

    /// Validate and durably store an upload with the persister's options
    pub async fn persist<R: Read + Seek>(
        &self,
        candidate: &mut UploadCandidate<R>,
        prefix: Option<&str>,
    ) -> UploadResult<StoredFile> {
        let options = self.options;
        self.persist_with(candidate, prefix, &options).await
    }

    /// Validate and durably store an upload.
    ///
    /// On success the file exists under the upload root with the reported size.
    /// On any failure after the write started, nothing is left behind.
    #[tracing::instrument(skip(self, candidate, options), fields(file_name = %candidate.filename()))]
    pub async fn persist_with<R: Read + Seek>(
        &self,
        candidate: &mut UploadCandidate<R>,
        prefix: Option<&str>,
        options: &PersistOptions,
    ) -> UploadResult<StoredFile> {
        let start = Instant::now();

        let validated = self.validator.check(candidate)?;

        // The declared size was checked; the stream itself is bounded here too
        let (limit, _) = self.validator.policy().size_limit_for(validated.category);
        let expected_size = candidate.stream_len().map_err(read_failure)?;
        let data = candidate
            .read_from_start(limit.saturating_add(1))
            .map_err(read_failure)?;
        self.validator
            .validate_size(data.len() as u64, validated.category)?;

        let generated = generate_name(candidate.filename(), &validated.extension, prefix);
        let name = FileName::parse(&generated)?;

        self.storage.ensure_root().await?;
        let path = self.storage.resolve(&name)?;
        self.storage.write_new(&name, &data).await?;

        let stored_size = match self.storage.content_length(&name).await {
            Ok(size) => size,
            Err(e) => {
                self.rollback(&name).await;
                return Err(e.into());
            }
        };
        if stored_size != expected_size {
            tracing::error!(
                file_name = %name,
                expected_bytes = expected_size,
                stored_bytes = stored_size,
                "Stored size does not match upload, removing file"
            );
            self.rollback(&name).await;
            return Err(UploadError::StorageFailure(CORRUPTION_REASON.to_string()));
        }

        let mut byte_size = stored_size;
        let mut compression = None;
        if validated.category == FileCategory::Image && options.compress_images {
            match self.recompress_stored(&name, data, options.compression).await {
                Ok(Some(report)) => {
                    byte_size = report.byte_size;
                    compression = Some(report);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    file_name = %name,
                    error = %e,
                    "Image compression failed, keeping original"
                ),
            }
        }

        let duration = start.elapsed();
        tracing::info!(
            file_name = %name,
            category = %validated.category,
            size_bytes = byte_size,
            original_size_bytes = expected_size,
            duration_ms = duration.as_millis() as u64,
            "Upload persisted"
        );

        Ok(StoredFile {
            generated_name: name.into_string(),
            absolute_path: path.display().to_string(),
            byte_size,
            category: validated.category,
            original_size: expected_size,
            stored_at: Utc::now(),
            compression,
        })
    }

    /// Recompress a stored image off the async executor and replace it when the
    /// result was downscaled or came out smaller.
    async fn recompress_stored(
        &self,
        name: &FileName,
        data: Vec<u8>,
        settings: CompressionSettings,
    ) -> anyhow::Result<Option<CompressionReport>> {
        let original_size = data.len() as u64;
        let compressed =
            tokio::task::spawn_blocking(move || ImageCompressor::recompress(&data, &settings))
                .await
                .context("compression task failed")??;

        let Some(compressed) = compressed else {
            return Ok(None);
        };
        if !compressed.report.resized && compressed.report.byte_size >= original_size {
            tracing::debug!(
                file_name = %name,
                original_bytes = original_size,
                compressed_bytes = compressed.report.byte_size,
                "Recompression did not help, keeping original"
            );
            return Ok(None);
        }

        let written = self
            .storage
            .replace(name, &compressed.data)
            .await
            .context("failed to replace stored image")?;
        anyhow::ensure!(
            written == compressed.report.byte_size,
            "replaced image has {} bytes, expected {}",
            written,
            compressed.report.byte_size
        );

        Ok(Some(compressed.report))
    }

    async fn rollback(&self, name: &FileName) {
        if let Err(e) = self.storage.delete(name).await {
            tracing::error!(file_name = %name, error = %e, "Failed to remove rejected upload");
        }
    }

    /// Remove a stored upload. Deleting a missing file is not an error.
    pub async fn delete(&self, generated_name: &str) -> UploadResult<DeleteOutcome> {
        let name = parse_stored_name(generated_name)?;

        let outcome = if self.storage.delete(&name).await? {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        };

        tracing::info!(file_name = %name, outcome = ?outcome, "Upload delete requested");
        Ok(outcome)
    }

    /// Lowercase hex SHA-256 of a stored upload
    pub async fn hash(&self, generated_name: &str) -> UploadResult<String> {
        let name = parse_stored_name(generated_name)?;
        if !self.storage.exists(&name).await? {
            return Err(UploadError::NotFound("File not found".to_string()));
        }
        Ok(self.storage.sha256(&name).await?)
    }

    /// Persist the file of an upload request; `None` is a request without a file.
    pub async fn handle_upload<R: Read + Seek>(
        &self,
        candidate: Option<&mut UploadCandidate<R>>,
        prefix: Option<&str>,
    ) -> UploadResult<StoredFile> {
        let candidate =
            candidate.ok_or_else(|| UploadError::InvalidInput("No file selected".to_string()))?;
        self.persist(candidate, prefix).await
    }
}

/// Validate and store `candidate` under `root` with the default policy
pub async fn persist_to<R: Read + Seek>(
    candidate: &mut UploadCandidate<R>,
    root: impl Into<PathBuf>,
    prefix: Option<&str>,
) -> UploadResult<StoredFile> {
    let storage = LocalStorage::new(root)?;
    let validator = UploadValidator::with_default_sniffer(UploadPolicy::default());
    UploadPersister::new(Arc::new(validator), Arc::new(storage))
        .persist(candidate, prefix)
        .await
}

fn parse_stored_name(name: &str) -> UploadResult<FileName> {
    if name.trim().is_empty() {
        return Err(UploadError::InvalidInput("No filename provided".to_string()));
    }
    Ok(FileName::parse(name)?)
}

fn read_failure(err: std::io::Error) -> UploadError {
    UploadError::StorageFailure(format!("Upload error: {}", err))
}
