use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FileCategory;
use crate::error::UploadError;

/// Result of validating an upload candidate.
///
/// `reason` is always populated, on success as well as on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub reason: String,
}

impl ValidationOutcome {
    pub const SUCCESS_REASON: &'static str = "File validation successful";

    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: Self::SUCCESS_REASON.to_string(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

impl<T> From<&Result<T, UploadError>> for ValidationOutcome {
    fn from(result: &Result<T, UploadError>) -> Self {
        match result {
            Ok(_) => ValidationOutcome::accepted(),
            Err(e) => ValidationOutcome::rejected(e.to_string()),
        }
    }
}

/// What the validator established about an accepted candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub category: FileCategory,
    /// Lowercased extension taken from the original filename
    pub extension: String,
    /// MIME type detected from content; `None` when sniffing was unavailable
    pub sniffed_mime: Option<String>,
    pub size: u64,
}

/// Outcome of the best-effort image recompression step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionReport {
    /// Encoder quality of the attempt that was kept; `None` for lossless formats
    pub quality: Option<u8>,
    pub byte_size: u64,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
    /// False when the quality floor was reached without meeting the size target
    pub within_target: bool,
}

/// Descriptor of an upload that was durably written and verified
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub generated_name: String,
    pub absolute_path: String,
    pub byte_size: u64,
    pub category: FileCategory,
    pub original_size: u64,
    pub stored_at: DateTime<Utc>,
    pub compression: Option<CompressionReport>,
}

/// Result of a delete request. A missing file is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn message(self) -> &'static str {
        match self {
            DeleteOutcome::Deleted => "File deleted successfully",
            DeleteOutcome::NotFound => "File not found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        let ok: Result<(), UploadError> = Ok(());
        let outcome = ValidationOutcome::from(&ok);
        assert!(outcome.accepted);
        assert_eq!(outcome.reason, "File validation successful");

        let err: Result<(), UploadError> =
            Err(UploadError::PolicyViolation("Invalid characters in filename".into()));
        let outcome = ValidationOutcome::from(&err);
        assert!(!outcome.accepted);
        assert_eq!(outcome.reason, "Invalid characters in filename");
    }

    #[test]
    fn test_delete_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&DeleteOutcome::NotFound).unwrap(),
            "\"not_found\""
        );
        assert_eq!(DeleteOutcome::Deleted.message(), "File deleted successfully");
    }
}
