//! Error types module
//!
//! Every failure of the upload pipeline is an [`UploadError`]. The variant is the
//! category of failure; the payload is the human-readable reason, and `Display`
//! renders the reason verbatim so callers can surface it to end users unchanged.
//! Library errors (image decoding, filesystem calls) are translated into one of
//! these variants at the boundary of each public operation.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a missing file
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// by whatever HTTP layer hosts the pipeline
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "POLICY_VIOLATION")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried with different input)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// No file, or an empty filename
    #[error("{0}")]
    InvalidInput(String),

    /// Disallowed extension or content type, size over limit, unsafe filename,
    /// image dimension or format mismatch
    #[error("{0}")]
    PolicyViolation(String),

    /// Write error, corruption detected after save, path escape
    #[error("{0}")]
    StorageFailure(String),

    #[error("{0}")]
    NotFound(String),
}

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    /// The human-readable reason carried by the error
    pub fn reason(&self) -> &str {
        match self {
            UploadError::InvalidInput(r)
            | UploadError::PolicyViolation(r)
            | UploadError::StorageFailure(r)
            | UploadError::NotFound(r) => r,
        }
    }
}

impl ErrorMetadata for UploadError {
    fn http_status_code(&self) -> u16 {
        match self {
            UploadError::InvalidInput(_) => 400,
            UploadError::PolicyViolation(_) => 422,
            UploadError::StorageFailure(_) => 500,
            UploadError::NotFound(_) => 404,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            UploadError::InvalidInput(_) => "INVALID_INPUT",
            UploadError::PolicyViolation(_) => "POLICY_VIOLATION",
            UploadError::StorageFailure(_) => "STORAGE_FAILURE",
            UploadError::NotFound(_) => "NOT_FOUND",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }

    fn suggested_action(&self) -> Option<&'static str> {
        match self {
            UploadError::InvalidInput(_) => Some("Select a file and try again"),
            UploadError::PolicyViolation(_) => Some("Choose a different file"),
            UploadError::StorageFailure(_) => Some("Retry the upload"),
            UploadError::NotFound(_) => None,
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            UploadError::InvalidInput(_) | UploadError::PolicyViolation(_) => LogLevel::Debug,
            UploadError::NotFound(_) => LogLevel::Warn,
            UploadError::StorageFailure(_) => LogLevel::Error,
        }
    }
}
