use horizon_core::{ErrorMetadata, LogLevel, UploadError};
use serde::Serialize;

pub mod doctor;

/// JSON body printed when a command fails with an [`UploadError`]
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
}

impl From<&UploadError> for ErrorBody {
    fn from(err: &UploadError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            code: err.error_code(),
            status: err.http_status_code(),
            suggested_action: err.suggested_action(),
        }
    }
}

/// Log a failed command at the level the error asks for
pub fn log_upload_error(err: &UploadError) {
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(code = err.error_code(), error = %err, "Upload rejected"),
        LogLevel::Warn => tracing::warn!(code = err.error_code(), error = %err, "Upload request failed"),
        LogLevel::Error => tracing::error!(code = err.error_code(), error = %err, "Upload request failed"),
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Filename to validate a local file under: the override if given, otherwise
/// the last component of the path.
pub fn candidate_name(path: &std::path::Path, name_override: Option<&str>) -> String {
    match name_override {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
