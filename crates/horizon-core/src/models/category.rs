use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Coarse file kind derived from a filename's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Audio,
    Document,
    Unknown,
}

impl FileCategory {
    /// Classify a bare extension (no leading dot), case-insensitively.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "gif" => FileCategory::Image,
            "wav" | "mp3" | "ogg" => FileCategory::Audio,
            "pdf" | "doc" | "docx" => FileCategory::Document,
            _ => FileCategory::Unknown,
        }
    }

    /// Classify a filename by the suffix after its last `.`.
    ///
    /// Names without a `.` are `Unknown`.
    pub fn from_filename(filename: &str) -> Self {
        match extension_of(filename) {
            Some(ext) => Self::from_extension(ext),
            None => FileCategory::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Audio => "audio",
            FileCategory::Document => "document",
            FileCategory::Unknown => "unknown",
        }
    }
}

impl Display for FileCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Suffix after the last `.` of `filename`, if the name contains one.
pub fn extension_of(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}
