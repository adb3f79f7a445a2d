//! Data models for the upload pipeline

mod category;
mod upload;

pub use category::{extension_of, FileCategory};
pub use upload::{CompressionReport, DeleteOutcome, StoredFile, ValidatedUpload, ValidationOutcome};
