//! Horizon Core Library
//!
//! This crate provides the domain models, error taxonomy and upload policy
//! configuration shared by the storage, processing and CLI crates.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{AppConfig, CompressionSettings, UploadPolicy, UploadProfile};
pub use error::{ErrorMetadata, LogLevel, UploadError, UploadResult};
pub use models::{
    CompressionReport, DeleteOutcome, FileCategory, StoredFile, ValidatedUpload,
    ValidationOutcome,
};
