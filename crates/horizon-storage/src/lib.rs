//! Horizon Storage Library
//!
//! This crate provides the storage abstraction for persisted uploads and its
//! local filesystem implementation.
//!
//! # Key format
//!
//! Uploads live flat in a single upload root. A key is a [`FileName`]: exactly one
//! normal path component, so a key can never name a subdirectory, a parent
//! directory or an absolute path. Backends additionally re-check every resolved
//! path against the absolute upload root before touching the filesystem.

pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use keys::FileName;
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
