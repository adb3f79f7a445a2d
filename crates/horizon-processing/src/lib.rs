//! Horizon Processing Library
//!
//! This crate validates untrusted uploads and persists the accepted ones.
//!
//! - [`UploadCandidate`]: filename plus a seekable byte stream
//! - [`UploadValidator`]: ordered policy checks producing a [`ValidationOutcome`](horizon_core::ValidationOutcome)
//! - [`ContentSniffer`]: injectable magic-byte detection
//! - [`ImageCompressor`]: bounded quality back-off for stored images
//! - [`UploadPersister`]: write, verify, rollback and recompress against a [`Storage`](horizon_storage::Storage)

pub mod candidate;
pub mod image;
pub mod sniff;
pub mod upload;
pub mod validator;

// Re-export commonly used types
pub use candidate::UploadCandidate;
pub use self::image::{CompressedImage, ImageCompressor, ImageInfo, ImageProcessor};
#[cfg(feature = "sniff")]
pub use sniff::InferSniffer;
pub use sniff::{default_sniffer, ContentSniffer, NoopSniffer, SniffUnavailable};
pub use upload::{persist_to, PersistOptions, UploadPersister};
pub use validator::UploadValidator;
