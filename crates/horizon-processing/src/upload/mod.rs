//! Upload persistence
//!
//! - Storage name generation (naming)
//! - Validate, write, verify and recompress (pipeline)

pub mod naming;
pub mod pipeline;

pub use naming::{generate_name, sanitize_component, secure_filename};
pub use pipeline::{persist_to, PersistOptions, UploadPersister};
