//! Image processing module
//!
//! - Structural inspection used by validation (processor)
//! - Best-effort recompression used after persistence (compression)

pub mod compression;
pub mod processor;

pub use compression::{CompressedImage, ImageCompressor};
pub use processor::{ImageInfo, ImageProcessor};
