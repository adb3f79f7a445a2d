//! Image processor - structural validation of uploaded images

use horizon_core::{UploadError, UploadResult};
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// What inspection learned about a well-formed image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

pub struct ImageProcessor;

impl ImageProcessor {
    /// Validate that `data` is an image of the format its extension claims,
    /// no larger than `max_dimension` on either side, and fully decodable.
    ///
    /// Dimensions are read from the header before the full decode so oversized
    /// images are refused without allocating their pixel buffers.
    pub fn inspect(data: &[u8], extension: &str, max_dimension: u32) -> UploadResult<ImageInfo> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(corrupted)?;
        let format = reader
            .format()
            .ok_or_else(|| corrupted("unrecognized image format"))?;
        let (width, height) = reader.into_dimensions().map_err(corrupted)?;

        if width > max_dimension || height > max_dimension {
            return Err(UploadError::PolicyViolation(format!(
                "Image dimensions too large. Maximum: {}x{} pixels",
                max_dimension, max_dimension
            )));
        }

        let expected = ImageFormat::from_extension(extension);
        if expected != Some(format) {
            return Err(UploadError::PolicyViolation(format!(
                "Image format mismatch. Expected: {}, Got: {}",
                expected_label(extension),
                format_label(format)
            )));
        }

        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(corrupted)?
            .decode()
            .map_err(corrupted)?;

        Ok(ImageInfo {
            format,
            width,
            height,
        })
    }

    /// Dimensions from the header, if `data` is a recognizable image
    pub fn get_dimensions(data: &[u8]) -> Option<(u32, u32)> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }
}

fn corrupted(err: impl std::fmt::Display) -> UploadError {
    UploadError::PolicyViolation(format!("Invalid or corrupted image file: {}", err))
}

fn expected_label(extension: &str) -> String {
    let upper = extension.to_ascii_uppercase();
    if upper == "JPG" {
        "JPEG".to_string()
    } else {
        upper
    }
}

pub(crate) fn format_label(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        other => format!("{:?}", other).to_ascii_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        match format {
            ImageFormat::Jpeg => RgbImage::from_pixel(width, height, Rgb([10, 120, 200]))
                .write_to(&mut cursor, format)
                .unwrap(),
            _ => RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]))
                .write_to(&mut cursor, format)
                .unwrap(),
        }
        buffer
    }

    #[test]
    fn test_inspect_valid_png() {
        let data = encode(100, 50, ImageFormat::Png);
        let info = ImageProcessor::inspect(&data, "png", 4000).unwrap();
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!((info.width, info.height), (100, 50));
    }

    #[test]
    fn test_inspect_jpg_and_jpeg_equivalent() {
        let data = encode(32, 32, ImageFormat::Jpeg);
        assert!(ImageProcessor::inspect(&data, "jpg", 4000).is_ok());
        assert!(ImageProcessor::inspect(&data, "JPEG", 4000).is_ok());
    }

    #[test]
    fn test_inspect_format_mismatch() {
        let data = encode(16, 16, ImageFormat::Png);
        let err = ImageProcessor::inspect(&data, "jpg", 4000).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Image format mismatch. Expected: JPEG, Got: PNG"
        );
    }

    #[test]
    fn test_inspect_dimensions_too_large() {
        let data = encode(120, 40, ImageFormat::Png);
        let err = ImageProcessor::inspect(&data, "png", 100).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Image dimensions too large. Maximum: 100x100 pixels"
        );
    }

    #[test]
    fn test_inspect_garbage_is_rejection() {
        let err = ImageProcessor::inspect(b"not an image", "png", 4000).unwrap_err();
        assert!(matches!(err, UploadError::PolicyViolation(_)));
        assert!(err.to_string().starts_with("Invalid or corrupted image file"));
    }

    #[test]
    fn test_inspect_truncated_png() {
        let mut data = encode(64, 64, ImageFormat::Png);
        data.truncate(data.len() / 2);
        let err = ImageProcessor::inspect(&data, "png", 4000).unwrap_err();
        assert!(err.to_string().starts_with("Invalid or corrupted image file"));
    }

    #[test]
    fn test_get_dimensions() {
        let data = encode(7, 9, ImageFormat::Gif);
        assert_eq!(ImageProcessor::get_dimensions(&data), Some((7, 9)));
        assert_eq!(ImageProcessor::get_dimensions(b"nope"), None);
    }
}
