use anyhow::{anyhow, Result};
use bytes::Bytes;
use horizon_core::{CompressionReport, CompressionSettings};
use image::codecs::gif::GifEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageEncoder, ImageFormat, ImageReader};
use std::io::Cursor;

use super::processor::format_label;

/// NeuQuant sampling factor for GIF re-encoding (1 is slowest, 30 fastest)
const GIF_QUANTIZE_SPEED: i32 = 10;

/// Re-encoded image bytes plus what was done to produce them
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Bytes,
    pub report: CompressionReport,
}

/// Main compression service
pub struct ImageCompressor;

impl ImageCompressor {
    /// Recompress an uploaded image in its own format.
    ///
    /// Returns `Ok(None)` for images that are left as uploaded. A GIF within
    /// `max_dimension` keeps its animation frames; an oversized one is
    /// downscaled to its first frame. Lossy formats walk the quality schedule from
    /// [`CompressionSettings::quality_schedule`] until an attempt fits the target;
    /// missing the target is reported, not an error.
    pub fn recompress(data: &[u8], settings: &CompressionSettings) -> Result<Option<CompressedImage>> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| anyhow!("unrecognized image format"))?;

        let skip = match format {
            ImageFormat::Jpeg | ImageFormat::Png => false,
            ImageFormat::Gif => {
                let (width, height) = ImageReader::new(Cursor::new(data))
                    .with_guessed_format()?
                    .into_dimensions()?;
                width <= settings.max_dimension && height <= settings.max_dimension
            }
            _ => true,
        };
        if skip {
            tracing::debug!(format = %format_label(format), "Skipping recompression");
            return Ok(None);
        }

        let img = reader.decode()?;
        let (img, resized) = Self::prepare(img, settings.max_dimension);
        let (width, height) = img.dimensions();

        let compressed = match format {
            ImageFormat::Jpeg => Self::compress_jpeg_bounded(&img, settings)?,
            ImageFormat::Gif => {
                let data = Self::compress_gif(&img)?;
                let within_target = data.len() as u64 <= settings.target_bytes;
                (data, None, within_target)
            }
            _ => {
                let data = Self::compress_png(&img)?;
                let within_target = data.len() as u64 <= settings.target_bytes;
                (data, None, within_target)
            }
        };
        let (data, quality, within_target) = compressed;

        tracing::debug!(
            format = %format_label(format),
            quality = ?quality,
            size_bytes = data.len(),
            width = width,
            height = height,
            resized = resized,
            within_target = within_target,
            "Image recompressed"
        );

        Ok(Some(CompressedImage {
            report: CompressionReport {
                quality,
                byte_size: data.len() as u64,
                width,
                height,
                resized,
                within_target,
            },
            data,
        }))
    }

    /// Convert to RGB and downscale so neither side exceeds `max_dimension`,
    /// keeping the aspect ratio.
    fn prepare(img: DynamicImage, max_dimension: u32) -> (DynamicImage, bool) {
        let img = match img {
            DynamicImage::ImageRgb8(_) => img,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };

        let (width, height) = img.dimensions();
        if width > max_dimension || height > max_dimension {
            (img.resize(max_dimension, max_dimension, FilterType::Lanczos3), true)
        } else {
            (img, false)
        }
    }

    /// Iterative quality back-off. The schedule is finite, so the loop is bounded
    /// by its length; the smallest attempt is kept if none meets the target.
    fn compress_jpeg_bounded(
        img: &DynamicImage,
        settings: &CompressionSettings,
    ) -> Result<(Bytes, Option<u8>, bool)> {
        let mut best: Option<(Bytes, u8)> = None;

        for quality in settings.quality_schedule() {
            let data = Self::compress_jpeg(img, quality)?;
            let size = data.len() as u64;

            if size <= settings.target_bytes {
                return Ok((data, Some(quality), true));
            }

            tracing::debug!(
                quality = quality,
                size_bytes = size,
                target_bytes = settings.target_bytes,
                "Compressed image above target, lowering quality"
            );

            if best.as_ref().map_or(true, |(b, _)| data.len() < b.len()) {
                best = Some((data, quality));
            }
        }

        let (data, quality) = best.ok_or_else(|| anyhow!("empty quality schedule"))?;
        Ok((data, Some(quality), false))
    }

    /// Compress to JPEG using mozjpeg
    fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(&rgb_img)?;
        let jpeg_data = comp.finish()?;

        Ok(Bytes::from(jpeg_data))
    }

    /// Compress to PNG (lossless, best compression)
    fn compress_png(img: &DynamicImage) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let mut buffer = Vec::new();

        PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive)
            .write_image(
                rgb_img.as_raw(),
                rgb_img.width(),
                rgb_img.height(),
                image::ExtendedColorType::Rgb8,
            )?;

        Ok(Bytes::from(buffer))
    }

    /// Compress to a single-frame GIF
    fn compress_gif(img: &DynamicImage) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let mut buffer = Vec::new();

        GifEncoder::new_with_speed(&mut buffer, GIF_QUANTIZE_SPEED).encode(
            rgb_img.as_raw(),
            rgb_img.width(),
            rgb_img.height(),
            image::ExtendedColorType::Rgb8,
        )?;

        Ok(Bytes::from(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    /// Deterministic high-entropy pixels so JPEG output stays large
    fn noisy_image(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_small_jpeg_meets_target_first_try() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([40, 80, 120])));
        let data = encode(img, ImageFormat::Jpeg);

        let result = ImageCompressor::recompress(&data, &CompressionSettings::default())
            .unwrap()
            .unwrap();
        assert_eq!(result.report.quality, Some(85));
        assert!(result.report.within_target);
        assert!(!result.report.resized);
        assert_eq!((result.report.width, result.report.height), (200, 100));
    }

    #[test]
    fn test_large_image_downscaled_preserving_aspect() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3000, 1500, Rgb([200, 10, 10])));
        let data = encode(img, ImageFormat::Jpeg);

        let result = ImageCompressor::recompress(&data, &CompressionSettings::default())
            .unwrap()
            .unwrap();
        assert!(result.report.resized);
        assert_eq!((result.report.width, result.report.height), (1920, 960));

        let (w, h) = crate::image::ImageProcessor::get_dimensions(&result.data).unwrap();
        assert_eq!((w, h), (1920, 960));
    }

    #[test]
    fn test_unreachable_target_stops_at_floor() {
        let data = encode(noisy_image(256, 256), ImageFormat::Jpeg);
        let settings = CompressionSettings {
            target_bytes: 1,
            ..CompressionSettings::default()
        };

        let result = ImageCompressor::recompress(&data, &settings).unwrap().unwrap();
        assert!(!result.report.within_target);
        // All four attempts ran; the smallest (normally the lowest quality) is kept
        let quality = result.report.quality.unwrap();
        assert!([85, 75, 65, 55].contains(&quality));
        assert_eq!(result.report.byte_size, result.data.len() as u64);
    }

    #[test]
    fn test_png_recompressed_to_rgb() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 32, Rgba([0, 255, 0, 128])));
        let data = encode(img, ImageFormat::Png);

        let result = ImageCompressor::recompress(&data, &CompressionSettings::default())
            .unwrap()
            .unwrap();
        assert_eq!(result.report.quality, None);

        let decoded = image::load_from_memory(&result.data).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_)));
        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn test_gif_left_untouched() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])));
        let data = encode(img, ImageFormat::Gif);

        let result = ImageCompressor::recompress(&data, &CompressionSettings::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_oversized_gif_downscaled() {
        let img = RgbaImage::from_pixel(3000, 200, Rgba([200, 40, 40, 255]));
        let mut data = Vec::new();
        GifEncoder::new_with_speed(&mut data, 30)
            .encode(img.as_raw(), 3000, 200, image::ExtendedColorType::Rgba8)
            .unwrap();

        let result = ImageCompressor::recompress(&data, &CompressionSettings::default())
            .unwrap()
            .unwrap();
        assert!(result.report.resized);
        assert_eq!(result.report.quality, None);
        assert_eq!((result.report.width, result.report.height), (1920, 128));

        let decoded = image::load_from_memory_with_format(&result.data, ImageFormat::Gif).unwrap();
        assert_eq!(decoded.dimensions(), (1920, 128));
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(ImageCompressor::recompress(b"junk", &CompressionSettings::default()).is_err());
    }
}
