//! Raster image re-encoding with the `image` crate.

use async_trait::async_trait;
use image::{ColorType, DynamicImage, ImageError, ImageFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::blocking::run_blocking;
use super::error::ConverterError;
use super::traits::ConversionStrategy;
use super::types::{ConversionJob, FailureKind};

/// Largest edge the ICO container can hold.
const ICO_MAX_EDGE: u32 = 256;

/// Decodes the source and re-encodes it in the target's format.
///
/// Runs entirely in-process, so cancellation is only observed before the
/// decode starts.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageStrategy;

impl ImageStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous conversion used by [`ConversionStrategy::execute`].
    pub fn convert(source: &Path, target: &Path, target_ext: &str) -> Result<(), ConverterError> {
        let format = ImageFormat::from_extension(target_ext)
            .filter(|format| format.writing_enabled())
            .ok_or_else(|| ConverterError::unsupported("image", target_ext))?;

        let bytes = std::fs::read(source)?;
        let detected = image::guess_format(&bytes).map_err(|_| {
            ConverterError::library(
                FailureKind::CorruptInput,
                format!("Invalid data found: {} is not a recognised image", source.display()),
            )
        })?;
        let decoded =
            image::load_from_memory_with_format(&bytes, detected).map_err(decode_error)?;
        debug!(
            source_format = ?detected,
            width = decoded.width(),
            height = decoded.height(),
            color = ?decoded.color(),
            "Decoded image"
        );

        prepare_for(format, decoded)
            .save_with_format(target, format)
            .map_err(encode_error)
    }
}

/// Adapts pixel layout and size to what the target encoder accepts.
fn prepare_for(format: ImageFormat, image: DynamicImage) -> DynamicImage {
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImageFormat::Ico if image.width() > ICO_MAX_EDGE || image.height() > ICO_MAX_EDGE => {
            DynamicImage::ImageRgba8(image.thumbnail(ICO_MAX_EDGE, ICO_MAX_EDGE).to_rgba8())
        }
        ImageFormat::Tiff => match image.color() {
            ColorType::La8 => DynamicImage::ImageRgba8(image.to_rgba8()),
            ColorType::La16 => DynamicImage::ImageRgba16(image.to_rgba16()),
            _ => image,
        },
        ImageFormat::Png => image,
        _ => DynamicImage::ImageRgba8(image.to_rgba8()),
    }
}

// Decoding works from memory, so an I/O error here means the data ran out.
fn decode_error(err: ImageError) -> ConverterError {
    match err {
        err @ (ImageError::IoError(_) | ImageError::Decoding(_)) => ConverterError::library(
            FailureKind::DecodeError,
            format!("Error while decoding: {err}"),
        ),
        ImageError::Unsupported(e) => {
            ConverterError::library(FailureKind::CorruptInput, format!("Invalid data found: {e}"))
        }
        other => ConverterError::library(FailureKind::ProcessFailure, other.to_string()),
    }
}

fn encode_error(err: ImageError) -> ConverterError {
    match err {
        ImageError::IoError(e) => ConverterError::Io(e),
        other => ConverterError::library(FailureKind::ProcessFailure, other.to_string()),
    }
}

#[async_trait]
impl ConversionStrategy for ImageStrategy {
    fn name(&self) -> &str {
        "image"
    }

    async fn execute(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        if job.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        let source: PathBuf = job.source().to_path_buf();
        let target: PathBuf = job.target().to_path_buf();
        let target_ext = job.target_ext.clone();
        run_blocking("image", move || Self::convert(&source, &target, &target_ext)).await?;

        job.progress.complete();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let mut img = RgbaImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgba([(x % 256) as u8, (y % 256) as u8, 128, 200]);
        }
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_png_to_bmp() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in.png");
        let target = temp.path().join("out.bmp");
        write_png(&source, 8, 4);

        ImageStrategy::convert(&source, &target, "bmp").unwrap();

        let decoded = image::open(&target).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
    }

    #[test]
    fn test_alpha_is_dropped_for_jpeg() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in.png");
        let target = temp.path().join("out.jpg");
        write_png(&source, 16, 16);

        ImageStrategy::convert(&source, &target, "jpg").unwrap();

        let decoded = image::open(&target).unwrap();
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_gray_alpha_png_to_tiff() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in.png");
        let target = temp.path().join("out.tiff");
        let gray = GrayAlphaImage::from_fn(4, 4, |x, y| LumaA([(x * 60) as u8, (y * 60) as u8]));
        gray.save_with_format(&source, ImageFormat::Png).unwrap();

        ImageStrategy::convert(&source, &target, "tiff").unwrap();

        let decoded = image::open(&target).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_large_images_shrink_for_ico() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in.png");
        let target = temp.path().join("out.ico");
        write_png(&source, 512, 300);

        ImageStrategy::convert(&source, &target, "ico").unwrap();

        let decoded = image::open(&target).unwrap();
        assert!(decoded.width() <= ICO_MAX_EDGE);
        assert!(decoded.height() <= ICO_MAX_EDGE);
    }

    #[test]
    fn test_garbage_input_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in.png");
        std::fs::write(&source, b"definitely not an image").unwrap();

        let err = ImageStrategy::convert(&source, &temp.path().join("out.bmp"), "bmp").unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::CorruptInput));
    }

    #[test]
    fn test_truncated_image_is_decode_error() {
        let temp = TempDir::new().unwrap();
        let full = temp.path().join("full.png");
        write_png(&full, 64, 64);
        let bytes = std::fs::read(&full).unwrap();
        let source = temp.path().join("cut.png");
        std::fs::write(&source, &bytes[..bytes.len() / 2]).unwrap();

        let err = ImageStrategy::convert(&source, &temp.path().join("out.bmp"), "bmp").unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::DecodeError));
    }

    #[test]
    fn test_missing_source_is_io_failure() {
        let temp = TempDir::new().unwrap();
        let err = ImageStrategy::convert(
            &temp.path().join("nope.png"),
            &temp.path().join("out.bmp"),
            "bmp",
        )
        .unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::IoFailure));
    }
}
