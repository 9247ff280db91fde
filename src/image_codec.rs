// Image capability shared by both process roles.
// The front end only needs grayscale conversion, the resize host only resizing,
// but both go through the same trait so tests can swap in stub codecs.

use image::{DynamicImage, ImageFormat, imageops::FilterType};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("PNG encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Invalid scale factor: {0}")]
    InvalidScaleFactor(f32),

    #[error("Scaling a {width}x{height} image by {scale_factor} leaves no pixels")]
    EmptyResult {
        width: u32,
        height: u32,
        scale_factor: f32,
    },
}

/// Opaque image operations consumed by the server.
///
/// Callers only ever thread encoded byte buffers through this trait; pixel data
/// never leaves the implementation.
pub trait ImageCodec: Send + Sync + 'static {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError>;

    /// Decodes `data` (any supported format) and re-encodes it as an 8-bit
    /// single channel PNG.
    fn to_grayscale_png(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Scales both dimensions by `scale_factor`, truncating toward zero, and
    /// encodes the result as PNG.
    fn resize(&self, data: &[u8], scale_factor: f32) -> Result<Vec<u8>, CodecError>;
}

pub type SharedImageCodec = Arc<dyn ImageCodec>;

/// `ImageCodec` backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl RasterCodec {
    pub fn shared() -> SharedImageCodec {
        Arc::new(Self)
    }
}

impl ImageCodec for RasterCodec {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError> {
        image::load_from_memory(data).map_err(CodecError::Decode)
    }

    fn to_grayscale_png(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let source = self.decode(data)?;
        debug!(
            "Converting {}x{} {:?} image to grayscale",
            source.width(),
            source.height(),
            source.color()
        );

        // Luma8 drops any alpha channel, matching a plain "L" conversion.
        let gray = DynamicImage::ImageLuma8(source.to_luma8());
        encode_png(&gray)
    }

    fn resize(&self, data: &[u8], scale_factor: f32) -> Result<Vec<u8>, CodecError> {
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(CodecError::InvalidScaleFactor(scale_factor));
        }

        let source = self.decode(data)?;
        let (width, height) = (source.width(), source.height());
        let (new_width, new_height) = scaled_dimensions(width, height, scale_factor);

        if new_width == 0 || new_height == 0 {
            return Err(CodecError::EmptyResult {
                width,
                height,
                scale_factor,
            });
        }

        debug!(
            "Resizing {}x{} to {}x{} (factor {})",
            width, height, new_width, new_height, scale_factor
        );

        let resized = if (new_width, new_height) == (width, height) {
            source
        } else {
            source.resize_exact(new_width, new_height, FilterType::CatmullRom)
        };
        encode_png(&resized)
    }
}

fn scaled_dimensions(width: u32, height: u32, scale_factor: f32) -> (u32, u32) {
    let factor = f64::from(scale_factor);
    // `as` saturates, so absurd factors clamp to u32::MAX instead of wrapping.
    (
        (f64::from(width) * factor) as u32,
        (f64::from(height) * factor) as u32,
    )
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(CodecError::Encode)?;
    Ok(buffer.into_inner())
}
