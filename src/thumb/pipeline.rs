//! Thumbnail pipeline: decode → resize → center-crop → encode.
//!
//! # Design Decisions
//!
//! - **Content-detected sources**: the source codec is guessed from the bytes,
//!   so a PNG saved with a `.gif` name still decodes.
//!
//! - **Cover scaling**: the source is scaled, preserving aspect ratio, until
//!   one axis (the governing one) matches the target exactly and the other
//!   overshoots it. The overshoot is then center-cropped away.
//!
//! - **No filling**: if the scaled image cannot cover the crop box, or covering
//!   it would need an absurd upscale (a 1px-wide strip, say), generation fails
//!   instead of producing a distorted thumbnail.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use crate::error::ServeError;

use super::format::ThumbFormat;

/// Default JPEG quality for thumbnails (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Resampling filter used when scaling sources.
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Largest edge the intermediate scaled raster may have.
pub const MAX_SCALED_EDGE: u64 = 16_384;

// =============================================================================
// Encoder
// =============================================================================

/// Stateless thumbnail generator parameterized by output geometry.
#[derive(Debug, Clone, Copy)]
pub struct ThumbEncoder {
    width: u32,
    height: u32,
    jpeg_quality: u8,
}

impl ThumbEncoder {
    /// Create an encoder producing `width` x `height` thumbnails.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Set the JPEG quality, clamped to 1-100.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = clamp_quality(quality);
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Run the full pipeline on raw source bytes.
    ///
    /// `name` only labels errors.
    pub fn generate(
        &self,
        source: &[u8],
        name: &str,
        format: ThumbFormat,
    ) -> Result<Bytes, ServeError> {
        let img = decode(source, name)?;
        let thumb = self.resize_and_crop(&img)?;
        self.encode(&thumb, format)
    }

    /// Scale to cover the target box, then center-crop to it.
    pub fn resize_and_crop(&self, img: &DynamicImage) -> Result<DynamicImage, ServeError> {
        if self.width == 0 || self.height == 0 {
            return Err(ServeError::processing(format!(
                "invalid thumbnail geometry {}x{}",
                self.width, self.height
            )));
        }
        if img.width() == 0 || img.height() == 0 {
            return Err(ServeError::processing("source image has no pixels"));
        }

        let (scaled_width, scaled_height) =
            cover_dimensions(img.width(), img.height(), self.width, self.height);
        if scaled_width > MAX_SCALED_EDGE || scaled_height > MAX_SCALED_EDGE {
            return Err(ServeError::processing(format!(
                "source {}x{} would need scaling to {}x{} to cover {}x{}",
                img.width(),
                img.height(),
                scaled_width,
                scaled_height,
                self.width,
                self.height
            )));
        }

        let scaled = img.resize_exact(scaled_width as u32, scaled_height as u32, RESIZE_FILTER);

        if scaled.width() < self.width || scaled.height() < self.height {
            return Err(ServeError::processing(format!(
                "resized image {}x{} is smaller than crop box {}x{}",
                scaled.width(),
                scaled.height(),
                self.width,
                self.height
            )));
        }

        let x = (scaled.width() - self.width) / 2;
        let y = (scaled.height() - self.height) / 2;
        Ok(scaled.crop_imm(x, y, self.width, self.height))
    }

    /// Encode a raster in the requested format.
    pub fn encode(&self, img: &DynamicImage, format: ThumbFormat) -> Result<Bytes, ServeError> {
        let mut output = Vec::new();
        let result = match format {
            ThumbFormat::Jpeg => {
                // JPEG carries no alpha channel
                let rgb = img.to_rgb8();
                JpegEncoder::new_with_quality(&mut output, self.jpeg_quality).encode_image(&rgb)
            }
            ThumbFormat::Png => img.write_to(&mut Cursor::new(&mut output), format.image_format()),
        };

        result.map_err(|e| ServeError::processing(format!("failed to encode {}: {}", format, e)))?;
        Ok(Bytes::from(output))
    }
}

/// Decode source bytes, detecting the codec from content.
pub fn decode(source: &[u8], name: &str) -> Result<DynamicImage, ServeError> {
    let reader = ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| ServeError::Decode {
            path: name.to_string(),
            message: e.to_string(),
        })?;

    reader.decode().map_err(|e| ServeError::Decode {
        path: name.to_string(),
        message: e.to_string(),
    })
}

/// Aspect-preserving size of a `width` x `height` source scaled so that it
/// just covers a `target_width` x `target_height` box.
///
/// The governing axis lands exactly on its target; the other is rounded to
/// the nearest pixel, which can never fall below its target.
fn cover_dimensions(width: u32, height: u32, target_width: u32, target_height: u32) -> (u64, u64) {
    let (w, h) = (width as u64, height as u64);
    let (tw, th) = (target_width as u64, target_height as u64);

    if w * th >= tw * h {
        // source is at least as wide as the box: height governs
        ((w * th + h / 2) / h, th)
    } else {
        // source is taller than the box: width governs
        (tw, (h * tw + w / 2) / w)
    }
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
