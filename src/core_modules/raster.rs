// THEORY:
// The `raster` module is the boundary between encoded images and the pixel arrays the
// rest of the engine understands. It has two unrelated jobs that happen to share the
// decoder:
//
// 1.  **RasterPreprocessor**: decode an encoded image and stretch it to a canonical
//     square (256x256, or 128x128 for the fast path) with a quality filter. Every
//     pairwise comparison operates on identically shaped buffers, so aspect ratio is
//     deliberately not preserved (no letterboxing). It can also hand back the native
//     resolution raster for the pixel feature analyzer.
// 2.  **FrameResizer**: produce a smaller, aspect-preserving JPEG for storage or
//     transmission. It never feeds the similarity metrics.
//
// Both are pure functions from bytes to bytes/buffers. Data URL helpers live here too
// because reference samples arrive in that encoding.

use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{InspectionError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder};
use log::debug;
use serde::{Deserialize, Serialize};

/// Side length of the canonical comparison raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalSize {
    /// 256x256, the general comparison resolution.
    #[default]
    Standard,
    /// 128x128, a lighter fast path.
    Fast,
}

impl CanonicalSize {
    pub fn side(self) -> u32 {
        match self {
            CanonicalSize::Standard => 256,
            CanonicalSize::Fast => 128,
        }
    }
}

/// Decodes images into canonical-size or native-size `PixelBuffer`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterPreprocessor {
    size: CanonicalSize,
}

impl RasterPreprocessor {
    pub fn new(size: CanonicalSize) -> Self {
        Self { size }
    }

    pub fn canonical_size(&self) -> CanonicalSize {
        self.size
    }

    /// Decodes `bytes` and resamples to the canonical square.
    pub fn canonical(&self, bytes: &[u8]) -> Result<PixelBuffer> {
        self.resample(&self.decode_native(bytes)?)
    }

    /// Resamples an already decoded buffer to the canonical square.
    pub fn resample(&self, buffer: &PixelBuffer) -> Result<PixelBuffer> {
        let side = self.size.side();
        let rgba = image::RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.as_bytes().to_vec())
            .ok_or(InspectionError::InvalidDimensions {
                width: buffer.width(),
                height: buffer.height(),
            })?;
        let resized = DynamicImage::ImageRgba8(rgba).resize_exact(side, side, FilterType::CatmullRom);
        to_pixel_buffer(resized)
    }

    /// Decodes `bytes` at their native resolution.
    pub fn decode_native(&self, bytes: &[u8]) -> Result<PixelBuffer> {
        to_pixel_buffer(decode(bytes)?)
    }

    /// Encodes a buffer as PNG. Used to persist captured frames losslessly.
    pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut out);
        encoder
            .write_image(
                buffer.as_bytes(),
                buffer.width(),
                buffer.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(InspectionError::from_encode)?;
        Ok(out)
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(InspectionError::from_decode)
}

fn to_pixel_buffer(image: DynamicImage) -> Result<PixelBuffer> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(InspectionError::UnsupportedFormat(format!(
            "image has no pixel data ({width}x{height})"
        )));
    }
    let rgba = image.to_rgba8();
    PixelBuffer::from_rgba(width, height, rgba.into_raw())
        .map_err(|err| InspectionError::UnsupportedFormat(err.to_string()))
}

/// Result of a storage resize.
#[derive(Debug, Clone)]
pub struct ResizedFrame {
    pub jpeg: Vec<u8>,
    pub original_size: (u32, u32),
    pub resized_size: (u32, u32),
}

/// Shrinks frames for storage. Lighter than the preprocessor: bounded, aspect
/// preserving, lossy.
#[derive(Debug, Clone, Copy)]
pub struct FrameResizer {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
}

impl Default for FrameResizer {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 800,
            quality: 80,
        }
    }
}

impl FrameResizer {
    /// Target dimensions for an image of `width` x `height`. Images already inside
    /// the bounds keep their size.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width && height <= self.max_height {
            return (width, height);
        }
        let aspect = width as f64 / height as f64;
        let (w, h) = if width > height {
            (self.max_width as f64, self.max_width as f64 / aspect)
        } else {
            (self.max_height as f64 * aspect, self.max_height as f64)
        };
        ((w.round() as u32).max(1), (h.round() as u32).max(1))
    }

    pub fn resize_for_storage(&self, bytes: &[u8]) -> Result<ResizedFrame> {
        let image = decode(bytes)?;
        let original_size = (image.width(), image.height());
        let (width, height) = self.target_size(original_size.0, original_size.1);
        let resized = if (width, height) == original_size {
            image
        } else {
            image.resize_exact(width, height, FilterType::CatmullRom)
        };

        let rgb = resized.to_rgb8();
        let mut jpeg = Vec::new();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, self.quality.clamp(1, 100));
        encoder
            .write_image(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .map_err(InspectionError::from_encode)?;

        debug!(
            "frame resized: {}x{} -> {}x{}, {:.2}KB -> {:.2}KB",
            original_size.0,
            original_size.1,
            width,
            height,
            bytes.len() as f64 / 1024.0,
            jpeg.len() as f64 / 1024.0
        );

        Ok(ResizedFrame {
            jpeg,
            original_size,
            resized_size: (width, height),
        })
    }
}

/// Extracts the payload of a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| InspectionError::InvalidDataUrl("missing ',' separator".into()))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(InspectionError::InvalidDataUrl(format!(
            "unsupported header '{header}'"
        )));
    }
    BASE64
        .decode(payload.trim())
        .map_err(|err| InspectionError::InvalidDataUrl(err.to_string()))
}

/// Builds a base64 data URL for `bytes`.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Best-effort MIME type from the magic bytes, defaulting to JPEG.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "image/jpeg",
    }
}
