// THEORY:
// `PixelBuffer` is the raster every stage of the engine operates on: a width, a
// height and a flat row-major run of RGBA bytes. It is built once (by decoding or
// by a test fixture), never mutated afterwards, and owned by the computation that
// created it. Concurrent comparisons share buffers through `Arc`, never through
// mutable aliasing.
//
// The constructor is the only place the `len == width * height * 4` invariant is
// checked; every accessor after that may rely on it.

use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::error::{InspectionError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA bytes, validating the length invariant.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(InspectionError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(InspectionError::InvalidBuffer {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// A buffer filled with a single pixel value.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Result<Self> {
        let bytes: [u8; CHANNELS] = pixel.into();
        let data = bytes
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::from_rgba(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// The pixel at (x, y). Callers stay inside `0..width` x `0..height`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        let i = self.offset(x, y);
        Pixel::new(self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3])
    }

    #[inline]
    pub fn luminance(&self, x: u32, y: u32) -> f64 {
        self.pixel(x, y).luminance()
    }

    /// Iterates pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.data.chunks_exact(CHANNELS).map(Pixel::from)
    }

    /// Rec. 601 luminance for every pixel, row-major.
    pub fn luminance_map(&self) -> Vec<f64> {
        self.pixels().map(|p| p.luminance()).collect()
    }

    pub fn same_shape(&self, other: &PixelBuffer) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Copies of this buffer with a rectangle overwritten, used to build fixtures.
    pub fn with_rect(&self, x: u32, y: u32, w: u32, h: u32, pixel: Pixel) -> Self {
        let mut data = self.data.clone();
        let bytes: [u8; CHANNELS] = pixel.into();
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                let i = self.offset(px, py);
                data[i..i + CHANNELS].copy_from_slice(&bytes);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }
}
