//! Synthetic frames shared by the unit tests.

use crate::core_modules::pixel::pixel::Pixel;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::raster::RasterPreprocessor;

pub fn solid(side: u32, level: u8) -> PixelBuffer {
    PixelBuffer::filled(side, side, Pixel::gray(level)).unwrap()
}

/// White square with a 20x20 black patch at (50, 50).
pub fn dark_spot_frame(side: u32) -> PixelBuffer {
    solid(side, 255).with_rect(50, 50, 20, 20, Pixel::gray(0))
}

pub fn png(buffer: &PixelBuffer) -> Vec<u8> {
    RasterPreprocessor::encode_png(buffer).unwrap()
}
