//! Color-distribution agreement from a sparse HSV value/saturation pass.

use super::{common_extent, unit};
use crate::core_modules::pixel_buffer::PixelBuffer;

/// Every `COLOR_STRIDE`-th pixel (row-major over the common extent) is compared.
pub const COLOR_STRIDE: usize = 4;

/// `1 - min(1, Σ(|Δvalue| + |Δsaturation|) / (2 · samples))`.
pub fn color_distribution_similarity(a: &PixelBuffer, b: &PixelBuffer) -> f64 {
    let mut total_difference = 0.0;
    let mut samples = 0usize;

    let (width, height) = common_extent(a, b);
    let pixel_count = width as usize * height as usize;
    for index in (0..pixel_count).step_by(COLOR_STRIDE) {
        let x = (index % width as usize) as u32;
        let y = (index / width as usize) as u32;
        let (pa, pb) = (a.pixel(x, y), b.pixel(x, y));
        let value_diff = (pa.value_hsv() - pb.value_hsv()).abs();
        let saturation_diff = (pa.saturation_hsv() - pb.saturation_hsv()).abs();
        total_difference += value_diff + saturation_diff;
        samples += 1;
    }

    if samples == 0 {
        return 0.0;
    }
    unit(1.0 - (total_difference / (2.0 * samples as f64)).min(1.0))
}
