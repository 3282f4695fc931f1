//! Local patch agreement: mean absolute RGB difference per 16x16 patch.

use super::{common_extent, unit};
use crate::core_modules::pixel_buffer::PixelBuffer;

pub const PATCH_SIZE: u32 = 16;
/// Step between sampled pixels inside a patch.
pub const PATCH_STRIDE: u32 = 2;

const MAX_PIXEL_DIFFERENCE: f64 = 255.0 * 3.0;

fn patch_agreement(a: &PixelBuffer, b: &PixelBuffer, x: u32, y: u32, w: u32, h: u32) -> f64 {
    let mut difference = 0u64;
    let mut samples = 0u64;
    for py in (y..y + h).step_by(PATCH_STRIDE as usize) {
        for px in (x..x + w).step_by(PATCH_STRIDE as usize) {
            let pa = a.pixel(px, py);
            let pb = b.pixel(px, py);
            difference += pa.red.abs_diff(pb.red) as u64
                + pa.green.abs_diff(pb.green) as u64
                + pa.blue.abs_diff(pb.blue) as u64;
            samples += 1;
        }
    }
    if samples == 0 {
        return 0.0;
    }
    1.0 - difference as f64 / (samples as f64 * MAX_PIXEL_DIFFERENCE)
}

/// Mean of `1 - normalized difference` over non-overlapping 16x16 patches.
///
/// Buffers smaller than one patch are treated as a single patch covering them.
pub fn patch_similarity(a: &PixelBuffer, b: &PixelBuffer) -> f64 {
    let (width, height) = common_extent(a, b);
    if width < PATCH_SIZE || height < PATCH_SIZE {
        return unit(patch_agreement(a, b, 0, 0, width, height));
    }

    let mut total = 0.0;
    let mut patches = 0usize;
    let mut y = 0;
    while y + PATCH_SIZE <= height {
        let mut x = 0;
        while x + PATCH_SIZE <= width {
            total += patch_agreement(a, b, x, y, PATCH_SIZE, PATCH_SIZE);
            patches += 1;
            x += PATCH_SIZE;
        }
        y += PATCH_SIZE;
    }

    if patches == 0 {
        return 0.0;
    }
    unit(total / patches as f64)
}
