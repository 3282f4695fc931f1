//! Sobel edge extraction and edge-layout correlation.

use super::{common_extent, unit};
use crate::core_modules::pixel_buffer::PixelBuffer;

/// Sampling stride of the edge-correlation pass.
pub const EDGE_STRIDE: u32 = 2;
/// Relative variance below which a magnitude sequence counts as flat.
const FLAT_TOLERANCE: f64 = 1e-9;

/// Sobel gradient magnitude at interior pixel (x, y) of a row-major luminance map.
/// Callers guarantee 1 <= x < width - 1 and 1 <= y < height - 1.
#[inline]
pub fn sobel_magnitude_at(luminance: &[f64], width: usize, x: usize, y: usize) -> f64 {
    let at = |dx: isize, dy: isize| {
        let px = (x as isize + dx) as usize;
        let py = (y as isize + dy) as usize;
        luminance[py * width + px]
    };

    let gx = -at(-1, -1) + at(1, -1) - 2.0 * at(-1, 0) + 2.0 * at(1, 0) - at(-1, 1) + at(1, 1);
    let gy = -at(-1, -1) - 2.0 * at(0, -1) - at(1, -1) + at(-1, 1) + 2.0 * at(0, 1) + at(1, 1);
    (gx * gx + gy * gy).sqrt()
}

/// Sobel magnitudes of a `width` x `height` luminance map, sampled every `stride`
/// pixels over the interior, row-major.
pub fn sobel_magnitudes(luminance: &[f64], width: u32, height: u32, stride: u32) -> Vec<f64> {
    let (w, h) = (width as usize, height as usize);
    if w < 3 || h < 3 || stride == 0 {
        return Vec::new();
    }
    let mut magnitudes = Vec::with_capacity(((w - 2) / stride as usize + 1) * ((h - 2) / stride as usize + 1));
    for y in (1..h - 1).step_by(stride as usize) {
        for x in (1..w - 1).step_by(stride as usize) {
            magnitudes.push(sobel_magnitude_at(luminance, w, x, y));
        }
    }
    magnitudes
}

fn luminance_region(buffer: &PixelBuffer, width: u32, height: u32) -> Vec<f64> {
    let mut map = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            map.push(buffer.luminance(x, y));
        }
    }
    map
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Pearson correlation of the two Sobel magnitude sequences, mapped to [0, 1] via
/// `(r + 1) / 2`.
///
/// Degenerate cases:
/// - both maps flat (zero variance, or too small to hold an interior pixel): the
///   edge layouts carry no information, so the score is how close the two plateaus
///   are, `1 - |mean_lum_a - mean_lum_b| / 255`;
/// - otherwise identical sequences score 1.0;
/// - exactly one map flat: correlation is undefined and the score is 0.0.
pub fn edge_similarity(a: &PixelBuffer, b: &PixelBuffer) -> f64 {
    let (width, height) = common_extent(a, b);
    let lum_a = luminance_region(a, width, height);
    let lum_b = luminance_region(b, width, height);
    let edges_a = sobel_magnitudes(&lum_a, width, height, EDGE_STRIDE);
    let edges_b = sobel_magnitudes(&lum_b, width, height, EDGE_STRIDE);

    let count = edges_a.len().min(edges_b.len());
    let (edges_a, edges_b) = (&edges_a[..count], &edges_b[..count]);
    let plateau_closeness = || unit(1.0 - (mean(&lum_a) - mean(&lum_b)).abs() / 255.0);
    if count == 0 {
        return plateau_closeness();
    }

    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    let mut sum_a_sq = 0.0;
    let mut sum_b_sq = 0.0;
    let mut sum_product = 0.0;
    for (&ea, &eb) in edges_a.iter().zip(edges_b) {
        sum_a += ea;
        sum_b += eb;
        sum_a_sq += ea * ea;
        sum_b_sq += eb * eb;
        sum_product += ea * eb;
    }

    let n = count as f64;
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;
    let var_a = (sum_a_sq / n - mean_a * mean_a).max(0.0);
    let var_b = (sum_b_sq / n - mean_b * mean_b).max(0.0);
    let covariance = sum_product / n - mean_a * mean_b;

    let flat_a = var_a <= FLAT_TOLERANCE * (1.0 + mean_a * mean_a);
    let flat_b = var_b <= FLAT_TOLERANCE * (1.0 + mean_b * mean_b);
    if flat_a && flat_b {
        return plateau_closeness();
    }
    if edges_a == edges_b {
        return 1.0;
    }
    if flat_a || flat_b {
        return 0.0;
    }

    let correlation = (covariance / (var_a * var_b).sqrt()).clamp(-1.0, 1.0);
    unit((correlation + 1.0) / 2.0)
}
