//! Global SSIM approximation over a sparse luminance grid.

use super::{common_extent, unit};
use crate::core_modules::pixel_buffer::PixelBuffer;

/// Grid spacing, in pixels, of the luminance samples.
pub const GRID_STEP: u32 = 8;
/// (0.01 * 255)^2
pub const C1: f64 = 6.5025;
/// (0.03 * 255)^2
pub const C2: f64 = 58.5225;

/// SSIM over luminance sampled every `GRID_STEP` pixels, clamped to [0, 1].
///
/// Means, variances and covariance are taken over the whole grid at once, so this is
/// one global SSIM value rather than a mean of windowed ones.
pub fn structural_similarity(a: &PixelBuffer, b: &PixelBuffer) -> f64 {
    let (width, height) = common_extent(a, b);

    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    let mut sum_a_sq = 0.0;
    let mut sum_b_sq = 0.0;
    let mut sum_product = 0.0;
    let mut count = 0usize;

    for y in (0..height).step_by(GRID_STEP as usize) {
        for x in (0..width).step_by(GRID_STEP as usize) {
            let la = a.luminance(x, y);
            let lb = b.luminance(x, y);
            sum_a += la;
            sum_b += lb;
            sum_a_sq += la * la;
            sum_b_sq += lb * lb;
            sum_product += la * lb;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }

    let n = count as f64;
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;
    let var_a = sum_a_sq / n - mean_a * mean_a;
    let var_b = sum_b_sq / n - mean_b * mean_b;
    let covariance = sum_product / n - mean_a * mean_b;

    let numerator = (2.0 * (mean_a * mean_b) + C1) * (2.0 * covariance + C2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);
    unit(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;

    #[test]
    fn black_against_white_is_nearly_zero() {
        let black = PixelBuffer::filled(64, 64, Pixel::gray(0)).unwrap();
        let white = PixelBuffer::filled(64, 64, Pixel::gray(255)).unwrap();
        let score = structural_similarity(&black, &white);
        assert!(score < 1e-3, "got {score}");
    }

    #[test]
    fn identical_textured_buffers_score_one() {
        let base = PixelBuffer::filled(64, 64, Pixel::gray(30)).unwrap();
        let textured = base.with_rect(0, 0, 64, 9, Pixel::gray(220));
        assert!((structural_similarity(&textured, &textured) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_structure_scores_low() {
        let base = PixelBuffer::filled(64, 64, Pixel::gray(0)).unwrap();
        let top = base.with_rect(0, 0, 64, 32, Pixel::gray(255));
        let bottom = base.with_rect(0, 32, 64, 32, Pixel::gray(255));
        assert_eq!(structural_similarity(&top, &bottom), 0.0);
    }
}
