// THEORY:
// Flash and molding defects do not look like a spot or a line. They change how the
// surface *feels*: grainier texture, rougher relief, a different sheen. Localised
// color and shape metrics barely move on them, so this family summarises each image
// into a `SurfaceSignature` of global texture statistics and compares signatures.
//
// The signature is computed once per image, which lets the matcher reuse a frame's
// signature against every reference. Each comparison is `max(0, 1 - |Δ| / scale)`
// where `scale` is that statistic's own calibration constant; raw magnitudes differ
// by orders of magnitude between statistics, and the constants below are part of
// the scoring contract.
//
// Texture statistics alone are blind to brightness: two flat plates of any two
// levels have identical texture. The mean block level is therefore compared as
// well, and its closeness (`SurfaceScores::level`) scales the fused score.

use super::{closeness, edge::sobel_magnitude_at, unit};
use crate::core_modules::chunk::chunk::Chunk;
use crate::core_modules::pixel_buffer::PixelBuffer;

/// Block size for the texture-energy statistics.
pub const TEXTURE_BLOCK: u32 = 8;
/// Block size for the local-variance statistic.
pub const VARIANCE_BLOCK: u32 = 16;
/// Luminance above which a pixel counts as a specular highlight.
pub const GLOSS_LUMINANCE: f64 = 200.0;
/// Sampling stride of the roughness pass.
pub const ROUGHNESS_STRIDE: usize = 2;

// Calibration constants, one per compared statistic.
pub const TEXTURE_MEAN_SCALE: f64 = 255.0;
pub const TEXTURE_VARIANCE_SCALE: f64 = 2500.0;
pub const TEXTURE_CONTRAST_SCALE: f64 = 255.0;
pub const TEXTURE_HOMOGENEITY_SCALE: f64 = 1.0;
pub const ROUGHNESS_SCALE: f64 = 64.0;
pub const GLOSS_RATIO_SCALE: f64 = 0.5;
pub const GLOSS_TRANSITION_SCALE: f64 = 0.25;
pub const LOCAL_VARIANCE_SCALE: f64 = 2500.0;
pub const HIGH_FREQUENCY_SCALE: f64 = 64.0;
pub const EDGE_IRREGULARITY_SCALE: f64 = 128.0;

/// Global surface statistics of one canonical buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSignature {
    /// Mean 8x8 block luminance.
    pub texture_mean: f64,
    /// Mean 8x8 block luminance variance.
    pub texture_variance: f64,
    /// Mean 8x8 block contrast (max - min).
    pub texture_contrast: f64,
    /// Mean 8x8 block homogeneity, in (0, 1].
    pub texture_homogeneity: f64,
    /// Mean standard deviation of the 8 directional gradients around a pixel.
    pub roughness: f64,
    /// Fraction of pixels brighter than `GLOSS_LUMINANCE`.
    pub gloss_ratio: f64,
    /// Fraction of horizontal neighbour pairs crossing the gloss boundary.
    pub gloss_transitions: f64,
    /// Mean 16x16 block luminance variance.
    pub local_variance: f64,
    /// Mean absolute discrete Laplacian.
    pub high_frequency: f64,
    /// Mean deviation of the Sobel magnitude from its 4-neighbour average.
    pub edge_irregularity: f64,
}

/// Per-statistic similarities between two signatures, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceScores {
    /// Closeness of the mean block levels; multiplies the fused total.
    pub level: f64,
    pub texture: f64,
    pub roughness: f64,
    pub gloss: f64,
    pub variance: f64,
    pub high_frequency: f64,
    pub edge_irregularity: f64,
}

impl SurfaceSignature {
    pub fn of(buffer: &PixelBuffer) -> Self {
        let width = buffer.width() as usize;
        let height = buffer.height() as usize;
        let luminance = buffer.luminance_map();

        let (texture_mean, texture_variance, texture_contrast, texture_homogeneity) = texture_energy(buffer);
        let (gloss_ratio, gloss_transitions) = gloss_pattern(&luminance, width);

        Self {
            texture_mean,
            texture_variance,
            texture_contrast,
            texture_homogeneity,
            roughness: roughness(&luminance, width, height),
            gloss_ratio,
            gloss_transitions,
            local_variance: local_variance(buffer),
            high_frequency: high_frequency(&luminance, width, height),
            edge_irregularity: edge_irregularity(&luminance, width, height),
        }
    }

    pub fn compare(&self, other: &SurfaceSignature) -> SurfaceScores {
        let level = closeness(self.texture_mean, other.texture_mean, TEXTURE_MEAN_SCALE);
        let texture = (level
            + closeness(self.texture_variance, other.texture_variance, TEXTURE_VARIANCE_SCALE)
            + closeness(self.texture_contrast, other.texture_contrast, TEXTURE_CONTRAST_SCALE)
            + closeness(
                self.texture_homogeneity,
                other.texture_homogeneity,
                TEXTURE_HOMOGENEITY_SCALE,
            ))
            / 4.0;
        let gloss = (closeness(self.gloss_ratio, other.gloss_ratio, GLOSS_RATIO_SCALE)
            + closeness(self.gloss_transitions, other.gloss_transitions, GLOSS_TRANSITION_SCALE))
            / 2.0;

        SurfaceScores {
            level,
            texture: unit(texture),
            roughness: closeness(self.roughness, other.roughness, ROUGHNESS_SCALE),
            gloss: unit(gloss),
            variance: closeness(self.local_variance, other.local_variance, LOCAL_VARIANCE_SCALE),
            high_frequency: closeness(self.high_frequency, other.high_frequency, HIGH_FREQUENCY_SCALE),
            edge_irregularity: closeness(
                self.edge_irregularity,
                other.edge_irregularity,
                EDGE_IRREGULARITY_SCALE,
            ),
        }
    }
}

fn mean_or_zero(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}

/// Mean level, variance, contrast and homogeneity over 8x8 blocks. A buffer too
/// small for one block is summarised as a single block.
fn texture_energy(buffer: &PixelBuffer) -> (f64, f64, f64, f64) {
    let mut chunks = Chunk::tile(buffer, TEXTURE_BLOCK);
    if chunks.is_empty() {
        chunks.push(Chunk::new(buffer.width(), buffer.height(), buffer.luminance_map()));
    }
    let n = chunks.len();
    let mean = chunks.iter().map(Chunk::mean).sum::<f64>() / n as f64;
    let variance = chunks.iter().map(Chunk::variance).sum::<f64>() / n as f64;
    let contrast = chunks.iter().map(Chunk::contrast).sum::<f64>() / n as f64;
    let homogeneity = chunks.iter().map(Chunk::homogeneity).sum::<f64>() / n as f64;
    (mean, variance, contrast, homogeneity)
}

/// Mean 16x16 block variance, falling back to the whole buffer when it is smaller.
fn local_variance(buffer: &PixelBuffer) -> f64 {
    let chunks = Chunk::tile(buffer, VARIANCE_BLOCK);
    if chunks.is_empty() {
        return Chunk::new(buffer.width(), buffer.height(), buffer.luminance_map()).variance();
    }
    chunks.iter().map(Chunk::variance).sum::<f64>() / chunks.len() as f64
}

const NEIGHBOURS_8: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Mean over interior pixels of the standard deviation of the 8 directional
/// luminance gradients.
fn roughness(luminance: &[f64], width: usize, height: usize) -> f64 {
    if width < 3 || height < 3 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for y in (1..height - 1).step_by(ROUGHNESS_STRIDE) {
        for x in (1..width - 1).step_by(ROUGHNESS_STRIDE) {
            let center = luminance[y * width + x];
            let mut gradients = [0.0f64; 8];
            for (slot, (dx, dy)) in gradients.iter_mut().zip(NEIGHBOURS_8) {
                let nx = (x as isize + dx) as usize;
                let ny = (y as isize + dy) as usize;
                *slot = luminance[ny * width + nx] - center;
            }
            let mean = gradients.iter().sum::<f64>() / 8.0;
            let variance = gradients.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / 8.0;
            total += variance.sqrt();
            count += 1;
        }
    }
    mean_or_zero(total, count)
}

/// Highlight ratio and bright/dark transition frequency along rows.
fn gloss_pattern(luminance: &[f64], width: usize) -> (f64, f64) {
    if luminance.is_empty() || width == 0 {
        return (0.0, 0.0);
    }
    let bright = luminance.iter().filter(|&&l| l > GLOSS_LUMINANCE).count();
    let mut transitions = 0usize;
    let mut pairs = 0usize;
    for row in luminance.chunks(width) {
        for pair in row.windows(2) {
            if (pair[0] > GLOSS_LUMINANCE) != (pair[1] > GLOSS_LUMINANCE) {
                transitions += 1;
            }
            pairs += 1;
        }
    }
    (
        bright as f64 / luminance.len() as f64,
        mean_or_zero(transitions as f64, pairs),
    )
}

/// Mean |4c - up - down - left - right| over interior pixels.
fn high_frequency(luminance: &[f64], width: usize, height: usize) -> f64 {
    if width < 3 || height < 3 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let i = y * width + x;
            let laplacian = 4.0 * luminance[i]
                - luminance[i - width]
                - luminance[i + width]
                - luminance[i - 1]
                - luminance[i + 1];
            total += laplacian.abs();
            count += 1;
        }
    }
    mean_or_zero(total, count)
}

/// Mean |m - avg(4 neighbours)| over the interior of the full Sobel magnitude map.
fn edge_irregularity(luminance: &[f64], width: usize, height: usize) -> f64 {
    if width < 5 || height < 5 {
        return 0.0;
    }
    // Magnitudes for the interior band 1..w-1 x 1..h-1, stored in a (w-2) x (h-2) map.
    let (mw, mh) = (width - 2, height - 2);
    let mut magnitudes = Vec::with_capacity(mw * mh);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            magnitudes.push(sobel_magnitude_at(luminance, width, x, y));
        }
    }

    let mut total = 0.0;
    let mut count = 0usize;
    for y in 1..mh - 1 {
        for x in 1..mw - 1 {
            let i = y * mw + x;
            let neighbours =
                (magnitudes[i - mw] + magnitudes[i + mw] + magnitudes[i - 1] + magnitudes[i + 1]) / 4.0;
            total += (magnitudes[i] - neighbours).abs();
            count += 1;
        }
    }
    mean_or_zero(total, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;

    fn checkerboard(size: u32, cell: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let level = if ((x / cell) + (y / cell)) % 2 == 0 { 30 } else { 225 };
                data.extend_from_slice(&[level, level, level, 255]);
            }
        }
        PixelBuffer::from_rgba(size, size, data).unwrap()
    }

    #[test]
    fn flat_surface_has_a_quiet_signature() {
        let flat = PixelBuffer::filled(32, 32, Pixel::gray(120)).unwrap();
        let signature = SurfaceSignature::of(&flat);
        assert!((signature.texture_mean - 120.0).abs() < 1e-9);
        assert_eq!(signature.texture_variance, 0.0);
        assert_eq!(signature.texture_homogeneity, 1.0);
        assert_eq!(signature.roughness, 0.0);
        assert_eq!(signature.gloss_ratio, 0.0);
        assert_eq!(signature.high_frequency, 0.0);
        assert_eq!(signature.edge_irregularity, 0.0);
    }

    #[test]
    fn gloss_counts_highlights_and_transitions() {
        let (ratio, transitions) = gloss_pattern(&[250.0, 10.0, 250.0, 10.0], 4);
        assert_eq!(ratio, 0.5);
        assert_eq!(transitions, 1.0);
    }

    #[test]
    fn identical_signatures_compare_to_one() {
        let signature = SurfaceSignature::of(&checkerboard(64, 2));
        let scores = signature.compare(&signature);
        for score in [
            scores.level,
            scores.texture,
            scores.roughness,
            scores.gloss,
            scores.variance,
            scores.high_frequency,
            scores.edge_irregularity,
        ] {
            assert_eq!(score, 1.0);
        }
    }

    #[test]
    fn grainy_surface_differs_from_flat_one() {
        let flat = SurfaceSignature::of(&PixelBuffer::filled(64, 64, Pixel::gray(128)).unwrap());
        let grainy = SurfaceSignature::of(&checkerboard(64, 1));
        let scores = flat.compare(&grainy);
        assert!(scores.texture < 0.7, "{scores:?}");
        assert_eq!(scores.high_frequency, 0.0);
        assert!(scores.roughness < 1.0);
    }

    #[test]
    fn opposite_plateaus_differ_only_in_level_and_gloss() {
        let white = SurfaceSignature::of(&PixelBuffer::filled(64, 64, Pixel::gray(255)).unwrap());
        let black = SurfaceSignature::of(&PixelBuffer::filled(64, 64, Pixel::gray(0)).unwrap());
        let scores = white.compare(&black);
        assert!(scores.level < 1e-6, "{scores:?}");
        assert!(scores.texture < 0.76, "{scores:?}");
        // Full highlight coverage against none.
        assert!((scores.gloss - 0.5).abs() < 1e-9, "{scores:?}");
        assert_eq!(scores.roughness, 1.0);
    }

    #[test]
    fn tiny_buffers_do_not_panic() {
        let tiny = PixelBuffer::filled(2, 2, Pixel::gray(10)).unwrap();
        let signature = SurfaceSignature::of(&tiny);
        assert_eq!(signature.compare(&signature).texture, 1.0);
    }
}
