// THEORY:
// The `SimilarityScorer` fuses the applicable metric subset into one confidence in
// [0, 1]. The weighting is fixed per profile, not learned:
//
//   Standard: 0.25 histogram + 0.30 structural + 0.20 edge + 0.15 patch + 0.10 color
//   Surface:  0.30 texture + 0.25 roughness + 0.15 gloss + 0.15 variance
//             + 0.10 high frequency + 0.05 edge irregularity
//
// Both weight sets sum to 1, so well-formed components already produce a value in
// [0, 1]; the total is still clamped so a future component bug cannot leak out of
// range. The surface total is then multiplied by the level closeness of the two
// images, since texture statistics cannot tell a white plate from a black one.
// Every component is kept in the `SimilarityBreakdown` for tuning and tests.

use crate::core_modules::defect::WeightingProfile;
use crate::core_modules::metrics::{
    SurfaceScores, color_distribution_similarity, edge_similarity, patch_similarity,
    structural_similarity, unit,
};
use crate::core_modules::raster::RasterPreprocessor;
use crate::core_modules::smart_buffer::SmartBuffer;
use crate::error::Result;
use log::debug;

/// Components of the standard profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardScores {
    pub histogram: f64,
    pub structural: f64,
    pub edge: f64,
    pub patch: f64,
    pub color: f64,
}

impl StandardScores {
    pub fn fuse(&self) -> f64 {
        unit(
            0.25 * self.histogram
                + 0.30 * self.structural
                + 0.20 * self.edge
                + 0.15 * self.patch
                + 0.10 * self.color,
        )
    }
}

impl SurfaceScores {
    pub fn fuse(&self) -> f64 {
        let weighted = unit(
            0.30 * self.texture
                + 0.25 * self.roughness
                + 0.15 * self.gloss
                + 0.15 * self.variance
                + 0.10 * self.high_frequency
                + 0.05 * self.edge_irregularity,
        );
        unit(weighted * self.level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentScores {
    Standard(StandardScores),
    Surface(SurfaceScores),
}

/// Per-metric scores and the fused total for one comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityBreakdown {
    pub components: ComponentScores,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn breakdown(profile: WeightingProfile, a: &SmartBuffer, b: &SmartBuffer) -> SimilarityBreakdown {
        let breakdown = Self::compute(profile, a, b);
        debug!("similarity breakdown: {:?} -> {:.4}", breakdown.components, breakdown.total);
        breakdown
    }

    fn compute(profile: WeightingProfile, a: &SmartBuffer, b: &SmartBuffer) -> SimilarityBreakdown {
        match profile {
            WeightingProfile::Standard => {
                let (pa, pb) = (a.buffer(), b.buffer());
                let scores = StandardScores {
                    histogram: a.histograms().similarity(b.histograms()),
                    structural: structural_similarity(pa, pb),
                    edge: edge_similarity(pa, pb),
                    patch: patch_similarity(pa, pb),
                    color: color_distribution_similarity(pa, pb),
                };
                SimilarityBreakdown {
                    components: ComponentScores::Standard(scores),
                    total: scores.fuse(),
                }
            }
            WeightingProfile::Surface => {
                let scores = a.surface().compare(b.surface());
                SimilarityBreakdown {
                    components: ComponentScores::Surface(scores),
                    total: scores.fuse(),
                }
            }
        }
    }

    pub fn score(profile: WeightingProfile, a: &SmartBuffer, b: &SmartBuffer) -> f64 {
        Self::breakdown(profile, a, b).total
    }
}

/// Standard-profile similarity of two encoded images, both resampled to 256x256.
pub fn calculate_image_similarity(image_a: &[u8], image_b: &[u8]) -> Result<f64> {
    let preprocessor = RasterPreprocessor::default();
    let a = SmartBuffer::new(preprocessor.canonical(image_a)?);
    let b = SmartBuffer::new(preprocessor.canonical(image_b)?);
    Ok(SimilarityScorer::score(WeightingProfile::Standard, &a, &b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::core_modules::pixel_buffer::PixelBuffer;
    use crate::test_support::{dark_spot_frame, png};
    use proptest::prelude::*;

    fn smart(level: u8) -> SmartBuffer {
        SmartBuffer::new(PixelBuffer::filled(256, 256, Pixel::gray(level)).unwrap())
    }

    #[test]
    fn weights_sum_to_one() {
        let ones = StandardScores {
            histogram: 1.0,
            structural: 1.0,
            edge: 1.0,
            patch: 1.0,
            color: 1.0,
        };
        assert!((ones.fuse() - 1.0).abs() < 1e-12);
        let surface = SurfaceScores {
            level: 1.0,
            texture: 1.0,
            roughness: 1.0,
            gloss: 1.0,
            variance: 1.0,
            high_frequency: 1.0,
            edge_irregularity: 1.0,
        };
        assert!((surface.fuse() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_solid_gray_scores_at_least_099() {
        let bytes = png(&PixelBuffer::filled(256, 256, Pixel::gray(128)).unwrap());
        let score = calculate_image_similarity(&bytes, &bytes).unwrap();
        assert!(score >= 0.99, "got {score}");
    }

    #[test]
    fn white_against_black_is_near_zero() {
        let breakdown = SimilarityScorer::breakdown(WeightingProfile::Standard, &smart(255), &smart(0));
        let ComponentScores::Standard(scores) = breakdown.components else {
            panic!("expected standard components");
        };
        assert_eq!(scores.histogram, 0.0);
        assert!(scores.structural < 1e-3);
        assert!(breakdown.total < 0.1, "got {}", breakdown.total);
    }

    #[test]
    fn opposite_plateaus_are_near_zero_on_the_surface_profile() {
        let breakdown = SimilarityScorer::breakdown(WeightingProfile::Surface, &smart(255), &smart(0));
        let ComponentScores::Surface(scores) = breakdown.components else {
            panic!("expected surface components");
        };
        assert!(scores.level < 1e-6);
        assert!(breakdown.total < 1e-6, "got {}", breakdown.total);

        // Flat plates far apart in level stay under the default flash threshold.
        let total = SimilarityScorer::score(WeightingProfile::Surface, &smart(230), &smart(60));
        assert!(total < 0.65, "got {total}");
    }

    #[test]
    fn identity_holds_for_both_profiles() {
        let frame = SmartBuffer::new(dark_spot_frame(256));
        for profile in [WeightingProfile::Standard, WeightingProfile::Surface] {
            let total = SimilarityScorer::score(profile, &frame, &frame);
            assert!((total - 1.0).abs() < 1e-3, "{profile:?}: {total}");
        }
    }

    #[test]
    fn undecodable_input_is_an_error() {
        let bytes = png(&PixelBuffer::filled(8, 8, Pixel::gray(1)).unwrap());
        assert!(calculate_image_similarity(&bytes, b"junk").is_err());
    }

    fn random_buffer(bytes: Vec<u8>) -> SmartBuffer {
        SmartBuffer::new(PixelBuffer::from_rgba(32, 32, bytes).unwrap())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn fused_scores_are_symmetric_and_bounded(
            a in proptest::collection::vec(any::<u8>(), 32 * 32 * 4),
            b in proptest::collection::vec(any::<u8>(), 32 * 32 * 4),
        ) {
            let (a, b) = (random_buffer(a), random_buffer(b));
            for profile in [WeightingProfile::Standard, WeightingProfile::Surface] {
                let ab = SimilarityScorer::breakdown(profile, &a, &b);
                let ba = SimilarityScorer::breakdown(profile, &b, &a);
                prop_assert_eq!(ab, ba);
                prop_assert!((0.0..=1.0).contains(&ab.total));
            }
        }
    }
}
