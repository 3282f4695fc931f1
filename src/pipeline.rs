// THEORY:
// The `pipeline` module is the top-level, synchronous API of the inspection engine.
// It takes one encoded frame plus the operator's references and thresholds and
// returns every detected defect, in category order.
//
// Stages for one frame:
//   Stage 1: decode once at native resolution and run the pixel feature analyzer
//            (global statistics and candidate bounding boxes).
//   Stage 2: resample to the canonical square. The frame's derived metric data is
//            cached in a `SmartBuffer` and shared by every reference comparison.
//   Stage 3: per category with at least one reference, run the sample matcher
//            (best match over that category's references).
//   Stage 4: every matching category becomes a `DefectDetail` carrying the bounding
//            box of its pre-filter region class.
//
// The engine holds no state across calls. References and thresholds are read-only
// snapshots for the duration of a pass. Categories do not interact; the only
// ordering that matters is `DefectCategory::ALL`, because callers treat the first
// defect as the primary classification.

use crate::config::{EngineConfig, ThresholdConfig};
use crate::core_modules::defect::{DefectCategory, DefectDetail, InspectionResult};
use crate::core_modules::feature_analyzer::{PixelFeatureAnalyzer, PixelFeatures};
use crate::core_modules::matcher::{MatchOutcome, SampleMatcher};
use crate::core_modules::raster::RasterPreprocessor;
use crate::core_modules::sample::ReferenceSet;
use crate::core_modules::smart_buffer::SmartBuffer;
use crate::error::Result;
use log::{debug, info};

/// Outcome of inspecting one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionReport {
    /// Detected defects in category order. Empty means the frame passes.
    pub defects: Vec<DefectDetail>,
    pub features: PixelFeatures,
}

impl InspectionReport {
    pub fn verdict(&self) -> InspectionResult {
        InspectionResult::from_defects(&self.defects)
    }

    pub fn primary_defect(&self) -> Option<&DefectDetail> {
        self.defects.first()
    }

    pub fn passed(&self) -> bool {
        self.defects.is_empty()
    }
}

/// A decoded frame ready for comparison.
#[derive(Debug)]
pub struct PreparedFrame {
    pub features: PixelFeatures,
    pub canonical: SmartBuffer,
}

/// The synchronous decision engine.
#[derive(Debug, Clone)]
pub struct DefectDecisionEngine {
    config: EngineConfig,
    preprocessor: RasterPreprocessor,
    analyzer: PixelFeatureAnalyzer,
    matcher: SampleMatcher,
}

impl Default for DefectDecisionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DefectDecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let preprocessor = RasterPreprocessor::new(config.canonical_size);
        Self {
            config,
            preprocessor,
            analyzer: PixelFeatureAnalyzer::new(),
            matcher: SampleMatcher::new(preprocessor),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn matcher(&self) -> &SampleMatcher {
        &self.matcher
    }

    /// Stages 1 and 2: decode, analyse, resample.
    pub fn prepare(&self, frame_bytes: &[u8]) -> Result<PreparedFrame> {
        let native = self.preprocessor.decode_native(frame_bytes)?;
        let features = self.analyzer.analyze(&native);
        let canonical = SmartBuffer::new(self.preprocessor.resample(&native)?);
        Ok(PreparedFrame { features, canonical })
    }

    /// Whether `category` is compared this pass. Only reference availability
    /// counts; pixel statistics never suppress a comparison.
    pub fn should_compare(category: DefectCategory, references: &ReferenceSet) -> bool {
        references.count(category) > 0
    }

    /// Stage 4 for one category.
    pub fn decide(category: DefectCategory, outcome: MatchOutcome, features: &PixelFeatures) -> Option<DefectDetail> {
        outcome.is_match.then(|| DefectDetail {
            category,
            confidence: outcome.max_confidence,
            bounding_box: features.bounding_box(category.region_class()),
        })
    }

    pub fn inspect(
        &self,
        frame_bytes: &[u8],
        references: &ReferenceSet,
        thresholds: &ThresholdConfig,
    ) -> Result<InspectionReport> {
        let frame = self.prepare(frame_bytes)?;

        let defects = DefectCategory::ALL
            .into_iter()
            .filter(|&category| Self::should_compare(category, references))
            .filter_map(|category| {
                let outcome = self.matcher.match_frame(
                    &frame.canonical,
                    references.for_category(category).map(|s| s.as_ref()),
                    thresholds.get(category),
                    category.weighting_profile(),
                );
                debug!(
                    "{category}: max confidence {:.4} (threshold {:.2})",
                    outcome.max_confidence,
                    thresholds.get(category)
                );
                Self::decide(category, outcome, &frame.features)
            })
            .collect();

        let report = InspectionReport {
            defects,
            features: frame.features,
        };
        info!("inspection verdict: {:?} ({} defects)", report.verdict(), report.defects.len());
        Ok(report)
    }

    /// Inspects several faces of one product and concatenates their defects in
    /// frame order.
    pub fn inspect_all<'a>(
        &self,
        frames: impl IntoIterator<Item = &'a [u8]>,
        references: &ReferenceSet,
        thresholds: &ThresholdConfig,
    ) -> Result<Vec<DefectDetail>> {
        let mut defects = Vec::new();
        for frame in frames {
            defects.extend(self.inspect(frame, references, thresholds)?.defects);
        }
        Ok(defects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::core_modules::sample::{ReferenceLibrary, ReferenceSample};
    use crate::test_support::{dark_spot_frame, png, solid};

    fn reference(category: DefectCategory, payload: Vec<u8>) -> ReferenceSample {
        ReferenceSample::register(category, "", payload, 1)
    }

    #[test]
    fn no_references_always_pass() {
        let engine = DefectDecisionEngine::default();
        let report = engine
            .inspect(&png(&dark_spot_frame(256)), &ReferenceSet::default(), &ThresholdConfig::default())
            .unwrap();
        assert!(report.passed());
        assert_eq!(report.verdict(), InspectionResult::Ok);
        assert_eq!(report.primary_defect(), None);
        assert_eq!(report.features.dark_spot_count, 100);
    }

    #[test]
    fn matching_dark_spot_is_reported_with_its_box() {
        let frame = png(&dark_spot_frame(256));
        let references = ReferenceSet::new(vec![reference(DefectCategory::DarkSpot, frame.clone())]);
        let report = DefectDecisionEngine::default()
            .inspect(&frame, &references, &ThresholdConfig::default())
            .unwrap();

        assert_eq!(report.verdict(), InspectionResult::Ng);
        let primary = report.primary_defect().unwrap();
        assert_eq!(primary.category, DefectCategory::DarkSpot);
        assert!(primary.confidence >= 0.5);
        let bbox = primary.bounding_box.unwrap();
        assert!(bbox.fits_within(256, 256));
        assert_eq!((bbox.x, bbox.y), (30, 30));
    }

    #[test]
    fn defects_follow_category_order() {
        let frame = png(&dark_spot_frame(256));
        let library = ReferenceLibrary::new();
        library.register(DefectCategory::Flash, "", frame.clone());
        library.register(DefectCategory::Scratch, "", frame.clone());
        library.register(DefectCategory::DarkSpot, "", frame.clone());
        let report = DefectDecisionEngine::default()
            .inspect(&frame, &library.snapshot(), &ThresholdConfig::default())
            .unwrap();
        let order: Vec<_> = report.defects.iter().map(|d| d.category).collect();
        assert_eq!(order, DefectCategory::ALL.to_vec());
        // A plain gray/white frame has no color-irregular pixels.
        assert_eq!(report.defects[2].bounding_box, None);
    }

    #[test]
    fn bounding_boxes_stay_inside_small_frames() {
        let frame = solid(30, 255).with_rect(0, 0, 6, 6, Pixel::gray(0));
        let bytes = png(&frame);
        let references = ReferenceSet::new(vec![reference(DefectCategory::Scratch, bytes.clone())]);
        let report = DefectDecisionEngine::default()
            .inspect(&bytes, &references, &ThresholdConfig::default())
            .unwrap();
        for defect in &report.defects {
            if let Some(bbox) = defect.bounding_box {
                assert!(bbox.fits_within(30, 30), "{bbox:?}");
            }
        }
        assert!(!report.defects.is_empty());
    }

    #[test]
    fn dissimilar_references_do_not_trigger() {
        let references = ReferenceSet::new(vec![reference(DefectCategory::DarkSpot, png(&solid(256, 0)))]);
        let report = DefectDecisionEngine::default()
            .inspect(&png(&solid(256, 255)), &references, &ThresholdConfig::default())
            .unwrap();
        assert!(report.passed());
    }

    #[test]
    fn flat_frames_do_not_match_flat_flash_references_of_another_level() {
        let references = ReferenceSet::new(vec![reference(DefectCategory::Flash, png(&solid(256, 0)))]);
        let report = DefectDecisionEngine::default()
            .inspect(&png(&solid(256, 255)), &references, &ThresholdConfig::default())
            .unwrap();
        assert!(report.passed(), "{:?}", report.defects);
    }

    #[test]
    fn pixel_statistics_never_suppress_a_comparison() {
        // No dark pixels and a bright mean: the old heuristics would have skipped
        // both dark-spot and scratch, yet the identical references must still match.
        let frame = png(&solid(64, 200));
        let references = ReferenceSet::new(vec![
            reference(DefectCategory::DarkSpot, frame.clone()),
            reference(DefectCategory::Scratch, frame.clone()),
        ]);
        let report = DefectDecisionEngine::default()
            .inspect(&frame, &references, &ThresholdConfig::default())
            .unwrap();
        assert_eq!(report.features.dark_spot_count, 0);
        assert!(report.features.average_brightness > 80.0);
        assert_eq!(report.verdict(), InspectionResult::Ng);
        let categories: Vec<_> = report.defects.iter().map(|d| d.category).collect();
        assert_eq!(categories, [DefectCategory::DarkSpot, DefectCategory::Scratch]);
        for category in DefectCategory::ALL {
            assert_eq!(
                DefectDecisionEngine::should_compare(category, &references),
                category != DefectCategory::Flash
            );
        }
    }

    #[test]
    fn inspect_all_concatenates_in_frame_order() {
        let spot = png(&dark_spot_frame(256));
        let unrelated = png(&solid(256, 0));
        let references = ReferenceSet::new(vec![
            reference(DefectCategory::DarkSpot, spot.clone()),
            reference(DefectCategory::Scratch, spot.clone()),
        ]);
        let engine = DefectDecisionEngine::default();
        let defects = engine
            .inspect_all([unrelated.as_slice(), spot.as_slice(), spot.as_slice()], &references, &ThresholdConfig::default())
            .unwrap();
        let categories: Vec<_> = defects.iter().map(|d| d.category).collect();
        assert_eq!(
            categories,
            [
                DefectCategory::DarkSpot,
                DefectCategory::Scratch,
                DefectCategory::DarkSpot,
                DefectCategory::Scratch
            ]
        );
    }

    #[test]
    fn undecodable_frames_are_errors() {
        let err = DefectDecisionEngine::default()
            .inspect(b"nope", &ReferenceSet::default(), &ThresholdConfig::default())
            .unwrap_err();
        assert!(err.is_decode_failure());
    }
}
