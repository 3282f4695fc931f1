// THEORY:
// The `SampleMatcher` answers one question: does this frame look like *any* of the
// registered examples of a category? It scores the frame against every reference and
// keeps the single best confidence (nearest neighbour, not an average), then applies
// the category threshold.
//
// The reduction is split out (`MatchOutcome::from_confidences`) so the parallel engine
// can score references on separate workers and still reach the exact same verdict.
// A reference that cannot be decoded is skipped with a warning; it never blocks the
// remaining references.

use crate::core_modules::defect::WeightingProfile;
use crate::core_modules::raster::RasterPreprocessor;
use crate::core_modules::sample::ReferenceSample;
use crate::core_modules::scorer::SimilarityScorer;
use crate::core_modules::smart_buffer::SmartBuffer;
use crate::error::Result;
use log::warn;

/// Best-match result for one category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub is_match: bool,
    pub max_confidence: f64,
}

impl MatchOutcome {
    /// The outcome for a category without usable references.
    pub const NO_MATCH: MatchOutcome = MatchOutcome {
        is_match: false,
        max_confidence: 0.0,
    };

    /// Reduces per-reference confidences to the best one and applies `threshold`.
    /// Completion order does not matter.
    pub fn from_confidences(confidences: impl IntoIterator<Item = f64>, threshold: f64) -> Self {
        let best = confidences.into_iter().fold(None, |best: Option<f64>, c| {
            Some(best.map_or(c, |b| b.max(c)))
        });
        match best {
            Some(max_confidence) => MatchOutcome {
                is_match: max_confidence >= threshold,
                max_confidence,
            },
            None => Self::NO_MATCH,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SampleMatcher {
    preprocessor: RasterPreprocessor,
}

impl SampleMatcher {
    pub fn new(preprocessor: RasterPreprocessor) -> Self {
        Self { preprocessor }
    }

    /// Decodes a reference into a canonical buffer, or `None` (logged) if it is
    /// unreadable.
    pub fn prepare_reference(&self, sample: &ReferenceSample) -> Option<SmartBuffer> {
        match self.preprocessor.canonical(&sample.payload) {
            Ok(buffer) => Some(SmartBuffer::new(buffer)),
            Err(err) => {
                warn!("skipping reference '{}' ({}): {err}", sample.name, sample.id);
                None
            }
        }
    }

    /// Confidence of `frame` against one reference, `None` if the reference is unreadable.
    pub fn compare_reference(
        &self,
        frame: &SmartBuffer,
        sample: &ReferenceSample,
        profile: WeightingProfile,
    ) -> Option<f64> {
        let reference = self.prepare_reference(sample)?;
        Some(SimilarityScorer::score(profile, frame, &reference))
    }

    /// Matches an already-canonical frame against `references`.
    pub fn match_frame<'a>(
        &self,
        frame: &SmartBuffer,
        references: impl IntoIterator<Item = &'a ReferenceSample>,
        threshold: f64,
        profile: WeightingProfile,
    ) -> MatchOutcome {
        let confidences = references
            .into_iter()
            .filter_map(|sample| self.compare_reference(frame, sample, profile));
        MatchOutcome::from_confidences(confidences, threshold)
    }

    /// Decodes `frame_bytes` and matches it against `references`.
    pub fn find_similar_sample<'a>(
        &self,
        frame_bytes: &[u8],
        references: impl IntoIterator<Item = &'a ReferenceSample>,
        threshold: f64,
        profile: WeightingProfile,
    ) -> Result<MatchOutcome> {
        let frame = SmartBuffer::new(self.preprocessor.canonical(frame_bytes)?);
        Ok(self.match_frame(&frame, references, threshold, profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::defect::DefectCategory;
    use crate::test_support::{dark_spot_frame, png, solid};

    fn sample(category: DefectCategory, payload: Vec<u8>) -> ReferenceSample {
        ReferenceSample::register(category, "", payload, 1)
    }

    #[test]
    fn no_references_never_match() {
        let frame = SmartBuffer::new(solid(64, 128));
        let outcome = SampleMatcher::default().match_frame(&frame, std::iter::empty(), 0.3, WeightingProfile::Standard);
        assert_eq!(outcome, MatchOutcome::NO_MATCH);
    }

    #[test]
    fn identical_dark_spot_reference_matches() {
        let bytes = png(&dark_spot_frame(256));
        let reference = sample(DefectCategory::DarkSpot, bytes.clone());
        let outcome = SampleMatcher::default()
            .find_similar_sample(&bytes, [&reference], 0.5, WeightingProfile::Standard)
            .unwrap();
        assert!(outcome.is_match);
        assert!(outcome.max_confidence >= 0.5);
    }

    #[test]
    fn best_reference_wins_and_corrupt_ones_are_skipped() {
        let frame_bytes = png(&dark_spot_frame(256));
        let references = [
            sample(DefectCategory::DarkSpot, png(&solid(256, 0))),
            sample(DefectCategory::DarkSpot, b"corrupt".to_vec()),
            sample(DefectCategory::DarkSpot, frame_bytes.clone()),
        ];
        let outcome = SampleMatcher::default()
            .find_similar_sample(&frame_bytes, &references, 0.9, WeightingProfile::Standard)
            .unwrap();
        assert!(outcome.max_confidence > 0.99);
        assert!(outcome.is_match);

        let only_corrupt = [sample(DefectCategory::DarkSpot, b"corrupt".to_vec())];
        let outcome = SampleMatcher::default()
            .find_similar_sample(&frame_bytes, &only_corrupt, 0.3, WeightingProfile::Standard)
            .unwrap();
        assert_eq!(outcome, MatchOutcome::NO_MATCH);
    }

    #[test]
    fn raising_the_threshold_only_turns_matches_off() {
        let frame = SmartBuffer::new(dark_spot_frame(256));
        let reference = sample(DefectCategory::Scratch, png(&solid(256, 255)));
        let matcher = SampleMatcher::default();
        let mut previous = true;
        for step in 30..=90 {
            let threshold = step as f64 / 100.0;
            let outcome = matcher.match_frame(&frame, [&reference], threshold, WeightingProfile::Standard);
            assert!(previous || !outcome.is_match, "match reappeared at {threshold}");
            previous = outcome.is_match;
        }
    }

    #[test]
    fn reduction_ignores_completion_order() {
        let forward = MatchOutcome::from_confidences([0.2, 0.7, 0.4], 0.6);
        let reverse = MatchOutcome::from_confidences([0.4, 0.7, 0.2], 0.6);
        assert_eq!(forward, reverse);
        assert_eq!(forward.max_confidence, 0.7);
        assert!(forward.is_match);
    }

    #[test]
    fn undecodable_frame_is_an_error() {
        let reference = sample(DefectCategory::Flash, png(&solid(16, 10)));
        let err = SampleMatcher::default()
            .find_similar_sample(b"??", [&reference], 0.5, WeightingProfile::Surface)
            .unwrap_err();
        assert!(err.is_decode_failure());
    }
}
