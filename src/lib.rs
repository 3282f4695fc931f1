// THEORY:
// This file is the entry point for the `defect_vision` library crate. It exposes the
// inspection engine to the station software (and the `inspection_tester` CLI).
//
// The primary API is the `DefectDecisionEngine` (synchronous) and the
// `ParallelDecisionEngine` (async, pooled), together with the data handed to them:
// a `ReferenceSet` snapshot of the operator's samples and a `ThresholdConfig`. The
// `core_modules` hold the building blocks (rasters, metrics, scoring, matching) and
// stay public for tuning tools that want a `SimilarityBreakdown`.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{EngineConfig, SettingsStore, ThresholdConfig, migrate_thresholds};
pub use core_modules::defect::{DefectCategory, DefectDetail, InspectionResult};
pub use core_modules::region::BoundingBox;
pub use core_modules::sample::{ReferenceLibrary, ReferenceSample, ReferenceSet};
pub use core_modules::scorer::{SimilarityBreakdown, calculate_image_similarity};
pub use error::{InspectionError, Result};
pub use parallel_pipeline::{Capture, FrameSource, ParallelDecisionEngine, RealtimeScanner};
pub use pipeline::{DefectDecisionEngine, InspectionReport};
