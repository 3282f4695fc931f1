// THEORY:
// The parallel pipeline runs the same decision as `DefectDecisionEngine`, but spreads
// the (category, reference) comparisons over a pool of workers. Comparisons share no
// mutable state, so the only synchronisation point is the join before the decision
// step; the per-category reduction is a max, which makes completion order irrelevant.
//
// Key architectural principles:
// 1.  **Round-robin dispatch**: one dispatcher task forwards comparison tasks to N
//     worker queues in turn. Each worker runs its comparison on the blocking pool and
//     answers on a oneshot channel, so at most N comparisons are in flight.
// 2.  **Shared, read-only inputs**: the canonical frame is wrapped in an `Arc` and its
//     lazily computed metric caches are shared by every worker. References come from a
//     `ReferenceSet` snapshot, so a registration mid-pass cannot affect it.
// 3.  **Polling scanner**: `RealtimeScanner` is the live-camera loop. It asks a
//     `FrameSource` for a frame on every tick, inspects it, and stops at the first
//     frame with a defect. Ticks that fall behind are skipped, not queued.

use crate::config::{EngineConfig, ThresholdConfig};
use crate::core_modules::defect::{DefectCategory, DefectDetail};
use crate::core_modules::matcher::{MatchOutcome, SampleMatcher};
use crate::core_modules::sample::{ReferenceLibrary, ReferenceSample, ReferenceSet};
use crate::core_modules::smart_buffer::SmartBuffer;
use crate::error::{InspectionError, Result};
use crate::pipeline::{DefectDecisionEngine, InspectionReport};
use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

/// One frame-versus-reference comparison.
pub struct ComparisonTask {
    pub category: DefectCategory,
    pub frame: Arc<SmartBuffer>,
    pub reference: Arc<ReferenceSample>,
    pub result_sender: oneshot::Sender<Option<f64>>,
}

pub struct ComparisonPool {
    task_sender: mpsc::UnboundedSender<ComparisonTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl ComparisonPool {
    /// Spawns the dispatcher and `worker_count` workers. Must be called inside a
    /// tokio runtime.
    pub fn new(worker_count: usize, matcher: SampleMatcher) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<ComparisonTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<ComparisonTask>())
            .unzip();

        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .map(move |mut worker_receiver| {
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let ComparisonTask {
                            category,
                            frame,
                            reference,
                            result_sender,
                        } = task;
                        let confidence =
                            Self::process_comparison_worker(matcher, category, frame, reference).await;
                        let _ = result_sender.send(confidence);
                    }
                })
            })
            .collect();

        Self { task_sender, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    async fn process_comparison_worker(
        matcher: SampleMatcher,
        category: DefectCategory,
        frame: Arc<SmartBuffer>,
        reference: Arc<ReferenceSample>,
    ) -> Option<f64> {
        let profile = category.weighting_profile();
        let sample = Arc::clone(&reference);
        match tokio::task::spawn_blocking(move || matcher.compare_reference(&frame, &sample, profile)).await {
            Ok(confidence) => confidence,
            Err(err) => {
                warn!("comparison against '{}' aborted: {err}", reference.name);
                None
            }
        }
    }

    /// Scores `frame` against `reference`. `Ok(None)` means the reference was unreadable.
    pub async fn compare(
        &self,
        category: DefectCategory,
        frame: Arc<SmartBuffer>,
        reference: Arc<ReferenceSample>,
    ) -> Result<Option<f64>> {
        let (result_sender, result_receiver) = oneshot::channel();

        let task = ComparisonTask {
            category,
            frame,
            reference,
            result_sender,
        };

        self.task_sender
            .send(task)
            .map_err(|_| InspectionError::WorkerPool("failed to send task to comparison pool"))?;

        result_receiver
            .await
            .map_err(|_| InspectionError::WorkerPool("failed to receive result from worker"))
    }

    /// Stops accepting work and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        join_all(self.workers).await;
    }
}

/// Async counterpart of `DefectDecisionEngine`. Reaches the same verdicts.
pub struct ParallelDecisionEngine {
    engine: DefectDecisionEngine,
    pool: ComparisonPool,
}

impl ParallelDecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let engine = DefectDecisionEngine::new(config);
        let pool = ComparisonPool::new(engine.config().worker_count, *engine.matcher());
        Self { engine, pool }
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    pub async fn inspect(
        &self,
        frame_bytes: &[u8],
        references: &ReferenceSet,
        thresholds: &ThresholdConfig,
    ) -> Result<InspectionReport> {
        let engine = self.engine.clone();
        let bytes = frame_bytes.to_vec();
        let prepared = tokio::task::spawn_blocking(move || engine.prepare(&bytes))
            .await
            .map_err(|_| InspectionError::WorkerPool("frame preparation task failed"))??;
        let features = prepared.features;
        let frame = Arc::new(prepared.canonical);

        let categories: Vec<DefectCategory> = DefectCategory::ALL
            .into_iter()
            .filter(|&category| DefectDecisionEngine::should_compare(category, references))
            .collect();

        let shared_frame = &frame;
        let comparisons = categories.iter().flat_map(move |&category| {
            references.for_category(category).map(move |reference| async move {
                let confidence = self
                    .pool
                    .compare(category, Arc::clone(shared_frame), Arc::clone(reference))
                    .await;
                (category, confidence)
            })
        });
        let results = join_all(comparisons).await;

        let mut per_category: Vec<(DefectCategory, Vec<f64>)> =
            categories.iter().map(|&category| (category, Vec::new())).collect();
        for (category, confidence) in results {
            if let Some(confidence) = confidence? {
                if let Some((_, scores)) = per_category.iter_mut().find(|(c, _)| *c == category) {
                    scores.push(confidence);
                }
            }
        }

        let defects: Vec<DefectDetail> = per_category
            .into_iter()
            .filter_map(|(category, scores)| {
                let outcome = MatchOutcome::from_confidences(scores, thresholds.get(category));
                debug!(
                    "{category}: max confidence {:.4} (threshold {:.2})",
                    outcome.max_confidence,
                    thresholds.get(category)
                );
                DefectDecisionEngine::decide(category, outcome, &features)
            })
            .collect();

        let report = InspectionReport { defects, features };
        info!("inspection verdict: {:?} ({} defects)", report.verdict(), report.defects.len());
        Ok(report)
    }

    pub async fn inspect_all(
        &self,
        frames: &[Vec<u8>],
        references: &ReferenceSet,
        thresholds: &ThresholdConfig,
    ) -> Result<Vec<DefectDetail>> {
        let mut defects = Vec::new();
        for frame in frames {
            defects.extend(self.inspect(frame, references, thresholds).await?.defects);
        }
        Ok(defects)
    }

    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}

/// What a frame source produced on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Frame(Vec<u8>),
    /// No frame available yet (camera warming up, dropped frame).
    Pending,
    /// The source is finished; scanning stops.
    Closed,
}

/// Anything that can hand the scanner an encoded frame on demand.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Capture;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Capture + Send,
{
    fn capture(&mut self) -> Capture {
        self()
    }
}

/// First defective frame found by a scan.
#[derive(Debug, Clone)]
pub struct ScanHit {
    pub report: InspectionReport,
    pub frame: Vec<u8>,
    pub frames_inspected: u64,
}

pub struct RealtimeScanner {
    engine: Arc<ParallelDecisionEngine>,
    interval: Duration,
}

impl RealtimeScanner {
    pub fn new(engine: Arc<ParallelDecisionEngine>) -> Self {
        let interval = engine.config().scan_interval();
        Self { engine, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls `source` until a frame with defects is found (`Some`) or the source
    /// closes (`None`). Each frame is inspected against a fresh snapshot of
    /// `library`. Frames that fail to decode are logged and skipped.
    pub async fn scan<S: FrameSource>(
        &self,
        source: &mut S,
        library: &ReferenceLibrary,
        thresholds: &ThresholdConfig,
    ) -> Result<Option<ScanHit>> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frames_inspected = 0u64;

        loop {
            ticker.tick().await;
            let frame = match source.capture() {
                Capture::Frame(frame) => frame,
                Capture::Pending => continue,
                Capture::Closed => {
                    debug!("frame source closed after {frames_inspected} frames");
                    return Ok(None);
                }
            };

            frames_inspected += 1;
            match self.engine.inspect(&frame, &library.snapshot(), thresholds).await {
                Ok(report) if !report.passed() => {
                    info!("scan stopped on frame {frames_inspected}: {:?}", report.primary_defect());
                    return Ok(Some(ScanHit {
                        report,
                        frame,
                        frames_inspected,
                    }));
                }
                Ok(_) => {}
                Err(err) if err.is_decode_failure() => warn!("scan error: {err}"),
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::test_support::{dark_spot_frame, png, solid};
    use std::collections::VecDeque;

    fn engine() -> ParallelDecisionEngine {
        ParallelDecisionEngine::new(EngineConfig {
            worker_count: 3,
            ..EngineConfig::default()
        })
    }

    fn mixed_library(spot: &[u8]) -> ReferenceLibrary {
        let library = ReferenceLibrary::new();
        library.register(DefectCategory::DarkSpot, "", png(&solid(256, 0)));
        library.register(DefectCategory::DarkSpot, "", spot.to_vec());
        library.register(DefectCategory::Scratch, "", b"corrupt".to_vec());
        library.register(DefectCategory::Flash, "", spot.to_vec());
        library
    }

    #[tokio::test]
    async fn agrees_with_the_sequential_engine() {
        let spot = png(&dark_spot_frame(256));
        let snapshot = mixed_library(&spot).snapshot();
        let thresholds = ThresholdConfig::default();

        let sequential = DefectDecisionEngine::default().inspect(&spot, &snapshot, &thresholds).unwrap();
        let parallel = engine().inspect(&spot, &snapshot, &thresholds).await.unwrap();

        assert_eq!(parallel, sequential);
        let categories: Vec<_> = parallel.defects.iter().map(|d| d.category).collect();
        assert_eq!(categories, [DefectCategory::DarkSpot, DefectCategory::Flash]);
    }

    #[tokio::test]
    async fn empty_library_passes() {
        let report = engine()
            .inspect(&png(&solid(64, 10)), &ReferenceSet::default(), &ThresholdConfig::default())
            .await
            .unwrap();
        assert!(report.passed());
    }

    #[tokio::test]
    async fn pool_distributes_and_survives_shutdown() {
        let pool = ComparisonPool::new(2, SampleMatcher::default());
        assert_eq!(pool.worker_count(), 2);
        let frame = Arc::new(SmartBuffer::new(solid(256, 90)));
        let good = Arc::new(ReferenceSample::register(DefectCategory::Scratch, "", png(&solid(32, 90)), 1));
        let bad = Arc::new(ReferenceSample::register(DefectCategory::Scratch, "", vec![0, 1, 2], 2));

        let results = join_all((0..6).map(|i| {
            let reference = if i % 3 == 0 { Arc::clone(&bad) } else { Arc::clone(&good) };
            pool.compare(DefectCategory::Scratch, Arc::clone(&frame), reference)
        }))
        .await;

        for (i, result) in results.into_iter().enumerate() {
            let confidence = result.unwrap();
            if i % 3 == 0 {
                assert_eq!(confidence, None);
            } else {
                assert!(confidence.unwrap() > 0.99);
            }
        }
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn scanner_stops_on_first_defect_and_skips_bad_frames() {
        let spot = png(&dark_spot_frame(256));
        let library = ReferenceLibrary::new();
        library.register(DefectCategory::DarkSpot, "", spot.clone());

        let mut frames: VecDeque<Capture> = VecDeque::from([
            Capture::Pending,
            Capture::Frame(png(&solid(256, 0))),
            Capture::Frame(b"garbage".to_vec()),
            Capture::Frame(spot.clone()),
            Capture::Frame(png(&solid(256, 255).with_rect(0, 0, 4, 4, Pixel::gray(0)))),
        ]);
        let mut source = move || frames.pop_front().unwrap_or(Capture::Closed);

        let scanner = RealtimeScanner::new(Arc::new(engine())).with_interval(Duration::from_millis(1));
        let hit = scanner
            .scan(&mut source, &library, &ThresholdConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.frames_inspected, 3);
        assert_eq!(hit.frame, spot);
        assert_eq!(hit.report.primary_defect().map(|d| d.category), Some(DefectCategory::DarkSpot));
    }

    #[tokio::test]
    async fn scanner_returns_none_when_the_source_closes() {
        let library = ReferenceLibrary::new();
        let mut remaining = 2;
        let clean = png(&solid(32, 200));
        let mut source = move || {
            if remaining == 0 {
                return Capture::Closed;
            }
            remaining -= 1;
            Capture::Frame(clean.clone())
        };
        let scanner = RealtimeScanner::new(Arc::new(engine())).with_interval(Duration::from_millis(1));
        assert_eq!(scanner.interval(), Duration::from_millis(1));
        let outcome = scanner
            .scan(&mut source, &library, &ThresholdConfig::default())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
