use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::camera::{CaptureError, Frame, FrameSize, FrameSource};
use crate::config::MonitorConfig;
use crate::spots::{
    OccupancySnapshot, OccupancyStateCache, OccupancyStatus, RegionError, SpotLayout, StatusSink,
};

use super::change::ChangeDetector;
use super::classifier::{ClassifierError, OccupancyClassifier};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid spot layout: {0}")]
    Region(#[from] RegionError),
    #[error("classifier failed on spot {spot}: {source}")]
    Classifier {
        spot: usize,
        #[source]
        source: ClassifierError,
    },
    #[error("frame source failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("frame is {actual}, spots were laid out for {expected}")]
    FrameSize {
        expected: FrameSize,
        actual: FrameSize,
    },
    #[error("sample rate must be at least 1 frame")]
    SampleRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No frame sampled yet.
    Idle,
    /// Running change detection and reclassification.
    Sampling,
    /// Handing the current statuses to the sink.
    Rendering,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub spot: usize,
    pub from: OccupancyStatus,
    pub to: OccupancyStatus,
}

/// What happened on a sampling frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleReport {
    pub frame_index: u64,
    pub flagged: BTreeSet<usize>,
    pub changes: Vec<StatusChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub sample: Option<SampleReport>,
    pub snapshot: OccupancySnapshot,
}

/// Keeps per-spot occupancy current while only reclassifying spots that
/// look changed on every Nth frame.
pub struct Monitor {
    layout: SpotLayout,
    detector: ChangeDetector,
    classifier: OccupancyClassifier,
    cache: OccupancyStateCache,
    previous: Option<Frame>,
    sample_rate: u64,
    frame_index: u64,
    state: MonitorState,
}

impl Monitor {
    pub fn new(
        layout: SpotLayout,
        classifier: OccupancyClassifier,
        config: &MonitorConfig,
    ) -> Result<Self, MonitorError> {
        if config.sample_rate == 0 {
            return Err(MonitorError::SampleRate);
        }

        let cache = OccupancyStateCache::new(layout.len());

        Ok(Self {
            layout,
            detector: ChangeDetector::new(config.z_score_threshold),
            classifier,
            cache,
            previous: None,
            sample_rate: config.sample_rate,
            frame_index: 0,
            state: MonitorState::Idle,
        })
    }

    pub fn layout(&self) -> &SpotLayout {
        &self.layout
    }

    pub fn cache(&self) -> &OccupancyStateCache {
        &self.cache
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Number of frames processed so far.
    pub fn frames_seen(&self) -> u64 {
        self.frame_index
    }

    pub fn snapshot(&self) -> OccupancySnapshot {
        OccupancySnapshot::capture(self.frame_index, &self.layout, &self.cache)
    }

    /// Advances by one frame. Every `sample_rate`-th frame, starting with the
    /// first, is a sampling frame.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameOutcome, MonitorError> {
        let expected = self.layout.frame_size();
        if frame.size() != expected {
            return Err(MonitorError::FrameSize {
                expected,
                actual: frame.size(),
            });
        }

        let frame_index = self.frame_index;
        let sample = if frame_index % self.sample_rate == 0 {
            self.state = MonitorState::Sampling;
            Some(self.sample(frame_index, frame)?)
        } else {
            None
        };

        self.state = MonitorState::Rendering;
        let snapshot = OccupancySnapshot::capture(frame_index, &self.layout, &self.cache);
        self.frame_index += 1;

        Ok(FrameOutcome { sample, snapshot })
    }

    fn sample(&mut self, frame_index: u64, frame: &Frame) -> Result<SampleReport, MonitorError> {
        let flagged =
            self.detector
                .flag_changed_spots(frame, self.previous.as_ref(), self.layout.regions());
        self.previous = Some(frame.clone());

        let mut changes = Vec::new();
        for &spot in &flagged {
            let Some(region) = self.layout.get(spot) else {
                continue;
            };

            let status = self
                .classifier
                .classify(frame.crop(region))
                .map_err(|source| MonitorError::Classifier { spot, source })?;

            if let Some(from) = self.cache.set(spot, status) {
                if from != status {
                    tracing::debug!(frame = frame_index, spot, %from, to = %status, "spot changed");
                    changes.push(StatusChange {
                        spot,
                        from,
                        to: status,
                    });
                }
            }
        }

        tracing::debug!(
            frame = frame_index,
            flagged = flagged.len(),
            changed = changes.len(),
            "sampled frame"
        );

        Ok(SampleReport {
            frame_index,
            flagged,
            changes,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub samples: u64,
    pub classifications: u64,
}

/// One monitoring run: a frame source feeding a monitor.
pub struct Session<S> {
    source: S,
    monitor: Monitor,
}

impl<S: FrameSource> Session<S> {
    pub fn new(source: S, monitor: Monitor) -> Result<Self, MonitorError> {
        let expected = monitor.layout().frame_size();
        let actual = source.frame_size();
        if actual != expected {
            return Err(MonitorError::FrameSize { expected, actual });
        }
        Ok(Self { source, monitor })
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Runs until the source is exhausted or `shutdown` is set.
    pub fn run(
        &mut self,
        sink: &mut dyn StatusSink,
        shutdown: &AtomicBool,
    ) -> Result<SessionSummary, MonitorError> {
        tracing::info!(
            spots = self.monitor.layout().len(),
            sample_rate = self.monitor.sample_rate,
            threshold = self.monitor.detector.threshold(),
            "monitoring session started"
        );

        let mut summary = SessionSummary::default();

        while !shutdown.load(Ordering::Relaxed) {
            let Some(frame) = self.source.next_frame()? else {
                tracing::info!(frames = summary.frames, "frame source exhausted");
                break;
            };

            let outcome = self.monitor.process_frame(&frame)?;
            summary.frames += 1;
            if let Some(sample) = &outcome.sample {
                summary.samples += 1;
                summary.classifications += sample.flagged.len() as u64;
            }

            sink.render(&frame, &outcome.snapshot);
        }

        tracing::info!(
            frames = summary.frames,
            samples = summary.samples,
            classifications = summary.classifications,
            "monitoring session finished"
        );

        Ok(summary)
    }
}

pub fn spawn_session<S, K>(
    mut session: Session<S>,
    mut sink: K,
    shutdown: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<Result<SessionSummary, MonitorError>>
where
    S: FrameSource + Send + 'static,
    K: StatusSink + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = session.run(&mut sink, &shutdown);
        if let Err(e) = &result {
            tracing::error!(error = %e, "monitoring session failed");
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::analytics::classifier::SpotModel;
    use crate::spots::{SpotRegion, StatusBoard};

    const SPOT: u32 = 10;

    /// Answers occupied when the crop is brighter than mid-grey.
    struct BrightnessModel;

    impl SpotModel for BrightnessModel {
        fn predict(&mut self, features: &[f32]) -> Result<i64, ClassifierError> {
            let mean = features.iter().sum::<f32>() / features.len() as f32;
            Ok(if mean > 0.5 { 1 } else { 0 })
        }
    }

    /// Replays scripted labels and counts calls.
    struct ScriptedModel {
        labels: VecDeque<i64>,
        calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl SpotModel for ScriptedModel {
        fn predict(&mut self, _features: &[f32]) -> Result<i64, ClassifierError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.labels
                .pop_front()
                .ok_or_else(|| ClassifierError::Inference("script exhausted".into()))
        }
    }

    struct VecSource {
        size: FrameSize,
        frames: VecDeque<Frame>,
    }

    impl FrameSource for VecSource {
        fn frame_size(&self) -> FrameSize {
            self.size
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            Ok(self.frames.pop_front())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        snapshots: Vec<OccupancySnapshot>,
    }

    impl StatusSink for RecordingSink {
        fn render(&mut self, _frame: &Frame, snapshot: &OccupancySnapshot) {
            self.snapshots.push(snapshot.clone());
        }
    }

    fn row_layout(count: u32) -> SpotLayout {
        let regions = (0..count).map(|i| SpotRegion::new(i * SPOT, 0, SPOT, SPOT)).collect();
        SpotLayout::new(regions, FrameSize::new(count * SPOT, SPOT)).unwrap()
    }

    fn config(sample_rate: u64, z_score_threshold: f64) -> MonitorConfig {
        MonitorConfig {
            sample_rate,
            z_score_threshold,
        }
    }

    fn scripted(labels: &[i64]) -> (OccupancyClassifier, Arc<std::sync::atomic::AtomicUsize>) {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let model = ScriptedModel {
            labels: labels.iter().copied().collect(),
            calls: Arc::clone(&calls),
        };
        (OccupancyClassifier::new(Box::new(model), 15), calls)
    }

    /// A dark lot where the `bright` spots hold a light-colored car.
    fn scene(layout: &SpotLayout, bright: &[usize]) -> Frame {
        let mut frame = Frame::uniform(layout.frame_size(), [40, 40, 40]);
        for &i in bright {
            frame.fill_region(&layout.regions()[i], [220, 220, 220]);
        }
        frame
    }

    #[test]
    fn two_spot_cold_start() {
        let layout = row_layout(2);
        let (classifier, calls) = scripted(&[0, 1]);
        let mut monitor = Monitor::new(layout.clone(), classifier, &config(1, 1.0)).unwrap();
        assert_eq!(monitor.state(), MonitorState::Idle);

        let first = Frame::uniform(layout.frame_size(), [60, 60, 60]);
        let outcome = monitor.process_frame(&first).unwrap();
        let sample = outcome.sample.unwrap();
        assert_eq!(sample.flagged, BTreeSet::from([0, 1]));
        assert_eq!(monitor.cache().get(0), OccupancyStatus::Empty);
        assert_eq!(monitor.cache().get(1), OccupancyStatus::Occupied);
        assert_eq!(outcome.snapshot.summary.to_string(), "1/2 free");
        assert_eq!(monitor.state(), MonitorState::Rendering);

        // with two spots the z-scores are always +1 and -1, so neither
        // exceeds a threshold of 1
        let mut second = first.clone();
        second.fill_region(&layout.regions()[0], [200, 200, 200]);
        let outcome = monitor.process_frame(&second).unwrap();
        assert!(outcome.sample.unwrap().flagged.is_empty());
        assert_eq!(outcome.snapshot.summary.to_string(), "1/2 free");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn only_the_changed_spot_is_reclassified() {
        let layout = row_layout(10);
        let mut labels = vec![0];
        labels.extend([1; 9]);
        labels.push(1);
        let (classifier, calls) = scripted(&labels);
        let mut monitor = Monitor::new(layout.clone(), classifier, &config(1, 2.0)).unwrap();

        let first = Frame::uniform(layout.frame_size(), [60, 60, 60]);
        let outcome = monitor.process_frame(&first).unwrap();
        assert_eq!(outcome.sample.unwrap().flagged.len(), 10);
        assert_eq!(outcome.snapshot.summary.to_string(), "1/10 free");

        let mut second = first.clone();
        second.fill_region(&layout.regions()[0], [200, 200, 200]);
        let outcome = monitor.process_frame(&second).unwrap();
        let sample = outcome.sample.unwrap();
        assert_eq!(sample.flagged, BTreeSet::from([0]));
        assert_eq!(
            sample.changes,
            vec![StatusChange {
                spot: 0,
                from: OccupancyStatus::Empty,
                to: OccupancyStatus::Occupied
            }]
        );
        assert!((0..10).all(|i| monitor.cache().get(i) == OccupancyStatus::Occupied));
        assert_eq!(outcome.snapshot.summary.to_string(), "0/10 free");
        assert_eq!(calls.load(Ordering::Relaxed), 11);
    }

    #[test]
    fn samples_only_on_every_nth_frame() {
        let layout = row_layout(3);
        let classifier = OccupancyClassifier::new(Box::new(BrightnessModel), 15);
        let mut monitor = Monitor::new(layout.clone(), classifier, &config(3, 2.0)).unwrap();
        let frame = scene(&layout, &[1]);

        let sampled: Vec<bool> = (0..7)
            .map(|_| monitor.process_frame(&frame).unwrap().sample.is_some())
            .collect();
        assert_eq!(sampled, [true, false, false, true, false, false, true]);
        assert_eq!(monitor.frames_seen(), 7);
    }

    #[test]
    fn frames_between_samples_reuse_statuses() {
        let layout = row_layout(4);
        let classifier = OccupancyClassifier::new(Box::new(BrightnessModel), 15);
        let mut monitor = Monitor::new(layout.clone(), classifier, &config(5, 1.0)).unwrap();

        monitor.process_frame(&scene(&layout, &[2])).unwrap();
        assert_eq!(monitor.cache().get(2), OccupancyStatus::Occupied);

        // a car arrives at spot 0 on a frame that is not sampled
        let outcome = monitor.process_frame(&scene(&layout, &[0, 2])).unwrap();
        assert!(outcome.sample.is_none());
        assert_eq!(outcome.snapshot.status(0), Some(OccupancyStatus::Empty));
        assert_eq!(outcome.snapshot.frame_index, 1);
    }

    #[test]
    fn unchanged_scene_classifies_nothing_after_cold_start() {
        let layout = row_layout(4);
        let (classifier, calls) = scripted(&[0, 0, 1, 0]);
        let mut monitor = Monitor::new(layout.clone(), classifier, &config(1, 0.0)).unwrap();
        let frame = scene(&layout, &[2]);

        monitor.process_frame(&frame).unwrap();
        for _ in 0..5 {
            let outcome = monitor.process_frame(&frame).unwrap();
            assert!(outcome.sample.unwrap().flagged.is_empty());
        }
        assert_eq!(calls.load(Ordering::Relaxed), 4);
        assert_eq!(monitor.snapshot().summary.free, 3);
    }

    #[test]
    fn classifier_failure_is_fatal() {
        let layout = row_layout(2);
        let (classifier, _) = scripted(&[0, 9]);
        let mut monitor = Monitor::new(layout.clone(), classifier, &config(1, 2.0)).unwrap();

        let err = monitor.process_frame(&scene(&layout, &[])).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::Classifier {
                spot: 1,
                source: ClassifierError::UnknownLabel(9)
            }
        ));
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let layout = row_layout(2);
        let classifier = OccupancyClassifier::new(Box::new(BrightnessModel), 15);
        let mut monitor = Monitor::new(layout, classifier, &config(1, 2.0)).unwrap();

        let frame = Frame::uniform(FrameSize::new(5, 5), [0, 0, 0]);
        assert!(matches!(
            monitor.process_frame(&frame),
            Err(MonitorError::FrameSize { .. })
        ));
        assert_eq!(monitor.frames_seen(), 0);
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let classifier = OccupancyClassifier::new(Box::new(BrightnessModel), 15);
        assert!(matches!(
            Monitor::new(row_layout(1), classifier, &config(0, 2.0)),
            Err(MonitorError::SampleRate)
        ));
    }

    #[test]
    fn session_runs_until_source_is_exhausted() {
        let layout = row_layout(3);
        let classifier = OccupancyClassifier::new(Box::new(BrightnessModel), 15);
        let monitor = Monitor::new(layout.clone(), classifier, &config(2, 1.0)).unwrap();

        let frames: VecDeque<Frame> = [
            scene(&layout, &[]),
            scene(&layout, &[]),
            scene(&layout, &[1]),
            scene(&layout, &[1]),
            scene(&layout, &[1]),
        ]
        .into_iter()
        .collect();
        let source = VecSource {
            size: layout.frame_size(),
            frames,
        };

        let mut session = Session::new(source, monitor).unwrap();
        let mut sink = RecordingSink::default();
        let summary = session.run(&mut sink, &AtomicBool::new(false)).unwrap();

        assert_eq!(
            summary,
            SessionSummary {
                frames: 5,
                samples: 3,
                classifications: 4,
            }
        );
        assert_eq!(sink.snapshots.len(), 5);
        assert_eq!(sink.snapshots[0].summary.free, 3);
        assert_eq!(sink.snapshots[2].status(1), Some(OccupancyStatus::Occupied));
        assert_eq!(sink.snapshots[4].summary.to_string(), "2/3 free");
    }

    #[test]
    fn session_stops_on_shutdown() {
        let layout = row_layout(1);
        let classifier = OccupancyClassifier::new(Box::new(BrightnessModel), 15);
        let monitor = Monitor::new(layout.clone(), classifier, &config(1, 2.0)).unwrap();
        let source = VecSource {
            size: layout.frame_size(),
            frames: VecDeque::from(vec![scene(&layout, &[]); 3]),
        };

        let mut session = Session::new(source, monitor).unwrap();
        let summary = session
            .run(&mut StatusBoard::new(), &AtomicBool::new(true))
            .unwrap();
        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn session_rejects_mismatched_source() {
        let layout = row_layout(2);
        let classifier = OccupancyClassifier::new(Box::new(BrightnessModel), 15);
        let monitor = Monitor::new(layout, classifier, &config(1, 2.0)).unwrap();
        let source = VecSource {
            size: FrameSize::new(640, 480),
            frames: VecDeque::new(),
        };
        assert!(matches!(
            Session::new(source, monitor),
            Err(MonitorError::FrameSize { .. })
        ));
    }

    #[tokio::test]
    async fn spawned_session_publishes_to_board() {
        let layout = row_layout(2);
        let classifier = OccupancyClassifier::new(Box::new(BrightnessModel), 15);
        let monitor = Monitor::new(layout.clone(), classifier, &config(1, 2.0)).unwrap();
        let source = VecSource {
            size: layout.frame_size(),
            frames: VecDeque::from([scene(&layout, &[0])]),
        };

        let board = StatusBoard::new();
        let session = Session::new(source, monitor).unwrap();
        let handle = spawn_session(session, board.clone(), Arc::new(AtomicBool::new(false)));

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.frames, 1);
        let latest = board.latest().unwrap();
        assert_eq!(latest.status(0), Some(OccupancyStatus::Occupied));
        assert_eq!(latest.status(1), Some(OccupancyStatus::Empty));
    }
}
