//! Pose tracker: wraps a detector and produces one `PoseSample` per frame

use std::sync::Arc;
use std::time::{Duration, Instant};

use camera_capture::VideoFrame;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::descriptor::DescriptorSet;
use crate::detector::{MarkerDetector, RawDetection};
use crate::pose::{CameraConvention, PoseSample};
use crate::TrackingError;

/// Per-frame marker pose tracker
pub struct PoseTracker {
    detector: Box<dyn MarkerDetector>,
    descriptors: Arc<DescriptorSet>,
    convention: CameraConvention,
    budget: Duration,
    last_pose: PoseSample,
    hits: u64,
    misses: u64,
    timeouts: u64,
}

impl PoseTracker {
    /// Create a tracker over an already loaded descriptor set
    pub fn new(
        detector: Box<dyn MarkerDetector>,
        descriptors: Arc<DescriptorSet>,
        config: &TrackerConfig,
    ) -> Self {
        info!(
            "Pose tracker using '{}' detector for target '{}' ({} bytes), budget {}ms",
            detector.name(),
            descriptors.name(),
            descriptors.size_bytes(),
            config.processing_budget_ms
        );
        Self {
            detector,
            descriptors,
            convention: config.convention,
            budget: Duration::from_millis(config.processing_budget_ms),
            last_pose: PoseSample::identity(0),
            hits: 0,
            misses: 0,
            timeouts: 0,
        }
    }

    /// Run detection on one frame.
    ///
    /// A miss returns `raw_visible = false` with the previous pose carried
    /// forward. A result that arrives after the processing budget is
    /// discarded and reported as [`TrackingError::DetectionTimeout`].
    /// The budget covers the detector call, not the luminance conversion.
    pub fn detect(&mut self, frame: &VideoFrame) -> Result<PoseSample, TrackingError> {
        let luminance = frame.to_grayscale();
        let started = Instant::now();
        let raw = self.detector.detect(frame, &luminance, &self.descriptors);
        let elapsed = started.elapsed();

        if elapsed > self.budget {
            self.timeouts += 1;
            debug!(
                "Detection on frame {} took {:?} (budget {:?}), discarding",
                frame.sequence, elapsed, self.budget
            );
            return Err(TrackingError::DetectionTimeout {
                elapsed_ms: elapsed.as_millis() as u64,
                budget_ms: self.budget.as_millis() as u64,
            });
        }

        let timestamp_ns = frame.timestamp_ns;
        let sample = match raw.and_then(|r| self.reconcile(&r, timestamp_ns)) {
            Some(pose) => {
                self.hits += 1;
                pose
            }
            None => {
                self.misses += 1;
                PoseSample::missed(&self.last_pose, timestamp_ns)
            }
        };

        self.last_pose = sample.clone();
        Ok(sample)
    }

    /// Convert a raw detection into the GL camera frame
    fn reconcile(&self, raw: &RawDetection, timestamp_ns: u64) -> Option<PoseSample> {
        let basis = self.convention.to_gl();
        let sample = PoseSample::from_raw(
            &(basis * raw.rotation),
            &(basis * raw.translation),
            timestamp_ns,
        );
        if sample.is_none() {
            warn!("Detector returned a non-finite pose, treating as miss");
        }
        sample
    }

    /// Most recent pose (visible or carried forward)
    pub fn last_pose(&self) -> &PoseSample {
        &self.last_pose
    }

    /// Target descriptor set
    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }

    /// (hits, misses, timeouts) since creation
    pub fn stats(&self) -> (u64, u64, u64) {
        (self.hits, self.misses, self.timeouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ScriptedDetector;
    use approx::assert_relative_eq;
    use camera_capture::{GrayImage, Resolution};
    use nalgebra::{Matrix3, Rotation3, Vector3};

    fn frame(sequence: u32) -> VideoFrame {
        VideoFrame::solid(Resolution::new(4, 4), [0, 0, 0], sequence as u64 * 1_000, sequence)
    }

    fn tracker(detector: ScriptedDetector, config: TrackerConfig) -> PoseTracker {
        let descriptors = Arc::new(DescriptorSet::from_parts("test", vec![1], vec![1], vec![1]));
        PoseTracker::new(Box::new(detector), descriptors, &config)
    }

    fn gl_config() -> TrackerConfig {
        TrackerConfig {
            convention: CameraConvention::Gl,
            processing_budget_ms: 1_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_hit_then_miss_carries_pose() {
        let pose = RawDetection::new(Matrix3::identity(), Vector3::new(5.0, 0.0, -400.0));
        let mut tracker = tracker(ScriptedDetector::from_visibility(&[true, false], pose), gl_config());

        let hit = tracker.detect(&frame(1)).unwrap();
        assert!(hit.raw_visible);
        assert_eq!(hit.translation, Vector3::new(5.0, 0.0, -400.0));

        let miss = tracker.detect(&frame(2)).unwrap();
        assert!(!miss.raw_visible);
        assert_eq!(miss.translation, hit.translation);
        assert_eq!(miss.rotation, hit.rotation);
        assert_eq!(miss.timestamp_ns, 2_000);
        assert_eq!(tracker.stats(), (1, 1, 0));
    }

    /// Hits only on bright frames, so results depend on the luminance input
    struct BrightTargetDetector;

    impl MarkerDetector for BrightTargetDetector {
        fn name(&self) -> &str {
            "bright-target"
        }

        fn detect(
            &mut self,
            frame: &VideoFrame,
            luminance: &GrayImage,
            _descriptors: &DescriptorSet,
        ) -> Option<RawDetection> {
            assert_eq!(luminance.dimensions(), (frame.width, frame.height));
            let total: u64 = luminance.pixels().map(|p| p.0[0] as u64).sum();
            let mean = total / (frame.width as u64 * frame.height as u64);
            (mean > 128).then(|| RawDetection::new(Matrix3::identity(), Vector3::new(0.0, 0.0, -200.0)))
        }
    }

    #[test]
    fn test_detector_sees_frame_luminance() {
        let descriptors = Arc::new(DescriptorSet::from_parts("test", vec![1], vec![1], vec![1]));
        let mut tracker = PoseTracker::new(Box::new(BrightTargetDetector), descriptors, &gl_config());

        let bright = VideoFrame::solid(Resolution::new(8, 6), [240, 240, 240], 1_000, 1);
        let dark = VideoFrame::solid(Resolution::new(8, 6), [10, 10, 10], 2_000, 2);

        assert!(tracker.detect(&bright).unwrap().raw_visible);
        assert!(!tracker.detect(&dark).unwrap().raw_visible);
        assert_eq!(tracker.stats(), (1, 1, 0));
    }

    #[test]
    fn test_vision_convention_converted_to_gl() {
        let pose = RawDetection::new(Matrix3::identity(), Vector3::new(1.0, 2.0, 300.0));
        let config = TrackerConfig {
            convention: CameraConvention::Vision,
            processing_budget_ms: 1_000,
            ..Default::default()
        };
        let mut tracker = tracker(ScriptedDetector::from_visibility(&[true], pose), config);

        let sample = tracker.detect(&frame(1)).unwrap();
        assert_eq!(sample.translation, Vector3::new(1.0, -2.0, -300.0));
        assert_relative_eq!(sample.rotation.matrix().determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_near_singular_rotation_reorthonormalized() {
        let mut m = *Rotation3::from_euler_angles(0.2, 0.1, -0.3).matrix();
        m[(0, 1)] += 0.02;
        let pose = RawDetection::new(m, Vector3::new(0.0, 0.0, -1.0));
        let mut tracker = tracker(ScriptedDetector::from_visibility(&[true], pose), gl_config());

        let sample = tracker.detect(&frame(1)).unwrap();
        assert!(crate::pose::is_proper_rotation(sample.rotation.matrix(), 1e-9));
    }

    #[test]
    fn test_non_finite_pose_is_miss() {
        let pose = RawDetection::new(Matrix3::identity(), Vector3::new(f64::NAN, 0.0, 0.0));
        let mut tracker = tracker(ScriptedDetector::from_visibility(&[true], pose), gl_config());

        let sample = tracker.detect(&frame(1)).unwrap();
        assert!(!sample.raw_visible);
        assert_eq!(sample.translation, Vector3::zeros());
    }

    #[test]
    fn test_slow_detection_discarded() {
        let pose = RawDetection::new(Matrix3::identity(), Vector3::new(0.0, 0.0, -10.0));
        let detector = ScriptedDetector::from_visibility(&[true], pose)
            .with_latency(Duration::from_millis(30));
        let config = TrackerConfig {
            convention: CameraConvention::Gl,
            processing_budget_ms: 5,
            ..Default::default()
        };
        let mut tracker = tracker(detector, config);

        let result = tracker.detect(&frame(1));
        assert!(matches!(result, Err(TrackingError::DetectionTimeout { budget_ms: 5, .. })));
        // Stale result never reaches the last pose
        assert!(!tracker.last_pose().raw_visible);
        assert_eq!(tracker.stats(), (0, 0, 1));
    }
}
