//! Marker detection seam

use std::collections::VecDeque;
use std::time::Duration;

use camera_capture::{GrayImage, VideoFrame};
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use crate::descriptor::DescriptorSet;

/// Raw detector output, in the detector's own camera convention
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Marker rotation; may be slightly non-orthonormal
    pub rotation: Matrix3<f64>,
    /// Marker origin in camera space
    pub translation: Vector3<f64>,
}

impl RawDetection {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }
}

/// Black-box natural-feature marker detector.
///
/// Any library able to locate the target described by a [`DescriptorSet`]
/// in a frame can sit behind this trait.
pub trait MarkerDetector: Send {
    /// Detector name for logging
    fn name(&self) -> &str;

    /// Locate the marker in one frame; `None` when not found.
    ///
    /// `luminance` is the frame's grayscale view, which feature matchers
    /// work on. `frame` carries the timestamp and sequence number.
    fn detect(
        &mut self,
        frame: &VideoFrame,
        luminance: &GrayImage,
        descriptors: &DescriptorSet,
    ) -> Option<RawDetection>;
}

/// Detector replaying a fixed script of results (no vision library required)
pub struct ScriptedDetector {
    script: VecDeque<Option<RawDetection>>,
    looping: bool,
    latency: Duration,
    calls: u64,
    last_input: Option<(u32, u32)>,
}

impl ScriptedDetector {
    /// Replay `script` once, then report misses
    pub fn new(script: Vec<Option<RawDetection>>) -> Self {
        Self {
            script: script.into(),
            looping: false,
            latency: Duration::ZERO,
            calls: 0,
            last_input: None,
        }
    }

    /// Script from a visibility pattern using one fixed pose for every hit
    pub fn from_visibility(pattern: &[bool], pose: RawDetection) -> Self {
        Self::new(
            pattern
                .iter()
                .map(|&hit| hit.then(|| pose.clone()))
                .collect(),
        )
    }

    /// Restart the script when it runs out
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Simulated processing time per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of detect calls so far
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Dimensions of the last luminance image handed in
    pub fn last_input(&self) -> Option<(u32, u32)> {
        self.last_input
    }
}

impl MarkerDetector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(
        &mut self,
        frame: &VideoFrame,
        luminance: &GrayImage,
        descriptors: &DescriptorSet,
    ) -> Option<RawDetection> {
        self.calls += 1;
        self.last_input = Some(luminance.dimensions());
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let next = self.script.pop_front().flatten();
        if self.looping {
            self.script.push_back(next.clone());
        }

        debug!(
            "Scripted detection #{} on frame {} ({}x{}) for '{}': {}",
            self.calls,
            frame.sequence,
            luminance.width(),
            luminance.height(),
            descriptors.name(),
            if next.is_some() { "hit" } else { "miss" }
        );
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::Resolution;

    fn frame() -> VideoFrame {
        VideoFrame::solid(Resolution::new(4, 4), [0, 0, 0], 0, 1)
    }

    fn luminance() -> GrayImage {
        frame().to_grayscale()
    }

    fn descriptors() -> DescriptorSet {
        DescriptorSet::from_parts("test", vec![1], vec![1], vec![1])
    }

    #[test]
    fn test_script_replays_then_misses() {
        let pose = RawDetection::new(Matrix3::identity(), Vector3::new(0.0, 0.0, 1.0));
        let mut detector = ScriptedDetector::from_visibility(&[true, false, true], pose);
        let (f, l, d) = (frame(), luminance(), descriptors());
        assert_eq!(detector.last_input(), None);

        assert!(detector.detect(&f, &l, &d).is_some());
        assert!(detector.detect(&f, &l, &d).is_none());
        assert!(detector.detect(&f, &l, &d).is_some());
        assert!(detector.detect(&f, &l, &d).is_none());
        assert_eq!(detector.calls(), 4);
        assert_eq!(detector.last_input(), Some((4, 4)));
    }

    #[test]
    fn test_looping_script() {
        let pose = RawDetection::new(Matrix3::identity(), Vector3::zeros());
        let mut detector = ScriptedDetector::from_visibility(&[true, false], pose).looping();
        let (f, l, d) = (frame(), luminance(), descriptors());

        let hits: Vec<bool> = (0..6).map(|_| detector.detect(&f, &l, &d).is_some()).collect();
        assert_eq!(hits, vec![true, false, true, false, true, false]);
    }
}
