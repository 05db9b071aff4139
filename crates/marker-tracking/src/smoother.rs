//! Visibility debouncing and pose smoothing

use nalgebra::{Rotation3, Vector3};
use ring_buffer::RingBuffer;
use tracing::{debug, info};

use crate::config::SmoothingConfig;
use crate::pose::{blend_rotation, blend_translation, PoseSample};
use crate::state::{SmoothedState, VisibilityTransition};
use crate::TrackingError;

/// Turns noisy per-frame detections into a stable visibility flag and a
/// low-pass-filtered pose.
///
/// - rises once `threshold` of the last `window` raw samples are hits
/// - falls after `tolerance` consecutive misses, clearing the window
/// - pose: EMA on translation, slerp on rotation; frozen during misses
pub struct VisibilitySmoother {
    config: SmoothingConfig,
    window: RingBuffer<bool>,
    consecutive_misses: u32,
    /// Running pose average; `None` until seeded by a hit
    average: Option<(Rotation3<f64>, Vector3<f64>)>,
    state: SmoothedState,
}

impl VisibilitySmoother {
    /// Create a smoother after validating its configuration
    pub fn new(config: SmoothingConfig) -> Result<Self, TrackingError> {
        config.validate()?;
        let window = RingBuffer::new(config.window)
            .map_err(|e| TrackingError::Config(e.to_string()))?;

        info!(
            "Visibility smoother: window={}, threshold={}, tolerance={}, alpha={}",
            config.window, config.threshold, config.tolerance, config.alpha
        );

        Ok(Self {
            config,
            window,
            consecutive_misses: 0,
            average: None,
            state: SmoothedState::default(),
        })
    }

    /// Feed one tracker sample
    pub fn update(&mut self, sample: &PoseSample) -> VisibilityTransition {
        self.window.push(sample.raw_visible);

        if sample.raw_visible {
            self.consecutive_misses = 0;
            self.blend(sample);
        } else {
            self.consecutive_misses = self.consecutive_misses.saturating_add(1);
        }

        if let Some((rotation, translation)) = &self.average {
            self.state.pose.rotation = *rotation;
            self.state.pose.translation = *translation;
        }
        self.state.pose.raw_visible = sample.raw_visible;
        self.state.pose.timestamp_ns = sample.timestamp_ns;

        let transition = if !self.state.visible {
            if self.hits_in_window() >= self.config.threshold {
                self.state.visible = true;
                VisibilityTransition::BecameVisible
            } else {
                VisibilityTransition::Unchanged
            }
        } else if self.consecutive_misses >= self.config.tolerance {
            self.state.visible = false;
            // Re-acquisition needs a fresh run of hits
            self.window.clear();
            VisibilityTransition::BecameHidden
        } else {
            VisibilityTransition::Unchanged
        };

        if transition.is_edge() {
            self.state.stable_since_ns = sample.timestamp_ns;
            debug!(
                "Marker {:?} at {}ns ({} hits in window)",
                transition,
                sample.timestamp_ns,
                self.hits_in_window()
            );
        }

        transition
    }

    fn blend(&mut self, sample: &PoseSample) {
        let alpha = self.config.alpha;
        self.average = Some(match self.average.take() {
            // Reappearing after a hide snaps to the new pose
            Some((rotation, translation)) if self.state.visible || self.hits_in_window() > 1 => (
                blend_rotation(&rotation, &sample.rotation, alpha),
                blend_translation(&translation, &sample.translation, alpha),
            ),
            _ => (sample.rotation, sample.translation),
        });
    }

    fn hits_in_window(&self) -> usize {
        self.window.count_where(|hit| *hit)
    }

    /// Current authoritative state
    pub fn state(&self) -> &SmoothedState {
        &self.state
    }

    /// Share of the visibility window holding samples (0.0 to 1.0).
    /// Drops to zero when the marker is lost.
    pub fn window_fill(&self) -> f64 {
        self.window.fill_ratio()
    }

    /// Smoothing parameters in use
    pub fn config(&self) -> &SmoothingConfig {
        &self.config
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.window.clear();
        self.consecutive_misses = 0;
        self.average = None;
        self.state = SmoothedState::default();
    }
}
