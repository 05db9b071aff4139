//! Pipeline driver: startup, the per-cycle loop and ordered teardown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use audio_cue::{AudioSink, PlaybackController, PlaybackState, PlaybackStatus};
use camera_capture::{CameraDevice, FrameSource, Resolution, VideoFrame};
use marker_tracking::{
    DescriptorSet, MarkerDetector, PoseTracker, SmoothedState, TrackingError,
    VisibilitySmoother, VisibilityTransition,
};
use overlay_scene::{Renderer, SceneCompositor};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::PipelineError;

const FRAMES_PROCESSED: &str = "overlay_frames_processed_total";
const DETECTION_TIMEOUTS: &str = "overlay_detection_timeouts_total";
const VISIBILITY_TRANSITIONS: &str = "overlay_visibility_transitions_total";
const PLAYBACK_ERRORS: &str = "overlay_playback_errors_total";
const MARKER_VISIBLE: &str = "overlay_marker_visible";

fn describe_metrics() {
    metrics::describe_counter!(FRAMES_PROCESSED, "Camera frames run through detection");
    metrics::describe_counter!(DETECTION_TIMEOUTS, "Detections discarded for exceeding the budget");
    metrics::describe_counter!(VISIBILITY_TRANSITIONS, "Smoothed visibility flips");
    metrics::describe_counter!(PLAYBACK_ERRORS, "Audio cue start failures");
    metrics::describe_gauge!(MARKER_VISIBLE, "1 while the marker is considered visible");
}

/// External collaborators, each behind its trait seam
pub struct Collaborators {
    pub camera: Box<dyn CameraDevice>,
    pub detector: Box<dyn MarkerDetector>,
    pub renderer: Box<dyn Renderer>,
    pub audio: Box<dyn AudioSink>,
}

/// Shared cancellation flag for [`Pipeline::run`]
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// A new frame went through detection and smoothing
    pub frame_processed: bool,
    /// Detection overran its budget; the previous state was rendered
    pub detection_timed_out: bool,
    /// Smoothed visibility after this cycle
    pub visible: bool,
    pub transition: VisibilityTransition,
    pub playback: PlaybackState,
    /// Time in the current visibility state, up to the newest frame seen
    pub stable_for_ns: u64,
    /// Share of the visibility window holding samples
    pub window_fill: f64,
}

/// Totals over the pipeline's lifetime
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub frames_processed: u64,
    pub detection_timeouts: u64,
    pub visibility_transitions: u64,
    pub render_errors: u64,
    pub draw_calls: u64,
    pub projection_rebuilds: u64,
    pub marker_visible: bool,
    pub playback: PlaybackStatus,
}

/// Owns every pipeline stage for the lifetime of a session
pub struct Pipeline {
    config: PipelineConfig,
    source: FrameSource,
    tracker: PoseTracker,
    smoother: VisibilitySmoother,
    compositor: SceneCompositor,
    controller: PlaybackController,

    camera_resolution: Resolution,
    last_frame_ns: u64,
    cycles: u64,
    frames_processed: u64,
    detection_timeouts: u64,
    visibility_transitions: u64,
    render_errors: u64,
    shut_down: bool,
}

impl Pipeline {
    /// Build every stage. Descriptor and camera failures are fatal.
    pub fn start(
        collaborators: Collaborators,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        describe_metrics();

        let descriptors =
            DescriptorSet::load(&config.descriptors.descriptor_path).map_err(|e| {
                error!("Marker descriptors unavailable: {}", e);
                e
            })?;
        let smoother = VisibilitySmoother::new(config.smoothing.clone())?;

        let source = FrameSource::open(collaborators.camera, config.camera.clone())?;
        let camera_resolution = source.resolution();

        let tracker = PoseTracker::new(
            collaborators.detector,
            Arc::new(descriptors),
            &config.descriptors,
        );
        let compositor = SceneCompositor::new(
            collaborators.renderer,
            config.projection.calibration,
            camera_resolution,
            config.display.viewport(),
            config.panel.clone(),
            config.projection.clip,
        )?;
        let controller = PlaybackController::new(collaborators.audio);

        metrics::gauge!(MARKER_VISIBLE).set(0.0);
        info!(
            "Pipeline started: camera {} @ {} fps, refresh {} Hz",
            camera_resolution,
            source.fps(),
            config.display.refresh_rate_hz
        );

        Ok(Self {
            config,
            source,
            tracker,
            smoother,
            compositor,
            controller,
            camera_resolution,
            last_frame_ns: 0,
            cycles: 0,
            frames_processed: 0,
            detection_timeouts: 0,
            visibility_transitions: 0,
            render_errors: 0,
            shut_down: false,
        })
    }

    /// Run one refresh cycle on whatever frame is newest. Never blocks on
    /// the camera.
    ///
    /// If the camera failed since the last cycle the pipeline shuts down
    /// and the camera error is returned.
    pub fn run_cycle(&mut self) -> Result<CycleReport, PipelineError> {
        if self.shut_down {
            return Err(PipelineError::ShutDown);
        }
        self.check_camera()?;
        let frame = self.source.latest();
        Ok(self.cycle(frame.as_deref()))
    }

    /// Wait for the next camera frame, then run one cycle on it
    pub async fn run_cycle_on_next_frame(&mut self) -> Result<CycleReport, PipelineError> {
        if self.shut_down {
            return Err(PipelineError::ShutDown);
        }
        self.check_camera()?;
        let frame = self.source.next_frame().await;
        if frame.is_none() {
            // The stream only ends early when the device failed
            self.check_camera()?;
        }
        Ok(self.cycle(frame.as_deref()))
    }

    /// Tear everything down once the camera has stopped for good
    fn check_camera(&mut self) -> Result<(), PipelineError> {
        match self.source.failure() {
            Some(e) => {
                error!("Camera lost after {} cycles: {}", self.cycles, e);
                self.shutdown();
                Err(PipelineError::Camera(e))
            }
            None => Ok(()),
        }
    }

    fn cycle(&mut self, frame: Option<&VideoFrame>) -> CycleReport {
        self.cycles += 1;
        let mut report = CycleReport::default();

        if let Some(frame) = frame {
            self.last_frame_ns = frame.timestamp_ns;
            let resolution = frame.resolution();
            if resolution != self.camera_resolution {
                info!("Camera resolution changed {} -> {}", self.camera_resolution, resolution);
                self.camera_resolution = resolution;
                self.compositor.update_intrinsics(resolution);
            }

            match self.tracker.detect(frame) {
                Ok(sample) => {
                    self.frames_processed += 1;
                    metrics::counter!(FRAMES_PROCESSED).increment(1);
                    report.frame_processed = true;
                    report.transition = self.smoother.update(&sample);
                }
                Err(TrackingError::DetectionTimeout {
                    elapsed_ms,
                    budget_ms,
                }) => {
                    self.detection_timeouts += 1;
                    metrics::counter!(DETECTION_TIMEOUTS).increment(1);
                    debug!(
                        "Frame {} skipped: detection {}ms over {}ms budget",
                        frame.sequence, elapsed_ms, budget_ms
                    );
                    report.detection_timed_out = true;
                }
                Err(e) => warn!("Frame {} skipped: {}", frame.sequence, e),
            }
        }

        if report.transition.is_edge() {
            self.on_visibility_edge(report.transition);
        }
        self.controller.poll_end();

        if let Err(e) = self.compositor.render(self.smoother.state()) {
            self.render_errors += 1;
            warn!("Render failed on cycle {}: {}", self.cycles, e);
        }

        let state = self.smoother.state();
        report.visible = state.visible;
        report.stable_for_ns = state.stable_for_ns(self.last_frame_ns);
        report.window_fill = self.smoother.window_fill();
        report.playback = self.controller.state();
        report
    }

    fn on_visibility_edge(&mut self, transition: VisibilityTransition) {
        self.visibility_transitions += 1;
        let visible = transition == VisibilityTransition::BecameVisible;
        metrics::counter!(
            VISIBILITY_TRANSITIONS,
            "to" => if visible { "visible" } else { "hidden" }
        )
        .increment(1);
        metrics::gauge!(MARKER_VISIBLE).set(if visible { 1.0 } else { 0.0 });
        info!("Marker {}", if visible { "found" } else { "lost" });

        if let Err(e) = self.controller.on_transition(transition) {
            metrics::counter!(PLAYBACK_ERRORS).increment(1);
            warn!("Audio cue unavailable: {}", e);
        }
    }

    /// Cycle at the display refresh rate until cancelled or `max_cycles`
    pub async fn run(&mut self, cancel: CancelToken) -> Result<RunSummary, PipelineError> {
        let max_cycles = self.config.run.max_cycles;
        let mut ticker = tokio::time::interval(self.config.display.cycle_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Running at {} Hz{}",
            self.config.display.refresh_rate_hz,
            if max_cycles > 0 {
                format!(" for {} cycles", max_cycles)
            } else {
                String::new()
            }
        );

        let mut ran = 0u64;
        while !cancel.is_cancelled() {
            ticker.tick().await;
            if cancel.is_cancelled() {
                break;
            }
            self.run_cycle()?;
            ran += 1;
            if max_cycles > 0 && ran >= max_cycles {
                break;
            }
        }

        info!("Run loop finished after {} cycles", ran);
        Ok(self.summary())
    }

    /// Queue a viewport resize; applied before the next draw
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.compositor.request_resize(Resolution::new(width, height));
    }

    /// Manually start the audio cue (marker must be visible)
    pub fn request_play(&mut self) -> bool {
        match self.controller.request_play() {
            Ok(started) => started,
            Err(e) => {
                metrics::counter!(PLAYBACK_ERRORS).increment(1);
                warn!("Audio cue unavailable: {}", e);
                false
            }
        }
    }

    /// Manually stop and rewind the audio cue
    pub fn request_stop(&mut self) -> bool {
        self.controller.request_stop()
    }

    pub fn state(&self) -> &SmoothedState {
        self.smoother.state()
    }

    pub fn playback(&self) -> PlaybackStatus {
        self.controller.status()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            cycles: self.cycles,
            frames_processed: self.frames_processed,
            detection_timeouts: self.detection_timeouts,
            visibility_transitions: self.visibility_transitions,
            render_errors: self.render_errors,
            draw_calls: self.compositor.draw_calls(),
            projection_rebuilds: self.compositor.projection_rebuilds(),
            marker_visible: self.smoother.state().visible,
            playback: self.controller.status(),
        }
    }

    /// Stop cycling, close the camera, stop audio, release the GPU.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.source.close();
        self.controller.shutdown();
        self.compositor.release();
        metrics::gauge!(MARKER_VISIBLE).set(0.0);

        let (hits, misses, timeouts) = self.tracker.stats();
        info!(
            "Pipeline shut down after {} cycles ({} hits, {} misses, {} timeouts)",
            self.cycles, hits, misses, timeouts
        );
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
