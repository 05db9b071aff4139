//! Pipeline configuration: defaults, optional TOML file, environment overrides

use std::time::Duration;

use camera_capture::{CaptureConstraints, Resolution};
use ::config::{Config, Environment, File};
use marker_tracking::{SmoothingConfig, TrackerConfig};
use overlay_scene::{CameraIntrinsics, ClipPlanes, PanelAnchor};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::PipelineError;

/// Environment variable prefix, e.g. `AR_OVERLAY__DISPLAY__REFRESH_RATE_HZ`
pub const ENV_PREFIX: &str = "AR_OVERLAY";

/// Full pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub camera: CaptureConstraints,
    pub descriptors: TrackerConfig,
    pub smoothing: SmoothingConfig,
    pub panel: PanelAnchor,
    pub projection: ProjectionConfig,
    pub display: DisplayConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
    pub run: RunConfig,
    pub demo: DemoConfig,
}

/// Camera calibration and clip planes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub calibration: CameraIntrinsics,
    pub clip: ClipPlanes,
}

/// Display cadence and surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Pipeline cycles per second
    pub refresh_rate_hz: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: 60,
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

impl DisplayConfig {
    pub fn viewport(&self) -> Resolution {
        Resolution::new(self.viewport_width, self.viewport_height)
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_rate_hz.max(1) as f64)
    }
}

/// Audio cue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Track length of the silent demo sink (seconds)
    pub track_length_secs: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            track_length_secs: 30.0,
        }
    }
}

impl AudioConfig {
    pub fn track_length(&self) -> Duration {
        Duration::from_secs_f64(self.track_length_secs.max(0.0))
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Run limits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many cycles; 0 runs until cancelled
    pub max_cycles: u64,
}

/// Simulated marker for the demo binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Frames without the marker at the start of each loop
    pub hidden_frames: usize,
    /// Frames with the marker in view
    pub visible_frames: usize,
    /// Every n-th visible frame is a detection dropout (0 disables)
    pub dropout_every: usize,
    /// Marker distance from the camera (marker units)
    pub marker_distance: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            hidden_frames: 30,
            visible_frames: 240,
            dropout_every: 7,
            marker_distance: 600.0,
        }
    }
}

impl PipelineConfig {
    /// Load defaults, then the optional file, then `AR_OVERLAY__*` variables
    pub fn load(path: Option<&str>) -> Result<Self, PipelineError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from {}", path);
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks not expressible in serde
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.smoothing
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        self.projection
            .calibration
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        self.projection
            .clip
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        if self.display.refresh_rate_hz == 0 {
            return Err(PipelineError::InvalidConfig(
                "display.refresh_rate_hz must be positive".into(),
            ));
        }
        if self.display.viewport_width == 0 || self.display.viewport_height == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "display viewport {} is empty",
                self.display.viewport()
            )));
        }
        if self.camera.width == 0 || self.camera.height == 0 || self.camera.max_fps == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "camera request {}x{} @ {} fps",
                self.camera.width, self.camera.height, self.camera.max_fps
            )));
        }
        if !self.audio.track_length_secs.is_finite() || self.audio.track_length_secs <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "audio.track_length_secs must be positive".into(),
            ));
        }
        if self.descriptors.descriptor_path.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "descriptors.descriptor_path is empty".into(),
            ));
        }
        Ok(())
    }
}
