//! AR Overlay Pipeline
//!
//! Drives one display cycle at a time: take the newest camera frame, track
//! the marker, smooth visibility and pose, react to visibility edges with
//! the audio cue and draw the overlay panel.

pub mod config;
pub mod driver;
pub mod simulation;

pub use crate::config::{
    AudioConfig, DemoConfig, DisplayConfig, LoggingConfig, PipelineConfig, ProjectionConfig,
    RunConfig,
};
pub use driver::{CancelToken, Collaborators, CycleReport, Pipeline, RunSummary};
pub use simulation::demo_collaborators;

use camera_capture::CameraError;
use marker_tracking::{DescriptorLoadError, TrackingError};
use overlay_scene::SceneError;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Fatal pipeline errors. Per-frame failures are absorbed and logged.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Descriptor load failed: {0}")]
    Descriptors(#[from] DescriptorLoadError),

    #[error("Tracking setup failed: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Scene setup failed: {0}")]
    Scene(#[from] SceneError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Pipeline has been shut down")]
    ShutDown,
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), PipelineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| PipelineError::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| PipelineError::Logging(e.to_string()))
}
