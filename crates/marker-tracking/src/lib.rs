//! Marker Tracking
//!
//! Natural-feature-tracking (NFT) marker pipeline stages:
//! - Descriptor bundle loading for the target image
//! - Pose tracking behind a black-box [`MarkerDetector`]
//! - Camera-convention reconciliation into the GL camera frame
//! - Visibility debouncing and pose smoothing

pub mod config;
pub mod descriptor;
pub mod detector;
pub mod pose;
pub mod smoother;
pub mod state;
pub mod tracker;

pub use config::{SmoothingConfig, TrackerConfig};
pub use descriptor::{DescriptorLoadError, DescriptorSet};
pub use detector::{MarkerDetector, RawDetection, ScriptedDetector};
pub use pose::{CameraConvention, PoseSample};
pub use smoother::VisibilitySmoother;
pub use state::{SmoothedState, VisibilityTransition};
pub use tracker::PoseTracker;

use thiserror::Error;

/// Tracking error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// Detection finished after the frame budget; the result was discarded
    #[error("Detection took {elapsed_ms}ms, over the {budget_ms}ms budget")]
    DetectionTimeout { elapsed_ms: u64, budget_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),
}
