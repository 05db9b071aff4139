//! Camera Capture Library for the Marker Overlay
//!
//! Provides camera acquisition behind the [`CameraDevice`] driver seam:
//! - Constraint negotiation (facing mode, resolution hint, frame-rate cap)
//! - A capture thread publishing frames through a single latest-frame slot
//! - Deterministic synthetic camera for demos and tests

pub mod frame;
pub mod source;
pub mod synthetic;

pub use frame::VideoFrame;
pub use image::GrayImage;
pub use source::FrameSource;
pub use synthetic::SyntheticCamera;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Capture cadence never exceeds display refresh
pub const MAX_FRAME_RATE_HZ: u32 = 60;

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Unsupported camera configuration: {0}")]
    Unsupported(String),
}

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointing at the scene
    #[default]
    Environment,
    /// Front camera, pointing at the user
    User,
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width / height
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Capture request. Width and height are hints; the device may deliver another size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    /// Requested facing mode
    pub facing_mode: FacingMode,
    /// Ideal capture width
    pub width: u32,
    /// Ideal capture height
    pub height: u32,
    /// Frame rate cap (clamped to [`MAX_FRAME_RATE_HZ`])
    pub max_fps: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            width: 1920,
            height: 1080,
            max_fps: MAX_FRAME_RATE_HZ,
        }
    }
}

impl CaptureConstraints {
    /// Requested resolution hint
    pub fn resolution_hint(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Effective frame rate given the device's native rate
    pub fn effective_fps(&self, device_fps: u32) -> u32 {
        device_fps
            .min(self.max_fps.max(1))
            .min(MAX_FRAME_RATE_HZ)
            .max(1)
    }
}

/// Driver seam for a physical (or simulated) camera.
///
/// Implementations are moved onto the capture thread, so they must be `Send`.
pub trait CameraDevice: Send {
    /// Acquire the device and negotiate constraints; returns the delivered resolution
    fn open(&mut self, constraints: &CaptureConstraints) -> Result<Resolution, CameraError>;

    /// Native frame rate of the opened device
    fn native_fps(&self) -> u32;

    /// Read one decoded frame. `Ok(None)` means no frame was ready.
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;

    /// Release the device. Called exactly once by [`FrameSource`].
    fn release(&mut self);
}
