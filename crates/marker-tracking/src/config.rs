//! Tracking configuration

use serde::{Deserialize, Serialize};

use crate::pose::CameraConvention;
use crate::TrackingError;

/// Visibility debounce and pose smoothing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Sliding window length N (raw visibility samples)
    pub window: usize,

    /// Hits K within the window before the marker counts as visible
    pub threshold: usize,

    /// Consecutive misses before the marker counts as hidden
    pub tolerance: u32,

    /// EMA weight of the newest pose (0 < alpha <= 1)
    pub alpha: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 10,
            threshold: 4,
            tolerance: 5,
            alpha: 0.15,
        }
    }
}

impl SmoothingConfig {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.window == 0 {
            return Err(TrackingError::Config("window must be > 0".into()));
        }
        if self.threshold == 0 || self.threshold > self.window {
            return Err(TrackingError::Config(format!(
                "threshold {} must be in [1, {}]",
                self.threshold, self.window
            )));
        }
        if self.tolerance == 0 {
            return Err(TrackingError::Config("tolerance must be > 0".into()));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(TrackingError::Config(format!(
                "alpha {} must be in (0, 1]",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Pose tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Descriptor bundle base path (without .fset/.fset3/.iset extension)
    pub descriptor_path: String,

    /// Convention the detection library reports poses in
    pub convention: CameraConvention,

    /// Detection results slower than this are discarded (milliseconds)
    pub processing_budget_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            descriptor_path: "nft/MonaLisa".to_string(),
            convention: CameraConvention::Vision,
            processing_budget_ms: 16,
        }
    }
}
