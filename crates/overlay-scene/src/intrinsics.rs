//! Pinhole camera intrinsics and the matching GL projection

use camera_capture::Resolution;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::SceneError;

/// Pinhole intrinsics in pixels for an image of `width` x `height`.
///
/// Pixel origin is the top-left corner, v grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraIntrinsics {
    /// 4:3 calibration at 1280x960
    fn default() -> Self {
        Self {
            fx: 1024.0,
            fy: 1024.0,
            cx: 640.0,
            cy: 480.0,
            width: 1280,
            height: 960,
        }
    }
}

impl CameraIntrinsics {
    /// Reject degenerate calibrations
    pub fn validate(&self) -> Result<(), SceneError> {
        let finite = [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.fx <= 0.0 || self.fy <= 0.0 {
            return Err(SceneError::InvalidIntrinsics(format!(
                "focal lengths must be positive and finite (fx={}, fy={})",
                self.fx, self.fy
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::InvalidIntrinsics(format!(
                "image size {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Image size these intrinsics describe
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Intrinsics of this image shown in a `target`-sized surface.
    ///
    /// The image is scaled uniformly to cover the target and centred, so an
    /// aspect change crops rather than stretches.
    pub fn scaled_to(&self, target: Resolution) -> Self {
        let (w, h) = (self.width.max(1) as f64, self.height.max(1) as f64);
        let (tw, th) = (target.width as f64, target.height as f64);
        let s = (tw / w).max(th / h);

        Self {
            fx: self.fx * s,
            fy: self.fy * s,
            cx: tw / 2.0 + (self.cx - w / 2.0) * s,
            cy: th / 2.0 + (self.cy - h / 2.0) * s,
            width: target.width,
            height: target.height,
        }
    }

    /// OpenGL projection for a camera looking down -Z with +Y up
    pub fn projection_matrix(&self, near: f64, far: f64) -> Matrix4<f64> {
        let (w, h) = (self.width as f64, self.height as f64);
        let depth = far - near;

        #[rustfmt::skip]
        let m = Matrix4::new(
            2.0 * self.fx / w, 0.0,               1.0 - 2.0 * self.cx / w,  0.0,
            0.0,               2.0 * self.fy / h, 2.0 * self.cy / h - 1.0,  0.0,
            0.0,               0.0,               -(far + near) / depth,    -2.0 * far * near / depth,
            0.0,               0.0,               -1.0,                     0.0,
        );
        m
    }
}
