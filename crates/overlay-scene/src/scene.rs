//! Scene graph handed to the renderer once per cycle

use camera_capture::Resolution;
use nalgebra::{Matrix4, Point3};
use serde::Serialize;

/// Camera fixed at the origin looking down -Z
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraNode {
    pub projection: Matrix4<f64>,
    pub viewport: Resolution,
}

/// Uniform ambient light
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
        }
    }
}

/// The video panel: a unit quad in the XY plane facing +Z
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshNode {
    pub name: String,
    /// Camera-space model matrix
    pub transform: Matrix4<f64>,
    pub visible: bool,
}

impl MeshNode {
    /// Panel centre in camera space
    pub fn centre(&self) -> Point3<f64> {
        self.transform.transform_point(&Point3::origin())
    }
}

/// One frame's worth of scene state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub frame_index: u64,
    pub camera: CameraNode,
    pub light: AmbientLight,
    pub panel: MeshNode,
}
