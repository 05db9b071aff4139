//! Per-cycle scene composition

use camera_capture::Resolution;
use marker_tracking::SmoothedState;
use nalgebra::{Matrix4, Rotation3, Translation3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anchor::PanelAnchor;
use crate::intrinsics::CameraIntrinsics;
use crate::scene::{AmbientLight, CameraNode, MeshNode, Scene};
use crate::{RenderError, SceneError};

const PANEL_NAME: &str = "video-panel";

/// Below this the viewer direction is treated as degenerate
const MIN_VIEW_DISTANCE: f64 = 1e-9;

/// GPU-facing seam; implementations own the surface and the draw call
pub trait Renderer: Send {
    /// Resize the drawing surface
    fn resize_surface(&mut self, viewport: Resolution) -> Result<(), RenderError>;

    /// Install a new camera projection
    fn set_projection(&mut self, projection: &Matrix4<f64>);

    /// Draw one scene
    fn draw(&mut self, scene: &Scene) -> Result<(), RenderError>;

    /// Free GPU resources; called at most once
    fn release(&mut self);
}

/// Near and far planes in marker units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipPlanes {
    pub near: f64,
    pub far: f64,
}

impl Default for ClipPlanes {
    fn default() -> Self {
        Self {
            near: 10.0,
            far: 10_000.0,
        }
    }
}

impl ClipPlanes {
    pub fn validate(&self) -> Result<(), SceneError> {
        if !(self.near > 0.0 && self.far > self.near && self.far.is_finite()) {
            return Err(SceneError::InvalidClipPlanes {
                near: self.near,
                far: self.far,
            });
        }
        Ok(())
    }
}

/// Builds the scene from the smoothed tracking state and drives the renderer.
///
/// Intrinsics describe the camera image as shown on the viewport. Camera
/// resolution and viewport changes are queued and applied at the start of
/// the next [`render`](SceneCompositor::render).
pub struct SceneCompositor {
    renderer: Box<dyn Renderer>,
    calibration: CameraIntrinsics,
    anchor: PanelAnchor,
    clip: ClipPlanes,

    camera_resolution: Resolution,
    viewport: Resolution,
    intrinsics: CameraIntrinsics,
    projection: Matrix4<f64>,

    pending_camera: Option<Resolution>,
    pending_viewport: Option<Resolution>,
    projection_dirty: bool,
    surface_dirty: bool,

    frame_index: u64,
    projection_rebuilds: u64,
    draw_calls: u64,
    released: bool,
}

impl SceneCompositor {
    /// Create a compositor. Nothing reaches the renderer until the first
    /// render call.
    pub fn new(
        renderer: Box<dyn Renderer>,
        calibration: CameraIntrinsics,
        camera_resolution: Resolution,
        viewport: Resolution,
        anchor: PanelAnchor,
        clip: ClipPlanes,
    ) -> Result<Self, SceneError> {
        calibration.validate()?;
        clip.validate()?;

        let intrinsics = Self::derive_intrinsics(&calibration, camera_resolution, viewport);
        info!(
            "Scene compositor: camera {}, viewport {}, fx={:.1} fy={:.1}",
            camera_resolution, viewport, intrinsics.fx, intrinsics.fy
        );

        Ok(Self {
            renderer,
            projection: intrinsics.projection_matrix(clip.near, clip.far),
            calibration,
            anchor,
            clip,
            camera_resolution,
            viewport,
            intrinsics,
            pending_camera: None,
            pending_viewport: None,
            projection_dirty: true,
            surface_dirty: true,
            frame_index: 0,
            projection_rebuilds: 0,
            draw_calls: 0,
            released: false,
        })
    }

    fn derive_intrinsics(
        calibration: &CameraIntrinsics,
        camera: Resolution,
        viewport: Resolution,
    ) -> CameraIntrinsics {
        calibration.scaled_to(camera).scaled_to(viewport)
    }

    /// Queue a viewport resize for the next cycle
    pub fn request_resize(&mut self, viewport: Resolution) {
        if viewport.width == 0 || viewport.height == 0 {
            warn!("Ignoring resize to empty viewport {}", viewport);
            return;
        }
        self.pending_viewport = Some(viewport);
    }

    /// Queue a camera resolution change for the next cycle
    pub fn update_intrinsics(&mut self, camera_resolution: Resolution) {
        if camera_resolution.width == 0 || camera_resolution.height == 0 {
            warn!("Ignoring empty camera resolution {}", camera_resolution);
            return;
        }
        self.pending_camera = Some(camera_resolution);
    }

    fn apply_pending(&mut self) -> Result<(), RenderError> {
        if let Some(camera) = self.pending_camera.take() {
            if camera != self.camera_resolution {
                debug!("Camera resolution {} -> {}", self.camera_resolution, camera);
                self.camera_resolution = camera;
                self.projection_dirty = true;
            }
        }
        if let Some(viewport) = self.pending_viewport.take() {
            if viewport != self.viewport {
                debug!("Viewport {} -> {}", self.viewport, viewport);
                self.viewport = viewport;
                self.projection_dirty = true;
                self.surface_dirty = true;
            }
        }

        if self.surface_dirty {
            self.renderer.resize_surface(self.viewport)?;
            self.surface_dirty = false;
        }

        if self.projection_dirty {
            let intrinsics =
                Self::derive_intrinsics(&self.calibration, self.camera_resolution, self.viewport);
            let projection = intrinsics.projection_matrix(self.clip.near, self.clip.far);
            self.intrinsics = intrinsics;
            self.projection = projection;
            self.renderer.set_projection(&self.projection);
            self.projection_rebuilds += 1;
            self.projection_dirty = false;
        }
        Ok(())
    }

    /// Camera-space panel transform: marker pose, then anchor, then
    /// billboarding when visible
    pub fn panel_transform(&self, state: &SmoothedState) -> Matrix4<f64> {
        let placed = state.pose.to_homogeneous() * self.anchor.to_homogeneous();
        if !state.visible {
            return placed;
        }

        let centre = Vector3::new(placed[(0, 3)], placed[(1, 3)], placed[(2, 3)]);
        match billboard_rotation(&centre) {
            Some(facing) => {
                let orientation = facing * self.anchor.rotation();
                Translation3::from(centre).to_homogeneous()
                    * orientation.to_homogeneous()
                    * Matrix4::new_nonuniform_scaling(self.anchor.scale())
            }
            None => placed,
        }
    }

    /// Compose and draw exactly one frame
    pub fn render(&mut self, state: &SmoothedState) -> Result<(), RenderError> {
        if self.released {
            return Err(RenderError::Released);
        }

        self.apply_pending()?;

        let scene = Scene {
            frame_index: self.frame_index,
            camera: CameraNode {
                projection: self.projection,
                viewport: self.viewport,
            },
            light: AmbientLight::default(),
            panel: MeshNode {
                name: PANEL_NAME.to_string(),
                transform: self.panel_transform(state),
                visible: state.visible,
            },
        };

        self.frame_index += 1;
        self.draw_calls += 1;
        self.renderer.draw(&scene)
    }

    /// Release GPU resources. Later renders fail with
    /// [`RenderError::Released`].
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.renderer.release();
        self.released = true;
        info!(
            "Scene compositor released after {} draws, {} projection rebuilds",
            self.draw_calls, self.projection_rebuilds
        );
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Intrinsics in effect for the last render
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn viewport(&self) -> Resolution {
        self.viewport
    }

    pub fn projection_rebuilds(&self) -> u64 {
        self.projection_rebuilds
    }

    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }
}

/// Rotation that turns the panel's +Z towards the camera origin with +Y up
fn billboard_rotation(centre: &Vector3<f64>) -> Option<Rotation3<f64>> {
    let to_camera = -centre;
    if to_camera.norm() < MIN_VIEW_DISTANCE {
        return None;
    }
    let up = Vector3::y();
    if to_camera.normalize().cross(&up).norm() < 1e-6 {
        return None;
    }
    Some(Rotation3::face_towards(&to_camera, &up))
}
