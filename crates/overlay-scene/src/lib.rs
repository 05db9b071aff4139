//! Overlay Scene
//!
//! Composes the marker-anchored overlay panel each display cycle:
//! - Camera intrinsics and GL projection
//! - Panel anchor offset relative to the marker
//! - Billboarding towards the viewer
//! - Rendering behind a black-box [`Renderer`]

pub mod anchor;
pub mod compositor;
pub mod headless;
pub mod intrinsics;
pub mod scene;

pub use anchor::{Axis, PanelAnchor};
pub use compositor::{ClipPlanes, Renderer, SceneCompositor};
pub use headless::{HeadlessRenderer, RenderEvent, RenderLog};
pub use intrinsics::CameraIntrinsics;
pub use scene::{AmbientLight, CameraNode, MeshNode, Scene};

use thiserror::Error;

/// Errors surfaced by a render cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// GPU resources were already released
    #[error("Renderer released")]
    Released,

    #[error("Render backend failed: {0}")]
    Backend(String),
}

/// Scene setup errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Invalid camera intrinsics: {0}")]
    InvalidIntrinsics(String),

    #[error("Invalid clip planes: near={near}, far={far}")]
    InvalidClipPlanes { near: f64, far: f64 },
}
