//! Renderer that records calls instead of touching a GPU

use std::sync::{Arc, Mutex, MutexGuard};

use camera_capture::Resolution;
use nalgebra::Matrix4;
use tracing::{debug, trace};

use crate::compositor::Renderer;
use crate::scene::Scene;
use crate::RenderError;

/// Calls observed by a [`HeadlessRenderer`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Resize(Resolution),
    Projection(Matrix4<f64>),
    Draw(Scene),
    Release,
}

/// Shared view of a headless renderer's event log
#[derive(Debug, Clone, Default)]
pub struct RenderLog {
    events: Arc<Mutex<Vec<RenderEvent>>>,
}

impl RenderLog {
    fn lock(&self) -> MutexGuard<'_, Vec<RenderEvent>> {
        // A poisoned log is still a valid log
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: RenderEvent) {
        self.lock().push(event);
    }

    /// Copy of every event so far
    pub fn events(&self) -> Vec<RenderEvent> {
        self.lock().clone()
    }

    /// Scenes passed to `draw`, in order
    pub fn draws(&self) -> Vec<Scene> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                RenderEvent::Draw(scene) => Some(scene.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn draw_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| matches!(e, RenderEvent::Draw(_)))
            .count()
    }

    pub fn release_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| matches!(e, RenderEvent::Release))
            .count()
    }
}

/// Off-screen renderer for demos and tests
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    log: RenderLog,
    surface: Option<Resolution>,
    fail_draws: bool,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `draw` call fails with a backend error
    pub fn failing(mut self) -> Self {
        self.fail_draws = true;
        self
    }

    /// Handle that stays valid after the renderer is boxed
    pub fn log(&self) -> RenderLog {
        self.log.clone()
    }
}

impl Renderer for HeadlessRenderer {
    fn resize_surface(&mut self, viewport: Resolution) -> Result<(), RenderError> {
        debug!("Headless surface resized to {}", viewport);
        self.surface = Some(viewport);
        self.log.record(RenderEvent::Resize(viewport));
        Ok(())
    }

    fn set_projection(&mut self, projection: &Matrix4<f64>) {
        self.log.record(RenderEvent::Projection(*projection));
    }

    fn draw(&mut self, scene: &Scene) -> Result<(), RenderError> {
        if self.fail_draws {
            return Err(RenderError::Backend("headless draw disabled".into()));
        }
        trace!(
            "Frame {}: panel {} at {:?}",
            scene.frame_index,
            if scene.panel.visible { "shown" } else { "hidden" },
            scene.panel.centre()
        );
        self.log.record(RenderEvent::Draw(scene.clone()));
        Ok(())
    }

    fn release(&mut self) {
        self.surface = None;
        self.log.record(RenderEvent::Release);
    }
}
