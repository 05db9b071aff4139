//! Synthetic camera device (no hardware required)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::{CameraDevice, CameraError, CaptureConstraints, Resolution, VideoFrame};

/// Deterministic frame generator implementing [`CameraDevice`]
pub struct SyntheticCamera {
    fps: u32,
    /// Resolution forced by the "hardware", ignoring the hint
    forced_resolution: Option<Resolution>,
    /// Error returned from `open`
    open_error: Option<CameraError>,
    /// Error returned from `read_frame` once this many frames were delivered
    stream_error: Option<(u32, CameraError)>,
    /// Size the frames switch to once this many frames were delivered
    resize: Option<(u32, Resolution)>,
    resolution: Option<Resolution>,
    sequence: u32,
    started: Instant,
    released: Arc<AtomicBool>,
}

impl SyntheticCamera {
    /// Create a synthetic camera running at `fps`
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            forced_resolution: None,
            open_error: None,
            stream_error: None,
            resize: None,
            resolution: None,
            sequence: 0,
            started: Instant::now(),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver this resolution regardless of the requested hint
    pub fn delivering(mut self, resolution: Resolution) -> Self {
        self.forced_resolution = Some(resolution);
        self
    }

    /// Fail `open` with the given error
    pub fn failing_with(mut self, error: CameraError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Deliver `frames` frames, then fail every read with `error`
    pub fn failing_after(mut self, frames: u32, error: CameraError) -> Self {
        self.stream_error = Some((frames, error));
        self
    }

    /// Deliver `frames` frames at the negotiated size, then switch to `resolution`
    pub fn resizing_after(mut self, frames: u32, resolution: Resolution) -> Self {
        self.resize = Some((frames, resolution));
        self
    }

    /// Flag set once the device has been released
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }
}

impl CameraDevice for SyntheticCamera {
    fn open(&mut self, constraints: &CaptureConstraints) -> Result<Resolution, CameraError> {
        if let Some(err) = self.open_error.clone() {
            return Err(err);
        }

        let resolution = self
            .forced_resolution
            .unwrap_or_else(|| constraints.resolution_hint());
        if resolution.width == 0 || resolution.height == 0 {
            return Err(CameraError::Unsupported(format!(
                "resolution {}",
                resolution
            )));
        }

        info!("Synthetic camera opened at {} @ {} fps", resolution, self.fps);
        self.resolution = Some(resolution);
        self.started = Instant::now();
        Ok(resolution)
    }

    fn native_fps(&self) -> u32 {
        self.fps
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let mut resolution = self
            .resolution
            .ok_or_else(|| CameraError::DeviceUnavailable("device not opened".to_string()))?;

        if let Some((after, err)) = &self.stream_error {
            if self.sequence >= *after {
                return Err(err.clone());
            }
        }
        if let Some((after, changed)) = self.resize {
            if self.sequence >= after {
                resolution = changed;
            }
        }

        self.sequence = self.sequence.wrapping_add(1);
        let shade = (self.sequence % 256) as u8;
        let timestamp_ns = self.started.elapsed().as_nanos() as u64;

        Ok(Some(VideoFrame::solid(
            resolution,
            [shade, 128, 255 - shade],
            timestamp_ns,
            self.sequence,
        )))
    }

    fn release(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!("Synthetic camera released after {} frames", self.sequence);
        }
        self.resolution = None;
    }
}
