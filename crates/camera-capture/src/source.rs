//! Frame source: capture thread plus single-slot latest-frame handoff

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::{CameraDevice, CameraError, CaptureConstraints, Resolution, VideoFrame};

type FrameSlot = Option<Arc<VideoFrame>>;
type FailureSlot = Arc<Mutex<Option<CameraError>>>;

/// Releases the wrapped device when dropped, on every exit path
struct DeviceGuard {
    device: Box<dyn CameraDevice>,
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        debug!("Releasing camera device");
        self.device.release();
    }
}

/// Pull-based frame source backed by a capture thread
pub struct FrameSource {
    receiver: watch::Receiver<FrameSlot>,
    resolution: Resolution,
    fps: u32,
    shutdown: Arc<AtomicBool>,
    streaming: Arc<AtomicBool>,
    failure: FailureSlot,
    worker: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// Acquire the device, negotiate constraints and start capturing.
    ///
    /// The device is released if negotiation fails. Permission denial is
    /// returned as-is and never retried.
    pub fn open(
        device: Box<dyn CameraDevice>,
        constraints: CaptureConstraints,
    ) -> Result<Self, CameraError> {
        let mut guard = DeviceGuard { device };

        info!(
            "Opening camera: facing={:?}, hint={}",
            constraints.facing_mode,
            constraints.resolution_hint()
        );

        let resolution = guard.device.open(&constraints).map_err(|e| {
            error!("Camera open failed: {}", e);
            e
        })?;

        if resolution != constraints.resolution_hint() {
            info!(
                "Camera delivered {} instead of requested {}",
                resolution,
                constraints.resolution_hint()
            );
        }

        let fps = constraints.effective_fps(guard.device.native_fps());
        let (tx, rx) = watch::channel::<FrameSlot>(None);
        let shutdown = Arc::new(AtomicBool::new(false));
        let streaming = Arc::new(AtomicBool::new(true));
        let failure: FailureSlot = Arc::new(Mutex::new(None));

        let shutdown_clone = shutdown.clone();
        let streaming_clone = streaming.clone();
        let failure_clone = failure.clone();
        let worker = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                capture_loop(guard, tx, fps, shutdown_clone, streaming_clone, failure_clone)
            })
            .map_err(|e| CameraError::DeviceUnavailable(format!("capture thread: {}", e)))?;

        Ok(Self {
            receiver: rx,
            resolution,
            fps,
            shutdown,
            streaming,
            failure,
            worker: Some(worker),
        })
    }

    /// Resolution the device actually delivers
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Effective capture rate
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Whether the capture thread is still producing frames
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Error that ended the stream, if the device failed after opening.
    /// A failed stream is never restarted.
    pub fn failure(&self) -> Option<CameraError> {
        match self.failure.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Wait for the next published frame; `None` once the source has stopped
    pub async fn next_frame(&mut self) -> Option<Arc<VideoFrame>> {
        if self.receiver.changed().await.is_err() {
            return None;
        }
        self.receiver.borrow_and_update().clone()
    }

    /// Take the newest frame if one arrived since the last call. Never blocks.
    pub fn latest(&mut self) -> Option<Arc<VideoFrame>> {
        match self.receiver.has_changed() {
            Ok(true) => self.receiver.borrow_and_update().clone(),
            Ok(false) | Err(_) => None,
        }
    }

    /// Stop capturing and release the device. Safe to call more than once.
    pub fn close(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Camera capture thread panicked");
            }
            info!("Camera closed");
        }
        self.streaming.store(false, Ordering::SeqCst);
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn capture_loop(
    mut guard: DeviceGuard,
    tx: watch::Sender<FrameSlot>,
    fps: u32,
    shutdown: Arc<AtomicBool>,
    streaming: Arc<AtomicBool>,
    failure: FailureSlot,
) {
    let interval = Duration::from_micros(1_000_000 / fps.max(1) as u64);
    debug!("Capture loop started at {} fps", fps);

    while !shutdown.load(Ordering::SeqCst) {
        let started = Instant::now();

        match guard.device.read_frame() {
            Ok(Some(frame)) => {
                // Latest frame wins; an unconsumed frame is simply replaced
                tx.send_replace(Some(Arc::new(frame)));
            }
            Ok(None) => {}
            Err(e) => {
                error!("Camera stream failed: {}", e);
                match failure.lock() {
                    Ok(mut slot) => *slot = Some(e),
                    Err(poisoned) => *poisoned.into_inner() = Some(e),
                }
                break;
            }
        }

        if let Some(remaining) = interval.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    streaming.store(false, Ordering::SeqCst);
    debug!("Capture loop exited");
    drop(guard);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyntheticCamera;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_open_and_receive_frames() {
        let camera = SyntheticCamera::new(60);
        let mut source = FrameSource::open(Box::new(camera), CaptureConstraints::default()).unwrap();

        let first = timeout(Duration::from_secs(2), source.next_frame())
            .await
            .unwrap()
            .unwrap();
        let second = timeout(Duration::from_secs(2), source.next_frame())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.resolution(), Resolution::new(1920, 1080));
        assert!(second.sequence > first.sequence);
        source.close();
    }

    #[test]
    fn test_permission_denied_releases_device() {
        let camera = SyntheticCamera::new(30).failing_with(CameraError::PermissionDenied);
        let released = camera.release_flag();

        let result = FrameSource::open(Box::new(camera), CaptureConstraints::default());

        assert_eq!(result.err(), Some(CameraError::PermissionDenied));
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_device_may_override_resolution() {
        let camera = SyntheticCamera::new(30).delivering(Resolution::new(1280, 720));
        let mut source = FrameSource::open(Box::new(camera), CaptureConstraints::default()).unwrap();
        assert_eq!(source.resolution(), Resolution::new(1280, 720));
        source.close();
    }

    #[test]
    fn test_close_is_idempotent_and_releases() {
        let camera = SyntheticCamera::new(60);
        let released = camera.release_flag();
        let mut source = FrameSource::open(Box::new(camera), CaptureConstraints::default()).unwrap();

        source.close();
        source.close();

        assert!(released.load(Ordering::SeqCst));
        assert!(!source.is_streaming());
        assert!(source.latest().is_none());
    }

    #[test]
    fn test_latest_never_blocks() {
        let camera = SyntheticCamera::new(60);
        let mut source = FrameSource::open(Box::new(camera), CaptureConstraints::default()).unwrap();

        let started = Instant::now();
        let _ = source.latest();
        assert!(started.elapsed() < Duration::from_millis(50));

        std::thread::sleep(Duration::from_millis(100));
        let frame = source.latest();
        assert!(frame.is_some());
        // Same frame is not handed out twice
        if let (Some(a), Some(b)) = (frame, source.latest()) {
            assert_ne!(a.sequence, b.sequence);
        }
        source.close();
    }

    #[tokio::test]
    async fn test_stream_failure_is_recorded() {
        let camera = SyntheticCamera::new(60).failing_after(3, CameraError::PermissionDenied);
        let released = camera.release_flag();
        let mut source = FrameSource::open(Box::new(camera), CaptureConstraints::default()).unwrap();
        assert_eq!(source.failure(), None);

        let mut delivered = 0;
        while timeout(Duration::from_secs(2), source.next_frame())
            .await
            .unwrap()
            .is_some()
        {
            delivered += 1;
        }

        assert!((1..=3).contains(&delivered));
        assert_eq!(source.failure(), Some(CameraError::PermissionDenied));
        assert!(!source.is_streaming());
        assert!(released.load(Ordering::SeqCst));
        assert!(source.latest().is_none());
        source.close();
    }

    #[test]
    fn test_drop_releases_device() {
        let camera = SyntheticCamera::new(60);
        let released = camera.release_flag();
        {
            let _source = FrameSource::open(Box::new(camera), CaptureConstraints::default()).unwrap();
        }
        assert!(released.load(Ordering::SeqCst));
    }
}
