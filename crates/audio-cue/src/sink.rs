//! Audio output seam and a silent clock-driven implementation

use std::time::{Duration, Instant};

use tracing::debug;

use crate::AudioPlaybackError;

/// Audio output for a single preloaded track
pub trait AudioSink: Send {
    /// Start or resume from the current position
    fn play(&mut self) -> Result<(), AudioPlaybackError>;

    /// Halt, keeping the position
    fn pause(&mut self);

    /// Halt playback
    fn stop(&mut self);

    /// Move the playhead
    fn seek(&mut self, position: Duration) -> Result<(), AudioPlaybackError>;

    /// True once per natural end of the track
    fn has_ended(&mut self) -> bool;

    /// Current playhead
    fn position(&self) -> Duration;
}

/// Sink that produces no sound and advances with the wall clock
#[derive(Debug)]
pub struct SilentSink {
    track_length: Duration,
    offset: Duration,
    started_at: Option<Instant>,
    fail_with: Option<AudioPlaybackError>,
}

impl SilentSink {
    pub fn new(track_length: Duration) -> Self {
        Self {
            track_length,
            offset: Duration::ZERO,
            started_at: None,
            fail_with: None,
        }
    }

    /// Every `play` fails with `error`, as a device without output would
    pub fn failing_with(mut self, error: AudioPlaybackError) -> Self {
        self.fail_with = Some(error);
        self
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    fn halt(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.offset = (self.offset + started.elapsed()).min(self.track_length);
        }
    }
}

impl AudioSink for SilentSink {
    fn play(&mut self) -> Result<(), AudioPlaybackError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.halt();
    }

    fn stop(&mut self) {
        self.halt();
    }

    fn seek(&mut self, position: Duration) -> Result<(), AudioPlaybackError> {
        self.offset = position.min(self.track_length);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn has_ended(&mut self) -> bool {
        if self.started_at.is_some() && self.position() >= self.track_length {
            self.started_at = None;
            self.offset = self.track_length;
            debug!("Silent track finished after {:?}", self.track_length);
            return true;
        }
        false
    }

    fn position(&self) -> Duration {
        let running = self.started_at.map(|s| s.elapsed()).unwrap_or_default();
        (self.offset + running).min(self.track_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ends_once_after_track_length() {
        let mut sink = SilentSink::new(Duration::from_millis(20));
        sink.play().unwrap();
        assert!(!sink.has_ended());

        thread::sleep(Duration::from_millis(30));
        assert!(sink.has_ended());
        assert!(!sink.has_ended());
        assert!(!sink.is_playing());
        assert_eq!(sink.position(), Duration::from_millis(20));
    }

    #[test]
    fn test_pause_holds_position() {
        let mut sink = SilentSink::new(Duration::from_secs(10));
        sink.play().unwrap();
        thread::sleep(Duration::from_millis(5));
        sink.pause();
        let held = sink.position();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(sink.position(), held);
        assert!(held >= Duration::from_millis(5));
    }

    #[test]
    fn test_seek_rewinds() {
        let mut sink = SilentSink::new(Duration::from_secs(10));
        sink.seek(Duration::from_secs(4)).unwrap();
        assert_eq!(sink.position(), Duration::from_secs(4));
        sink.seek(Duration::ZERO).unwrap();
        assert_eq!(sink.position(), Duration::ZERO);
        sink.seek(Duration::from_secs(99)).unwrap();
        assert_eq!(sink.position(), Duration::from_secs(10));
    }

    #[test]
    fn test_failing_sink() {
        let mut sink = SilentSink::new(Duration::from_secs(1))
            .failing_with(AudioPlaybackError::NoOutputDevice);
        assert_eq!(sink.play(), Err(AudioPlaybackError::NoOutputDevice));
        assert!(!sink.is_playing());
    }
}
