//! Playback state machine

use std::time::Duration;

use marker_tracking::VisibilityTransition;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::sink::AudioSink;
use crate::AudioPlaybackError;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

/// Snapshot for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub last_error: Option<AudioPlaybackError>,
    /// Times playback started from position 0
    pub plays: u64,
    /// Times playback was stopped and rewound
    pub stops: u64,
}

/// Drives an [`AudioSink`] from smoothed visibility edges.
///
/// Idle -> Playing on `BecameVisible`; Playing -> Idle on `BecameHidden`,
/// end of track or an explicit stop. Every stop rewinds to 0.
pub struct PlaybackController {
    sink: Box<dyn AudioSink>,
    state: PlaybackState,
    marker_visible: bool,
    last_error: Option<AudioPlaybackError>,
    plays: u64,
    stops: u64,
    shut_down: bool,
}

impl PlaybackController {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            state: PlaybackState::Idle,
            marker_visible: false,
            last_error: None,
            plays: 0,
            stops: 0,
            shut_down: false,
        }
    }

    /// React to one smoother edge
    pub fn on_transition(
        &mut self,
        transition: VisibilityTransition,
    ) -> Result<PlaybackState, AudioPlaybackError> {
        if self.shut_down {
            return Ok(self.state);
        }
        match transition {
            VisibilityTransition::BecameVisible => {
                self.marker_visible = true;
                if self.state == PlaybackState::Idle {
                    self.start()?;
                }
            }
            VisibilityTransition::BecameHidden => {
                self.marker_visible = false;
                if self.state == PlaybackState::Playing {
                    self.reset("marker lost");
                }
            }
            VisibilityTransition::Unchanged => {}
        }
        Ok(self.state)
    }

    /// Poll the sink for end of track; returns true if playback just ended
    pub fn poll_end(&mut self) -> bool {
        if self.shut_down || self.state != PlaybackState::Playing {
            return false;
        }
        if self.sink.has_ended() {
            self.reset("end of track");
            return true;
        }
        false
    }

    /// Start playback manually. Only honoured while idle with the marker
    /// visible; returns whether playback started.
    pub fn request_play(&mut self) -> Result<bool, AudioPlaybackError> {
        if self.shut_down || self.state == PlaybackState::Playing || !self.marker_visible {
            debug!(
                "Play request ignored (state {:?}, marker visible: {})",
                self.state, self.marker_visible
            );
            return Ok(false);
        }
        self.start()?;
        Ok(true)
    }

    /// Stop playback manually; returns whether anything was playing
    pub fn request_stop(&mut self) -> bool {
        if self.shut_down || self.state != PlaybackState::Playing {
            return false;
        }
        self.reset("stop requested");
        true
    }

    fn start(&mut self) -> Result<(), AudioPlaybackError> {
        let started = self
            .sink
            .seek(Duration::ZERO)
            .and_then(|_| self.sink.play());

        match started {
            Ok(()) => {
                self.state = PlaybackState::Playing;
                self.plays += 1;
                info!("Audio cue started (play #{})", self.plays);
                Ok(())
            }
            Err(e) => {
                warn!("Audio cue failed to start: {}", e);
                self.state = PlaybackState::Idle;
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn reset(&mut self, reason: &str) {
        self.sink.stop();
        if let Err(e) = self.sink.seek(Duration::ZERO) {
            warn!("Audio cue rewind failed: {}", e);
            self.last_error = Some(e);
        }
        self.state = PlaybackState::Idle;
        self.stops += 1;
        info!("Audio cue stopped: {}", reason);
    }

    /// Stop any playback and ignore further input
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        if self.state == PlaybackState::Playing {
            self.reset("shutdown");
        }
        self.shut_down = true;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            last_error: self.last_error.clone(),
            plays: self.plays,
            stops: self.stops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Play,
        Pause,
        Stop,
        Seek(Duration),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Arc<Mutex<Vec<Call>>>,
        ended: Arc<Mutex<bool>>,
        fail_play: Option<AudioPlaybackError>,
        position: Duration,
    }

    impl AudioSink for RecordingSink {
        fn play(&mut self) -> Result<(), AudioPlaybackError> {
            if let Some(e) = &self.fail_play {
                return Err(e.clone());
            }
            self.calls.lock().unwrap().push(Call::Play);
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.lock().unwrap().push(Call::Pause);
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push(Call::Stop);
        }

        fn seek(&mut self, position: Duration) -> Result<(), AudioPlaybackError> {
            self.position = position;
            self.calls.lock().unwrap().push(Call::Seek(position));
            Ok(())
        }

        fn has_ended(&mut self) -> bool {
            std::mem::take(&mut *self.ended.lock().unwrap())
        }

        fn position(&self) -> Duration {
            self.position
        }
    }

    fn controller() -> (PlaybackController, Arc<Mutex<Vec<Call>>>, Arc<Mutex<bool>>) {
        let sink = RecordingSink::default();
        let calls = sink.calls.clone();
        let ended = sink.ended.clone();
        (PlaybackController::new(Box::new(sink)), calls, ended)
    }

    fn count(calls: &Arc<Mutex<Vec<Call>>>, call: &Call) -> usize {
        calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    #[test]
    fn test_visible_edge_plays_once_from_zero() {
        let (mut controller, calls, _) = controller();

        assert_eq!(
            controller.on_transition(VisibilityTransition::BecameVisible),
            Ok(PlaybackState::Playing)
        );
        for _ in 0..20 {
            controller.on_transition(VisibilityTransition::Unchanged).unwrap();
        }

        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::Seek(Duration::ZERO), Call::Play]
        );
        assert_eq!(controller.status().plays, 1);
    }

    #[test]
    fn test_hidden_edge_stops_and_rewinds_once() {
        let (mut controller, calls, _) = controller();
        controller.on_transition(VisibilityTransition::BecameVisible).unwrap();
        calls.lock().unwrap().clear();

        controller.on_transition(VisibilityTransition::BecameHidden).unwrap();
        controller.on_transition(VisibilityTransition::BecameHidden).unwrap();
        controller.on_transition(VisibilityTransition::Unchanged).unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::Stop, Call::Seek(Duration::ZERO)]
        );
        let status = controller.status();
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.stops, 1);
    }

    #[test]
    fn test_end_of_track_returns_to_idle() {
        let (mut controller, calls, ended) = controller();
        controller.on_transition(VisibilityTransition::BecameVisible).unwrap();
        assert!(!controller.poll_end());

        *ended.lock().unwrap() = true;
        assert!(controller.poll_end());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(count(&calls, &Call::Stop), 1);
        assert_eq!(calls.lock().unwrap().last(), Some(&Call::Seek(Duration::ZERO)));

        // Marker still visible, but no replay without a new edge
        controller.on_transition(VisibilityTransition::Unchanged).unwrap();
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(count(&calls, &Call::Play), 1);
    }

    #[test]
    fn test_request_play_needs_visible_marker() {
        let (mut controller, _calls, _) = controller();
        assert_eq!(controller.request_play(), Ok(false));

        controller.on_transition(VisibilityTransition::BecameVisible).unwrap();
        assert!(controller.request_stop());
        assert_eq!(controller.state(), PlaybackState::Idle);

        assert_eq!(controller.request_play(), Ok(true));
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.request_play(), Ok(false));
        assert_eq!(controller.status().plays, 2);
    }

    #[test]
    fn test_request_stop_when_idle_is_noop() {
        let (mut controller, calls, _) = controller();
        assert!(!controller.request_stop());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_play_failure_stays_idle() {
        let sink = RecordingSink {
            fail_play: Some(AudioPlaybackError::NoOutputDevice),
            ..Default::default()
        };
        let calls = sink.calls.clone();
        let mut controller = PlaybackController::new(Box::new(sink));

        assert_eq!(
            controller.on_transition(VisibilityTransition::BecameVisible),
            Err(AudioPlaybackError::NoOutputDevice)
        );
        let status = controller.status();
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.last_error, Some(AudioPlaybackError::NoOutputDevice));
        assert_eq!(status.plays, 0);

        // Not retried on later cycles
        controller.on_transition(VisibilityTransition::Unchanged).unwrap();
        assert_eq!(count(&calls, &Call::Seek(Duration::ZERO)), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut controller, calls, _) = controller();
        controller.on_transition(VisibilityTransition::BecameVisible).unwrap();
        controller.shutdown();
        controller.shutdown();

        assert_eq!(count(&calls, &Call::Stop), 1);
        assert_eq!(controller.state(), PlaybackState::Idle);

        controller.on_transition(VisibilityTransition::BecameVisible).unwrap();
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(count(&calls, &Call::Play), 1);
    }

    #[test]
    fn test_status_serializes() {
        let (controller, _, _) = controller();
        let json = serde_json::to_value(controller.status()).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["plays"], 0);
    }
}
