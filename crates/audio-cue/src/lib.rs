//! Audio Cue
//!
//! Plays the overlay's audio track while the marker is visible and rewinds
//! it when the marker is lost or the track ends.

mod controller;
mod sink;

pub use controller::{PlaybackController, PlaybackState, PlaybackStatus};
pub use sink::{AudioSink, SilentSink};

use serde::Serialize;
use thiserror::Error;

/// Playback failures. Never retried; the controller stays idle.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AudioPlaybackError {
    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Audio decode failed: {0}")]
    Decode(String),

    #[error("Audio device error: {0}")]
    Device(String),
}
