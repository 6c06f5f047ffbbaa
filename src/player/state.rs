//! Playback and buffer state types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Externally visible playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing has been played yet
    #[default]
    None,
    /// Engine is resolving the item locator
    Loading,
    /// Engine is filling its buffer
    Buffering,
    Playing,
    Paused,
    /// Advancing to another item
    SwitchingTrack,
    /// Stopped by the engine or the user
    Stopped,
    /// Reached the end with nothing left to advance to
    Ended,
    /// Transport failure; `play()` retries
    Error,
}

impl PlaybackState {
    /// Whether a fresh `play()` restarts the cycle from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Ended | Self::Error)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Loading => "loading",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::SwitchingTrack => "switching",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Byte-buffering state of the current attempt.
///
/// Monotonic within one attempt: once `Finished`, it stays there until the
/// current item changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferState {
    #[default]
    None,
    Buffering,
    Finished,
}

/// Position reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamPosition {
    /// Time played so far
    pub elapsed: Duration,
    /// Fraction of the item played (0.0 - 1.0)
    pub fraction: f32,
}

impl StreamPosition {
    pub fn new(elapsed: Duration, fraction: f32) -> Self {
        Self { elapsed, fraction }
    }
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
