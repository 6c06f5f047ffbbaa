//! Lock-screen and headset integration.
//!
//! The host forwards commands from the OS remote-control surface (lock
//! screen, headset buttons, car displays) as [`RemoteCommand`]s and renders
//! the [`NowPlaying`] snapshot the controller hands back.

use serde::Serialize;
use std::time::Duration;

use super::item::PlaylistItem;
use super::state::format_duration;

/// Commands that can be received from OS remote controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    /// Play or resume playback
    Play,
    /// Pause playback
    Pause,
    /// Toggle play/pause
    TogglePlayPause,
    /// Skip to next item
    Next,
    /// Skip to previous item
    Previous,
    /// Seek to an absolute position in the current item
    ChangePosition(Duration),
}

/// Metadata and timing for the OS now-playing display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NowPlaying {
    /// Track title
    pub title: Option<String>,
    /// Artist name
    pub artist: Option<String>,
    pub locator: String,
    /// Time played so far
    #[serde(with = "millis")]
    pub elapsed: Duration,
    /// Total duration (zero while unknown)
    #[serde(with = "millis")]
    pub duration: Duration,
    /// Playback rate, 0.0 when not playing
    pub rate: f32,
}

impl NowPlaying {
    /// Snapshot for an item.
    pub fn for_item(item: &dyn PlaylistItem) -> Self {
        Self {
            title: item.title().map(str::to_string),
            artist: item.artist().map(str::to_string),
            locator: item.locator().to_string(),
            ..Default::default()
        }
    }

    /// Set elapsed time and duration.
    pub fn timing(mut self, elapsed: Duration, duration: Duration) -> Self {
        self.elapsed = elapsed;
        self.duration = duration;
        self
    }

    /// Set the playback rate.
    pub fn rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn is_playing(&self) -> bool {
        self.rate > 0.0
    }

    /// `elapsed / duration` as shown on the lock screen, e.g. `1:05 / 3:30`.
    pub fn progress_label(&self) -> String {
        format!(
            "{} / {}",
            format_duration(self.elapsed),
            format_duration(self.duration)
        )
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
