//! Observer callback surface.
//!
//! A controller has at most one registered [`PlayerObserver`]. Callbacks are
//! always invoked after the controller released its internal lock, so an
//! observer may call straight back into the controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;

use super::item::{PlaylistItem, SharedItem};
use super::state::PlaybackState;
use super::stream::HandleId;

/// The next item offered for preloading.
#[derive(Debug, Clone)]
pub struct PreloadCandidate {
    /// Playlist position of the candidate
    pub index: usize,
    pub handle: HandleId,
    pub item: SharedItem,
}

/// Receives playback notifications.
pub trait PlayerObserver: Send + Sync {
    /// Playback state changed. `item` is the current item at that moment.
    fn on_status_changed(&self, state: PlaybackState, item: Option<&dyn PlaylistItem>);

    /// Progress timer tick.
    fn on_progress(&self, elapsed: Duration, fraction: f32);

    /// Total duration of the current item, reported once per attempt.
    fn on_total_time(&self, duration: Duration);

    /// Buffer timer tick.
    fn on_buffer_progress(&self, fraction: f32);

    /// Whether the next item may be preloaded.
    fn should_preload(&self, candidate: &PreloadCandidate) -> bool;

    /// The next item started preloading.
    fn on_preload_started(&self, candidate: &PreloadCandidate);
}

/// Observer notifications as plain data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    StatusChanged {
        state: PlaybackState,
        locator: Option<String>,
    },
    Progress {
        elapsed_ms: u64,
        fraction: f32,
    },
    TotalTime {
        duration_ms: u64,
    },
    BufferProgress {
        fraction: f32,
    },
    PreloadStarted {
        index: usize,
        locator: String,
    },
}

/// Observer that forwards every notification over a channel.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: Sender<PlayerEvent>,
    allow_preload: AtomicBool,
}

impl ChannelObserver {
    /// Create the observer and the receiving end of its events.
    pub fn new() -> (Self, Receiver<PlayerEvent>) {
        let (tx, rx) = unbounded();
        let observer = Self {
            tx,
            allow_preload: AtomicBool::new(true),
        };
        (observer, rx)
    }

    /// Answer for `should_preload` (default `true`).
    pub fn set_allow_preload(&self, allow: bool) {
        self.allow_preload.store(allow, Ordering::Relaxed);
    }

    fn send(&self, event: PlayerEvent) {
        // Receiver gone: nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl PlayerObserver for ChannelObserver {
    fn on_status_changed(&self, state: PlaybackState, item: Option<&dyn PlaylistItem>) {
        self.send(PlayerEvent::StatusChanged {
            state,
            locator: item.map(|i| i.locator().to_string()),
        });
    }

    fn on_progress(&self, elapsed: Duration, fraction: f32) {
        self.send(PlayerEvent::Progress {
            elapsed_ms: elapsed.as_millis() as u64,
            fraction,
        });
    }

    fn on_total_time(&self, duration: Duration) {
        self.send(PlayerEvent::TotalTime {
            duration_ms: duration.as_millis() as u64,
        });
    }

    fn on_buffer_progress(&self, fraction: f32) {
        self.send(PlayerEvent::BufferProgress { fraction });
    }

    fn should_preload(&self, _candidate: &PreloadCandidate) -> bool {
        self.allow_preload.load(Ordering::Relaxed)
    }

    fn on_preload_started(&self, candidate: &PreloadCandidate) {
        self.send(PlayerEvent::PreloadStarted {
            index: candidate.index,
            locator: candidate.item.locator().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::item::Track;

    #[test]
    fn test_channel_observer_forwards() {
        let (observer, rx) = ChannelObserver::new();
        let track = Track::new("a");
        observer.on_status_changed(PlaybackState::Playing, Some(&track));
        observer.on_total_time(Duration::from_secs(3));

        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                PlayerEvent::StatusChanged {
                    state: PlaybackState::Playing,
                    locator: Some("a".into()),
                },
                PlayerEvent::TotalTime { duration_ms: 3000 },
            ]
        );
    }

    #[test]
    fn test_preload_permission() {
        let (observer, _rx) = ChannelObserver::new();
        let candidate = PreloadCandidate {
            index: 1,
            handle: HandleId(2),
            item: Track::new("b").shared(),
        };
        assert!(observer.should_preload(&candidate));
        observer.set_allow_preload(false);
        assert!(!observer.should_preload(&candidate));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(PlayerEvent::BufferProgress { fraction: 1.0 }).unwrap();
        assert_eq!(json["event"], "buffer_progress");
        assert_eq!(json["fraction"], 1.0);
    }
}
