//! Playlist-aware playback control.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  PlaybackController (host thread)               │
//! │   playlist commands, transport commands, observer callbacks    │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ StreamHandle (one per item)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 StreamEngine / Transport (external)             │
//! │        network, decoding and output, lifecycle events          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`store`]: items plus index-aligned stream handles and the current index
//! - [`mode`]: the index-advance algorithm for each [`PlayMode`]
//! - [`machine`]: playback and buffer state derived from stream events
//! - [`controller`]: composes the above with timers, session and observer

pub mod controller;
pub mod item;
pub mod machine;
pub mod mode;
pub mod observer;
pub mod remote;
pub mod session;
mod state;
pub mod store;
pub mod stream;
mod timer;

pub use controller::{ControllerBuilder, PlaybackController};
pub use item::{PlaylistItem, SharedItem, Track};
pub use machine::{BufferProgress, Effect, PlaybackStateMachine, buffer_progress};
pub use mode::{Direction, ModeResolver, PlayMode};
pub use observer::{ChannelObserver, PlayerEvent, PlayerObserver, PreloadCandidate};
pub use remote::{NowPlaying, RemoteCommand};
pub use session::{
    AudioSession, LoggingSession, OutputPort, RouteChangeReason, SessionCategory, SessionSignal,
};
pub use state::{BufferState, PlaybackState, StreamPosition, format_duration};
pub use store::PlaylistStore;
pub use stream::{
    EventSink, HandleId, StreamEngine, StreamEvent, StreamEventKind, StreamHandle, StreamRequest,
    Transport,
};
pub use timer::PollTimer;
