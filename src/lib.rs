//! Playlist Engine - playlist and playback state machine for streaming audio.
//!
//! The crate sits between a host application and an external streaming
//! engine. It owns the playlist, decides which item plays next for each play
//! mode, derives playback and buffering state from the engine's lifecycle
//! events and reports everything to a single observer.
//!
//! ```ignore
//! use std::sync::Arc;
//! use playlist_engine::player::{PlaybackController, Track};
//! use playlist_engine::sim::SimulatedEngine;
//!
//! let controller = PlaybackController::builder(Arc::new(SimulatedEngine::default()))
//!     .config(playlist_engine::config::load())
//!     .build();
//! let _pump = controller.spawn_event_pump()?;
//! controller.load_and_play(vec![Track::new("https://cdn.example/a.mp3").shared()], 0);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod player;
pub mod sim;
#[cfg(test)]
pub mod test_utils;
