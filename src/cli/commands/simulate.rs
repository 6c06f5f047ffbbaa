//! Drive the playback controller against the simulated engine.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::config;
use crate::player::{
    ChannelObserver, PlayMode, PlaybackController, PlaybackState, PlayerEvent, SharedItem, Track,
    format_duration,
};
use crate::sim::SimulatedEngine;

/// Give up when nothing happened for this long
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// On-disk playlist: a list of `[[tracks]]` tables.
#[derive(Debug, Deserialize)]
struct PlaylistFile {
    #[serde(default)]
    tracks: Vec<Track>,
}

/// Read a playlist file into shareable items.
pub fn load_playlist(path: &Path) -> anyhow::Result<Vec<SharedItem>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read playlist {}", path.display()))?;
    let file: PlaylistFile = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse playlist {}", path.display()))?;

    if file.tracks.is_empty() {
        anyhow::bail!("Playlist {} has no tracks", path.display());
    }
    Ok(file.tracks.into_iter().map(Track::shared).collect())
}

/// Play a playlist until `finish_after` items completed, playback ended or
/// failed, or the controller went quiet.
pub fn cmd_simulate(
    playlist: &Path,
    start: usize,
    mode: Option<PlayMode>,
    finish_after: usize,
    json: bool,
) -> anyhow::Result<()> {
    let items = load_playlist(playlist)?;
    let count = items.len();

    let mut config = config::load();
    if let Some(mode) = mode {
        config.playback.mode = mode;
    }

    let (observer, events) = ChannelObserver::new();
    let controller = PlaybackController::builder(Arc::new(SimulatedEngine::default()))
        .config(config)
        .observer(Arc::new(observer))
        .build();
    let _pump = controller.spawn_event_pump()?;

    if !json {
        println!(
            "Playing {} ({} tracks, {:?})",
            playlist.display(),
            count,
            controller.mode()
        );
    }
    if !controller.load_and_play(items, start) {
        anyhow::bail!("Start index {} is out of range ({} tracks)", start, count);
    }

    // The first switch is the initial load, every later one a completion
    let mut switches = 0usize;
    loop {
        let event = match events.recv_timeout(IDLE_TIMEOUT) {
            Ok(event) => event,
            Err(_) => {
                tracing::warn!("No player events for {:?}, stopping", IDLE_TIMEOUT);
                break;
            }
        };
        print_event(&event, json)?;

        if let PlayerEvent::StatusChanged { state, .. } = &event {
            match state {
                PlaybackState::SwitchingTrack => {
                    switches += 1;
                    if switches > finish_after {
                        break;
                    }
                }
                PlaybackState::Ended => break,
                PlaybackState::Error => {
                    tracing::warn!("Playback failed at index {:?}", controller.current_index());
                    break;
                }
                _ => {}
            }
        }
    }

    controller.stop();
    if !json {
        let finished = switches.saturating_sub(1).min(finish_after);
        println!();
        println!("Finished items: {}", finished);
        println!("Final state:    {}", controller.playback_state());
        if let Some(index) = controller.current_index() {
            println!("Current index:  {}", index);
        }
    }
    Ok(())
}

fn print_event(event: &PlayerEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        PlayerEvent::StatusChanged { state, locator } => {
            println!("[status]   {:<14} {}", state.to_string(), locator.as_deref().unwrap_or("-"));
        }
        PlayerEvent::Progress {
            elapsed_ms,
            fraction,
        } => {
            println!(
                "[progress] {} ({:.0}%)",
                format_duration(Duration::from_millis(*elapsed_ms)),
                fraction * 100.0
            );
        }
        PlayerEvent::TotalTime { duration_ms } => {
            println!("[duration] {}", format_duration(Duration::from_millis(*duration_ms)));
        }
        PlayerEvent::BufferProgress { fraction } => {
            println!("[buffer]   {:.0}%", fraction * 100.0);
        }
        PlayerEvent::PreloadStarted { index, locator } => {
            println!("[preload]  #{} {}", index, locator);
        }
    }
    Ok(())
}
