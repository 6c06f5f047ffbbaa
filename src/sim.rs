//! Simulated streaming engine.
//!
//! Drives each transport from a worker thread that advances a virtual clock,
//! so the controller can be exercised end-to-end without network or audio
//! output. Used by the `simulate` command and by tests.
//!
//! Locators starting with `fail:` open normally but report a failure as soon
//! as they are played.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::player::{
    EventSink, StreamEngine, StreamEventKind, StreamPosition, StreamRequest, Transport,
};

/// Timing of simulated streams.
#[derive(Debug, Clone, PartialEq)]
pub struct SimProfile {
    /// Media length of every item
    pub track_length: Duration,
    /// Size of every item in bytes
    pub content_length: u64,
    /// Wall-clock time between worker steps
    pub tick: Duration,
    /// Media time played per step at rate 1.0
    pub step: Duration,
    /// Bytes received per step while loading
    pub bytes_per_tick: u64,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            track_length: Duration::from_secs(5),
            content_length: 1_000_000,
            tick: Duration::from_millis(50),
            step: Duration::from_millis(250),
            bytes_per_tick: 100_000,
        }
    }
}

/// Engine whose transports play virtual streams.
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    profile: SimProfile,
}

impl SimulatedEngine {
    pub fn new(profile: SimProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SimProfile {
        &self.profile
    }
}

impl StreamEngine for SimulatedEngine {
    fn open(&self, request: &StreamRequest, events: EventSink) -> Result<Box<dyn Transport>> {
        let state = Arc::new(Mutex::new(SimState::default()));
        let (cmd_tx, cmd_rx) = unbounded();
        let worker = Worker {
            profile: self.profile.clone(),
            failing: request.locator.starts_with("fail:"),
            state: state.clone(),
            events,
        };

        thread::Builder::new()
            .name(format!("sim-{}", request.handle.0))
            .spawn(move || worker.run(cmd_rx))
            .map_err(|e| Error::transport(&request.locator, e.to_string()))?;

        tracing::debug!("Simulating {} as {}", request.locator, request.handle);
        Ok(Box::new(SimTransport {
            commands: cmd_tx,
            state,
            profile: self.profile.clone(),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Play,
    Pause,
    Resume,
    Stop,
    Seek(f32),
    SetRate(f32),
    Preload,
}

#[derive(Debug, Default)]
struct SimState {
    playing: bool,
    loading: bool,
    elapsed: Duration,
    received: u64,
    rate: f32,
}

struct Worker {
    profile: SimProfile,
    failing: bool,
    state: Arc<Mutex<SimState>>,
    events: EventSink,
}

impl Worker {
    fn run(self, commands: Receiver<Command>) {
        let ticker = tick(self.profile.tick);
        let mut eof_sent = false;
        loop {
            select! {
                recv(commands) -> cmd => match cmd {
                    Ok(cmd) => self.command(cmd),
                    // Transport dropped
                    Err(_) => break,
                },
                recv(ticker) -> _ => self.step(&mut eof_sent),
            }
        }
    }

    fn command(&self, cmd: Command) {
        let mut emitted = Vec::new();
        {
            let mut state = self.state.lock();
            match cmd {
                Command::Play => {
                    if self.failing {
                        state.playing = false;
                        emitted.push(StreamEventKind::RetrievingLocator);
                        emitted.push(StreamEventKind::Failed("simulated failure".into()));
                    } else {
                        state.elapsed = Duration::ZERO;
                        state.playing = true;
                        state.loading = true;
                        emitted.push(StreamEventKind::RetrievingLocator);
                        emitted.push(StreamEventKind::Buffering);
                        emitted.push(StreamEventKind::Playing);
                    }
                }
                Command::Pause => {
                    state.playing = false;
                    emitted.push(StreamEventKind::Paused);
                }
                Command::Resume => {
                    state.playing = true;
                    emitted.push(StreamEventKind::Playing);
                }
                Command::Stop => {
                    state.playing = false;
                    state.loading = false;
                    emitted.push(StreamEventKind::Stopped);
                }
                Command::Seek(fraction) => {
                    state.elapsed = self.profile.track_length.mul_f32(fraction.clamp(0.0, 1.0));
                    emitted.push(StreamEventKind::Seeking);
                    if state.playing {
                        emitted.push(StreamEventKind::Playing);
                    }
                }
                Command::SetRate(rate) => state.rate = rate,
                Command::Preload => state.loading = true,
            }
        }
        for kind in emitted {
            self.events.emit(kind);
        }
    }

    fn step(&self, eof_sent: &mut bool) {
        let mut emitted = Vec::new();
        {
            let mut state = self.state.lock();
            if state.loading && state.received < self.profile.content_length {
                state.received = (state.received + self.profile.bytes_per_tick)
                    .min(self.profile.content_length);
                if state.received == self.profile.content_length && !*eof_sent {
                    *eof_sent = true;
                    emitted.push(StreamEventKind::EndOfFile);
                }
            }
            if state.playing {
                let rate = if state.rate > 0.0 { state.rate } else { 1.0 };
                state.elapsed += self.profile.step.mul_f32(rate);
                if state.elapsed >= self.profile.track_length {
                    state.elapsed = self.profile.track_length;
                    state.playing = false;
                    emitted.push(StreamEventKind::PlaybackCompleted);
                }
            }
        }
        for kind in emitted {
            self.events.emit(kind);
        }
    }
}

struct SimTransport {
    commands: Sender<Command>,
    state: Arc<Mutex<SimState>>,
    profile: SimProfile,
}

impl SimTransport {
    fn send(&self, cmd: Command) {
        // Worker gone: nothing left to control
        let _ = self.commands.send(cmd);
    }
}

impl Transport for SimTransport {
    fn play(&mut self) {
        self.state.lock().playing = true;
        self.send(Command::Play);
    }

    fn pause(&mut self) {
        self.state.lock().playing = false;
        self.send(Command::Pause);
    }

    fn resume(&mut self) {
        self.state.lock().playing = true;
        self.send(Command::Resume);
    }

    fn stop(&mut self) {
        self.state.lock().playing = false;
        self.send(Command::Stop);
    }

    fn seek(&mut self, fraction: f32) {
        self.send(Command::Seek(fraction));
    }

    fn set_rate(&mut self, rate: f32) {
        self.send(Command::SetRate(rate));
    }

    fn set_volume(&mut self, volume: f32) {
        tracing::trace!("Simulated volume {}", volume);
    }

    fn preload(&mut self) {
        self.send(Command::Preload);
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn position(&self) -> StreamPosition {
        let elapsed = self.state.lock().elapsed;
        let total = self.profile.track_length.as_secs_f32();
        let fraction = if total > 0.0 {
            elapsed.as_secs_f32() / total
        } else {
            0.0
        };
        StreamPosition::new(elapsed, fraction)
    }

    fn duration(&self) -> Duration {
        self.profile.track_length
    }

    fn prebuffered_bytes(&self) -> u64 {
        self.state.lock().received
    }

    fn content_length(&self) -> u64 {
        self.profile.content_length
    }
}
