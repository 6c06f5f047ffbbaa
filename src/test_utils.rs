//! Test utilities and fixtures for playlist-engine tests.
//!
//! Provides a recording fake streaming engine, a recording audio session and
//! item factories, so controller tests can drive lifecycle events by hand.
//!
//! # Example
//!
//! ```ignore
//! let engine = Arc::new(FakeEngine::new());
//! let ctx = fake_context(&engine);
//! let mut store = PlaylistStore::new(Arc::downgrade(&ctx));
//! store.load(tracks(&["a", "b"]), 0).unwrap();
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::player::item::{SharedItem, Track};
use crate::player::session::{AudioSession, SessionCategory};
use crate::player::StreamPosition;
use crate::player::store::PlaylistStore;
use crate::player::stream::{
    EventSink, HandleId, StreamContext, StreamEngine, StreamEventKind, StreamRequest,
    StreamSettings, Transport,
};

/// A command received by a fake transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportOp {
    Play,
    Pause,
    Resume,
    Stop,
    Seek(f32),
    SetRate(f32),
    SetVolume(f32),
    Preload,
}

#[derive(Debug, Default)]
struct FakeStream {
    request: Option<StreamRequest>,
    sink: Option<EventSink>,
    playing: bool,
    position: StreamPosition,
    duration: Duration,
    prebuffered: u64,
    content_length: u64,
}

#[derive(Debug, Default)]
struct FakeState {
    streams: BTreeMap<HandleId, FakeStream>,
    /// Every transport command in arrival order
    log: Vec<(HandleId, TransportOp)>,
    failing: HashSet<String>,
}

/// Streaming engine that records every command and never emits on its own.
#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// All commands, in order.
    pub fn calls(&self) -> Vec<(HandleId, TransportOp)> {
        self.state.lock().log.clone()
    }

    /// Commands received by one handle's transport.
    pub fn ops_for(&self, id: HandleId) -> Vec<TransportOp> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|(handle, _)| *handle == id)
            .map(|(_, op)| *op)
            .collect()
    }

    /// The request a handle's transport was opened with.
    pub fn request(&self, id: HandleId) -> Option<StreamRequest> {
        self.state.lock().streams.get(&id).and_then(|s| s.request.clone())
    }

    /// Handles whose transport was opened, in id order.
    pub fn opened(&self) -> Vec<HandleId> {
        self.state.lock().streams.keys().copied().collect()
    }

    pub fn is_playing(&self, id: HandleId) -> bool {
        self.state.lock().streams.get(&id).is_some_and(|s| s.playing)
    }

    /// Emit a lifecycle event as the engine would.
    pub fn emit(&self, id: HandleId, kind: StreamEventKind) -> bool {
        let sink = self.state.lock().streams.get(&id).and_then(|s| s.sink.clone());
        sink.is_some_and(|sink| sink.emit(kind))
    }

    pub fn set_buffered(&self, id: HandleId, prebuffered: u64, content_length: u64) {
        let mut state = self.state.lock();
        let stream = state.streams.entry(id).or_default();
        stream.prebuffered = prebuffered;
        stream.content_length = content_length;
    }

    pub fn set_position(&self, id: HandleId, position: StreamPosition) {
        self.state.lock().streams.entry(id).or_default().position = position;
    }

    pub fn set_duration(&self, id: HandleId, duration: Duration) {
        self.state.lock().streams.entry(id).or_default().duration = duration;
    }

    /// Make `open` fail for this locator.
    pub fn fail_locator(&self, locator: &str) {
        self.state.lock().failing.insert(locator.to_string());
    }
}

impl StreamEngine for FakeEngine {
    fn open(&self, request: &StreamRequest, events: EventSink) -> Result<Box<dyn Transport>> {
        let mut state = self.state.lock();
        if state.failing.contains(&request.locator) {
            return Err(Error::transport(&request.locator, "unreachable"));
        }
        let stream = state.streams.entry(request.handle).or_default();
        stream.request = Some(request.clone());
        stream.sink = Some(events);
        Ok(Box::new(FakeTransport {
            id: request.handle,
            state: self.state.clone(),
        }))
    }
}

struct FakeTransport {
    id: HandleId,
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    fn record(&mut self, op: TransportOp) {
        let mut state = self.state.lock();
        state.log.push((self.id, op));
        let stream = state.streams.entry(self.id).or_default();
        match op {
            TransportOp::Play | TransportOp::Resume => stream.playing = true,
            TransportOp::Pause | TransportOp::Stop => stream.playing = false,
            _ => {}
        }
    }

    fn with_stream<T>(&self, f: impl FnOnce(&FakeStream) -> T) -> T {
        let state = self.state.lock();
        match state.streams.get(&self.id) {
            Some(stream) => f(stream),
            None => f(&FakeStream::default()),
        }
    }
}

impl Transport for FakeTransport {
    fn play(&mut self) {
        self.record(TransportOp::Play);
    }

    fn pause(&mut self) {
        self.record(TransportOp::Pause);
    }

    fn resume(&mut self) {
        self.record(TransportOp::Resume);
    }

    fn stop(&mut self) {
        self.record(TransportOp::Stop);
    }

    fn seek(&mut self, fraction: f32) {
        self.record(TransportOp::Seek(fraction));
    }

    fn set_rate(&mut self, rate: f32) {
        self.record(TransportOp::SetRate(rate));
    }

    fn set_volume(&mut self, volume: f32) {
        self.record(TransportOp::SetVolume(volume));
    }

    fn preload(&mut self) {
        self.record(TransportOp::Preload);
    }

    fn is_playing(&self) -> bool {
        self.with_stream(|s| s.playing)
    }

    fn position(&self) -> StreamPosition {
        self.with_stream(|s| s.position)
    }

    fn duration(&self) -> Duration {
        self.with_stream(|s| s.duration)
    }

    fn prebuffered_bytes(&self) -> u64 {
        self.with_stream(|s| s.prebuffered)
    }

    fn content_length(&self) -> u64 {
        self.with_stream(|s| s.content_length)
    }
}

/// A stream context over a fake engine. Events go nowhere.
pub(crate) fn fake_context(engine: &Arc<FakeEngine>) -> Arc<StreamContext> {
    let (tx, _rx) = unbounded();
    Arc::new(StreamContext::new(engine.clone(), StreamSettings::default(), tx))
}

/// Shared tracks, one per locator.
pub fn tracks(locators: &[&str]) -> Vec<SharedItem> {
    locators.iter().map(|l| Track::new(*l).shared()).collect()
}

/// Locators of a store, in order.
pub fn locators(store: &PlaylistStore) -> Vec<String> {
    store.items().iter().map(|i| i.locator().to_string()).collect()
}

/// A call received by [`RecordingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCall {
    Category(SessionCategory),
    Active(bool),
}

/// Audio session that records its calls.
#[derive(Debug, Default)]
pub struct RecordingSession {
    calls: Mutex<Vec<SessionCall>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    /// Last activation state set, `false` if never set.
    pub fn is_active(&self) -> bool {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|c| match c {
                SessionCall::Active(active) => Some(*active),
                SessionCall::Category(_) => None,
            })
            .unwrap_or(false)
    }
}

impl AudioSession for RecordingSession {
    fn set_category(&self, category: SessionCategory) -> Result<()> {
        self.calls.lock().push(SessionCall::Category(category));
        Ok(())
    }

    fn set_active(&self, active: bool) -> Result<()> {
        self.calls.lock().push(SessionCall::Active(active));
        Ok(())
    }
}
