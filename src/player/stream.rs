//! Per-item stream handles wrapping the external streaming engine.
//!
//! The engine itself (network, decoding, output) lives outside this crate and
//! is reached through two traits:
//!
//! - [`StreamEngine`] opens one [`Transport`] per playlist item
//! - [`Transport`] is the fire-and-forget control surface for that item
//!
//! Lifecycle events flow back asynchronously as [`StreamEvent`]s through the
//! [`EventSink`] handed to the engine when a transport is opened. Engines may
//! emit from any thread; the controller funnels events onto its own
//! serialized context before touching playlist state.
//!
//! A [`StreamHandle`] opens its transport lazily, reading the shared
//! [`StreamSettings`] (cache directory, volume) through a non-owning
//! back-reference. Once the controller is gone the reference no longer
//! upgrades and the handle refuses to open.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::RwLock;

use super::item::PlaylistItem;
use super::state::StreamPosition;
use crate::error::{Error, Result};

/// Identifier of one stream handle, unique within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Lifecycle event kinds emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventKind {
    /// Resolving the locator (DNS, redirects, playlist files)
    RetrievingLocator,
    /// Filling the playback buffer
    Buffering,
    /// Seek in progress
    Seeking,
    /// Audio is being output
    Playing,
    /// Paused on request
    Paused,
    /// Transport stopped
    Stopped,
    /// The item played to its end
    PlaybackCompleted,
    /// Unrecoverable transport failure
    Failed(String),
    /// All bytes of the item have been received
    EndOfFile,
}

/// An engine event tagged with the handle that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub handle: HandleId,
    pub kind: StreamEventKind,
}

/// Sending half of the event funnel, bound to one handle.
#[derive(Debug, Clone)]
pub struct EventSink {
    handle: HandleId,
    tx: Sender<StreamEvent>,
}

impl EventSink {
    pub(crate) fn new(handle: HandleId, tx: Sender<StreamEvent>) -> Self {
        Self { handle, tx }
    }

    /// Handle this sink reports for.
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Emit an event. Returns `false` once the controller is gone.
    pub fn emit(&self, kind: StreamEventKind) -> bool {
        self.tx
            .send(StreamEvent {
                handle: self.handle,
                kind,
            })
            .is_ok()
    }
}

/// Everything an engine needs to open a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub handle: HandleId,
    pub locator: String,
    /// Per-item cache flag
    pub cache_enabled: bool,
    /// Directory the engine may cache into
    pub cache_directory: Option<PathBuf>,
    /// Output volume to apply, if one was set explicitly
    pub volume: Option<f32>,
}

/// Control surface of one opened item.
///
/// All commands are fire-and-forget: their outcome is observed later through
/// the event sink.
pub trait Transport: Send {
    fn play(&mut self);
    fn pause(&mut self);
    /// Continue a paused transport without restarting it.
    fn resume(&mut self);
    fn stop(&mut self);
    /// Seek to a fraction of the item (0.0 - 1.0).
    fn seek(&mut self, fraction: f32);
    fn set_rate(&mut self, rate: f32);
    fn set_volume(&mut self, volume: f32);
    /// Start buffering ahead of playback.
    fn preload(&mut self);
    fn is_playing(&self) -> bool;
    fn position(&self) -> StreamPosition;
    fn duration(&self) -> Duration;
    fn prebuffered_bytes(&self) -> u64;
    /// Total content length in bytes, 0 when unknown.
    fn content_length(&self) -> u64;
}

/// Factory for transports.
pub trait StreamEngine: Send + Sync {
    /// Open a transport for one item. Must not block on I/O.
    fn open(&self, request: &StreamRequest, events: EventSink) -> Result<Box<dyn Transport>>;
}

/// Configuration shared by every handle of a controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSettings {
    pub cache_directory: Option<PathBuf>,
    /// `Some` once a volume was set explicitly
    pub volume: Option<f32>,
}

/// Engine, settings and event funnel owned by the controller.
pub(crate) struct StreamContext {
    engine: Arc<dyn StreamEngine>,
    settings: RwLock<StreamSettings>,
    events: Sender<StreamEvent>,
}

impl StreamContext {
    pub(crate) fn new(
        engine: Arc<dyn StreamEngine>,
        settings: StreamSettings,
        events: Sender<StreamEvent>,
    ) -> Self {
        Self {
            engine,
            settings: RwLock::new(settings),
            events,
        }
    }

    pub(crate) fn settings(&self) -> StreamSettings {
        self.settings.read().clone()
    }

    pub(crate) fn set_volume(&self, volume: f32) {
        self.settings.write().volume = Some(volume);
    }
}

/// One playlist slot's transport, opened on first use.
pub struct StreamHandle {
    id: HandleId,
    locator: String,
    cache_enabled: bool,
    context: Weak<StreamContext>,
    transport: Option<Box<dyn Transport>>,
}

impl StreamHandle {
    pub(crate) fn new(id: HandleId, item: &dyn PlaylistItem, context: Weak<StreamContext>) -> Self {
        Self {
            id,
            locator: item.locator().to_string(),
            cache_enabled: item.cache_enabled(),
            context,
            transport: None,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Whether the engine transport has been opened.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn open(&mut self) -> Result<&mut Box<dyn Transport>> {
        if self.transport.is_none() {
            let context = self
                .context
                .upgrade()
                .ok_or_else(|| Error::transport(&self.locator, "controller released"))?;
            let settings = context.settings();
            let request = StreamRequest {
                handle: self.id,
                locator: self.locator.clone(),
                cache_enabled: self.cache_enabled,
                cache_directory: settings.cache_directory,
                volume: settings.volume,
            };
            let sink = EventSink::new(self.id, context.events.clone());
            let mut transport = context.engine.open(&request, sink)?;
            if let Some(volume) = request.volume {
                transport.set_volume(volume);
            }
            tracing::debug!("Opened transport {} for {}", self.id, self.locator);
            self.transport = Some(transport);
        }
        // Just populated above
        self.transport
            .as_mut()
            .ok_or_else(|| Error::transport(&self.locator, "transport unavailable"))
    }

    /// Start the transport from the beginning (opening it if needed).
    pub fn play(&mut self) -> Result<()> {
        self.open()?.play();
        Ok(())
    }

    /// Continue a paused transport.
    pub fn resume(&mut self) -> Result<()> {
        self.open()?.resume();
        Ok(())
    }

    pub fn pause(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.pause();
        }
    }

    pub fn stop(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.stop();
        }
    }

    pub fn seek(&mut self, fraction: f32) -> Result<()> {
        self.open()?.seek(fraction);
        Ok(())
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.open()?.set_rate(rate);
        Ok(())
    }

    /// Apply a volume to an already opened transport.
    ///
    /// Unopened handles pick the volume up from the shared settings.
    pub fn set_volume(&mut self, volume: f32) {
        if let Some(transport) = self.transport.as_mut() {
            transport.set_volume(volume);
        }
    }

    pub fn preload(&mut self) -> Result<()> {
        self.open()?.preload();
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_playing())
    }

    pub fn position(&self) -> StreamPosition {
        self.transport
            .as_ref()
            .map(|t| t.position())
            .unwrap_or_default()
    }

    pub fn duration(&self) -> Duration {
        self.transport
            .as_ref()
            .map(|t| t.duration())
            .unwrap_or_default()
    }

    /// `(prebuffered, content_length)` in bytes.
    pub fn buffered_bytes(&self) -> (u64, u64) {
        self.transport
            .as_ref()
            .map(|t| (t.prebuffered_bytes(), t.content_length()))
            .unwrap_or((0, 0))
    }

    /// Stop the transport so it releases the output device.
    pub fn deactivate(&mut self) {
        self.stop();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("locator", &self.locator)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::item::Track;
    use crate::test_utils::{FakeEngine, TransportOp};
    use crossbeam_channel::unbounded;

    fn context(engine: &Arc<FakeEngine>, settings: StreamSettings) -> Arc<StreamContext> {
        let (tx, _rx) = unbounded();
        Arc::new(StreamContext::new(engine.clone(), settings, tx))
    }

    #[test]
    fn test_handle_opens_lazily() {
        let engine = Arc::new(FakeEngine::new());
        let ctx = context(&engine, StreamSettings::default());
        let mut handle = StreamHandle::new(HandleId(1), &Track::new("a"), Arc::downgrade(&ctx));

        assert!(!handle.is_open());
        handle.stop();
        handle.pause();
        assert!(!handle.is_open());
        assert!(engine.calls().is_empty());

        handle.play().unwrap();
        assert!(handle.is_open());
        assert!(handle.is_playing());
        assert_eq!(engine.ops_for(HandleId(1)), vec![TransportOp::Play]);
    }

    #[test]
    fn test_open_request_carries_settings() {
        let engine = Arc::new(FakeEngine::new());
        let settings = StreamSettings {
            cache_directory: Some(PathBuf::from("/tmp/cache")),
            volume: Some(0.4),
        };
        let ctx = context(&engine, settings);
        let mut handle = StreamHandle::new(
            HandleId(9),
            &Track::new("b").uncached(),
            Arc::downgrade(&ctx),
        );
        handle.preload().unwrap();

        let request = engine.request(HandleId(9)).unwrap();
        assert_eq!(request.locator, "b");
        assert!(!request.cache_enabled);
        assert_eq!(request.cache_directory, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(
            engine.ops_for(HandleId(9)),
            vec![TransportOp::SetVolume(0.4), TransportOp::Preload]
        );
    }

    #[test]
    fn test_handle_does_not_outlive_context() {
        let engine = Arc::new(FakeEngine::new());
        let ctx = context(&engine, StreamSettings::default());
        let mut handle = StreamHandle::new(HandleId(2), &Track::new("c"), Arc::downgrade(&ctx));
        drop(ctx);

        let err = handle.play().unwrap_err();
        assert!(matches!(err, Error::TransportFailure { .. }));
        assert!(!handle.is_open());
    }

    #[test]
    fn test_drop_stops_transport() {
        let engine = Arc::new(FakeEngine::new());
        let ctx = context(&engine, StreamSettings::default());
        let mut handle = StreamHandle::new(HandleId(3), &Track::new("d"), Arc::downgrade(&ctx));
        handle.play().unwrap();
        drop(handle);

        assert_eq!(
            engine.ops_for(HandleId(3)),
            vec![TransportOp::Play, TransportOp::Stop]
        );
    }

    #[test]
    fn test_event_sink_tags_handle() {
        let (tx, rx) = unbounded();
        let sink = EventSink::new(HandleId(5), tx);
        assert!(sink.emit(StreamEventKind::Buffering));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.handle, HandleId(5));
        assert_eq!(event.kind, StreamEventKind::Buffering);

        drop(rx);
        assert!(!sink.emit(StreamEventKind::Playing));
    }
}
