//! Playback controller.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      PlaybackController                          │
//! │   public API, queries, remote commands, session signals          │
//! └───────────────┬──────────────────────────────────────────────────┘
//!                 │ one mutex
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  PlaylistStore · PlaybackStateMachine · ModeResolver · timers    │
//! └───────▲─────────────────────────▲────────────────────────────────┘
//!         │ crossbeam channel       │ weak reference
//! ┌───────┴────────────┐   ┌────────┴─────────┐
//! │  engine threads    │   │  poll timers     │
//! │  (stream events)   │   │  (1 s / 0.5 s)   │
//! └────────────────────┘   └──────────────────┘
//! ```
//!
//! All playlist and state mutation happens under a single lock. Engine
//! events are funneled through a channel and applied either by the host
//! (`pump_events`) or by a background dispatcher (`spawn_event_pump`).
//! Observer callbacks run after the lock is released, so an observer may
//! call back into the controller.

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use parking_lot::{Mutex, RwLock};

use super::item::SharedItem;
use super::machine::{self, Effect, Effects, EventContext, PlayAction, PlaybackStateMachine};
use super::mode::{Direction, ModeResolver, PlayMode};
use super::observer::{PlayerObserver, PreloadCandidate};
use super::remote::{NowPlaying, RemoteCommand};
use super::session::{AudioSession, LoggingSession, SessionCategory, SessionResponse, SessionSignal};
use super::state::{BufferState, PlaybackState};
use super::store::PlaylistStore;
use super::stream::{HandleId, StreamContext, StreamEngine, StreamEvent, StreamSettings};
use super::timer::PollTimer;
use crate::config::Config;
use crate::error::{Error, Result, ResultExt};

/// How often the background pump checks whether its controller is gone.
const PUMP_POLL: Duration = Duration::from_millis(100);

/// An observer notification waiting for the lock to be released.
enum Notification {
    Status(PlaybackState, Option<SharedItem>),
    Progress(Duration, f32),
    TotalTime(Duration),
    BufferProgress(f32),
}

#[derive(Default)]
struct Outbox {
    notes: Vec<Notification>,
    preload: Option<PreloadCandidate>,
}

struct Inner {
    store: PlaylistStore,
    machine: PlaybackStateMachine,
    resolver: ModeResolver,
    mode: PlayMode,
    rate: f32,
    preload_next: bool,
    automatic_session: bool,
    cache_directory: Option<PathBuf>,
    cache_prefix: String,
    progress_timer: Option<PollTimer>,
    buffer_timer: Option<PollTimer>,
    /// Bumped on every start/stop so stale ticks are recognised
    progress_generation: u64,
    buffer_generation: u64,
}

impl Inner {
    fn event_context(&self) -> EventContext {
        EventContext {
            // Wrap-around: any list of two or more always has a next item
            has_next: self.store.len() > 1,
            mode: self.mode,
            preload_enabled: self.preload_next,
        }
    }

    fn current_handle_id(&self) -> Option<HandleId> {
        self.store.current_handle().map(|h| h.id())
    }

    fn next_index(&mut self, direction: Direction) -> Option<usize> {
        let current = self.store.current_index()?;
        self.resolver
            .next_index(self.mode, current, self.store.len(), direction)
    }

    /// Make `index` current and start a new attempt.
    fn select(&mut self, index: usize) -> bool {
        if let Err(e) = self.store.set_current(index) {
            tracing::debug!("Ignored selection: {}", e);
            return false;
        }
        self.store.deactivate_inactive(index);
        self.machine.begin_attempt();
        true
    }

    fn preload_candidate(&mut self) -> Option<PreloadCandidate> {
        let current = self.store.current_index()?;
        let index = self.next_index(Direction::Forward)?;
        if index == current {
            return None;
        }
        Some(PreloadCandidate {
            index,
            handle: self.store.handle(index)?.id(),
            item: self.store.item(index)?.clone(),
        })
    }

    fn stop_progress_timer(&mut self) {
        self.progress_generation += 1;
        if let Some(mut timer) = self.progress_timer.take() {
            timer.stop();
        }
    }

    fn stop_buffer_timer(&mut self) {
        self.buffer_generation += 1;
        if let Some(mut timer) = self.buffer_timer.take() {
            timer.stop();
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    observer: RwLock<Option<Arc<dyn PlayerObserver>>>,
    session: Arc<dyn AudioSession>,
    context: Arc<StreamContext>,
    events: Receiver<StreamEvent>,
    progress_interval: Duration,
    buffer_interval: Duration,
}

impl Shared {
    /// Carry out the effects of a transition, in order.
    fn apply(self: &Arc<Self>, inner: &mut Inner, effects: Effects, out: &mut Outbox) {
        for effect in effects {
            match effect {
                Effect::Notify(state) => {
                    let item = inner.store.current_item().cloned();
                    out.notes.push(Notification::Status(state, item));
                }
                Effect::StartProgressTimer => self.start_progress_timer(inner),
                Effect::StopProgressTimer => inner.stop_progress_timer(),
                Effect::StopBufferTimer => inner.stop_buffer_timer(),
                Effect::ActivateSession => self.activate_session(inner.automatic_session),
                Effect::DeactivateSession => self.deactivate_session(),
                Effect::ReportDuration => {
                    let duration = inner
                        .store
                        .current_handle()
                        .map(|h| h.duration())
                        .unwrap_or_default();
                    out.notes.push(Notification::TotalTime(duration));
                }
                Effect::Advance => {
                    if let Some(next) = inner.next_index(Direction::Forward) {
                        tracing::info!("Advancing to item {}", next);
                        inner.select(next);
                    }
                }
                Effect::PlayCurrent => self.play_current(inner, out),
                Effect::RefreshBuffer => self.sample_buffer(inner, out),
                Effect::RequestPreload => out.preload = inner.preload_candidate(),
            }
        }
    }

    fn handle_event(self: &Arc<Self>, event: StreamEvent) {
        let mut out = Outbox::default();
        {
            let mut inner = self.inner.lock();
            if inner.current_handle_id() != Some(event.handle) {
                tracing::trace!("Ignoring {:?} from inactive {}", event.kind, event.handle);
                return;
            }
            tracing::debug!("{}: {:?}", event.handle, event.kind);
            let ctx = inner.event_context();
            let effects = inner.machine.on_event(&event.kind, ctx);
            self.apply(&mut *inner, effects, &mut out);
        }
        self.deliver(out);
    }

    /// Play (or resume) the current item.
    fn play_current(self: &Arc<Self>, inner: &mut Inner, out: &mut Outbox) {
        if inner.store.current_handle().is_none() {
            return;
        }

        let plan = inner.machine.prepare_play();
        if plan.start_buffer_timer {
            self.start_buffer_timer(inner);
        }

        let rate = inner.rate;
        let Some(handle) = inner.store.current_handle_mut() else {
            return;
        };
        let result = match plan.action {
            PlayAction::Resume => handle.resume(),
            PlayAction::Start => handle.play().and_then(|()| {
                if (rate - 1.0).abs() > f32::EPSILON {
                    handle.set_rate(rate)
                } else {
                    Ok(())
                }
            }),
        };
        if let Err(e) = result {
            self.fail(inner, out, e);
        }
    }

    fn fail(self: &Arc<Self>, inner: &mut Inner, out: &mut Outbox, error: Error) {
        tracing::warn!("Playback failed: {}", error);
        inner.stop_buffer_timer();
        let effects = inner.machine.fail();
        self.apply(inner, effects, out);
    }

    /// Make `index` current and start playing it.
    fn switch_to(self: &Arc<Self>, inner: &mut Inner, index: usize, out: &mut Outbox) -> bool {
        if !inner.select(index) {
            return false;
        }
        let effects = inner.machine.begin_switch();
        self.apply(inner, effects, out);
        self.play_current(inner, out);
        true
    }

    fn sample_buffer(self: &Arc<Self>, inner: &mut Inner, out: &mut Outbox) {
        let (prebuffered, content_length) = inner
            .store
            .current_handle()
            .map(|h| h.buffered_bytes())
            .unwrap_or((0, 0));
        let (progress, effects) = inner.machine.apply_buffer_sample(prebuffered, content_length);
        out.notes.push(Notification::BufferProgress(progress.fraction));
        self.apply(inner, effects, out);
    }

    fn start_progress_timer(self: &Arc<Self>, inner: &mut Inner) {
        inner.stop_progress_timer();
        let generation = inner.progress_generation;
        let weak = Arc::downgrade(self);
        inner.progress_timer = Some(PollTimer::start(
            "progress",
            self.progress_interval,
            move || {
                weak.upgrade()
                    .is_some_and(|shared| shared.progress_tick(generation))
            },
        ));
    }

    fn start_buffer_timer(self: &Arc<Self>, inner: &mut Inner) {
        inner.stop_buffer_timer();
        let generation = inner.buffer_generation;
        let weak = Arc::downgrade(self);
        inner.buffer_timer = Some(PollTimer::start(
            "buffer",
            self.buffer_interval,
            move || {
                weak.upgrade()
                    .is_some_and(|shared| shared.buffer_tick(generation))
            },
        ));
    }

    /// Returns `false` once the tick belongs to a stopped timer.
    fn progress_tick(&self, generation: u64) -> bool {
        let note = {
            let inner = self.inner.lock();
            if inner.progress_generation != generation {
                return false;
            }
            let Some(handle) = inner.store.current_handle() else {
                return true;
            };
            let position = handle.position();
            Notification::Progress(position.elapsed, position.fraction)
        };
        self.deliver(Outbox {
            notes: vec![note],
            preload: None,
        });
        true
    }

    fn buffer_tick(self: &Arc<Self>, generation: u64) -> bool {
        let mut out = Outbox::default();
        let keep_running = {
            let mut inner = self.inner.lock();
            if inner.buffer_generation != generation {
                return false;
            }
            self.sample_buffer(&mut *inner, &mut out);
            inner.buffer_generation == generation
        };
        self.deliver(out);
        keep_running
    }

    fn activate_session(&self, automatic: bool) {
        if automatic && let Err(e) = self.session.set_category(SessionCategory::Playback) {
            tracing::warn!("Failed to set audio session category: {}", e);
        }
        if let Err(e) = self.session.set_active(true) {
            tracing::warn!("Failed to activate audio session: {}", e);
        }
    }

    fn deactivate_session(&self) {
        if let Err(e) = self.session.set_active(false) {
            tracing::warn!("Failed to deactivate audio session: {}", e);
        }
    }

    /// Hand queued notifications to the observer. Must be called without
    /// holding the state lock.
    fn deliver(&self, out: Outbox) {
        if out.notes.is_empty() && out.preload.is_none() {
            return;
        }
        let observer = self.observer.read().clone();

        if let Some(observer) = observer.as_deref() {
            for note in out.notes {
                match note {
                    Notification::Status(state, item) => {
                        observer.on_status_changed(state, item.as_deref())
                    }
                    Notification::Progress(elapsed, fraction) => {
                        observer.on_progress(elapsed, fraction)
                    }
                    Notification::TotalTime(duration) => observer.on_total_time(duration),
                    Notification::BufferProgress(fraction) => observer.on_buffer_progress(fraction),
                }
            }
        }

        if let Some(candidate) = out.preload {
            self.preload(candidate, observer.as_deref());
        }
    }

    fn preload(&self, candidate: PreloadCandidate, observer: Option<&dyn PlayerObserver>) {
        if !observer.is_none_or(|o| o.should_preload(&candidate)) {
            tracing::debug!("Preload of item {} declined", candidate.index);
            return;
        }

        let started = {
            let mut inner = self.inner.lock();
            // The playlist may have changed while the observer was asked
            match inner.store.index_of_handle(candidate.handle) {
                Some(index) => match inner.store.handle_mut(index).map(|h| h.preload()) {
                    Some(Ok(())) => true,
                    Some(Err(e)) => {
                        tracing::warn!("Preload of item {} failed: {}", index, e);
                        false
                    }
                    None => false,
                },
                None => false,
            }
        };

        if started {
            tracing::debug!("Preloading item {} ({})", candidate.index, candidate.handle);
            if let Some(observer) = observer {
                observer.on_preload_started(&candidate);
            }
        }
    }
}

/// Builds a [`PlaybackController`] from a [`Config`] and its collaborators.
pub struct ControllerBuilder {
    engine: Arc<dyn StreamEngine>,
    session: Arc<dyn AudioSession>,
    observer: Option<Arc<dyn PlayerObserver>>,
    config: Config,
}

impl ControllerBuilder {
    pub fn new(engine: Arc<dyn StreamEngine>) -> Self {
        Self {
            engine,
            session: Arc::new(LoggingSession),
            observer: None,
            config: Config::default(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Audio session to drive (defaults to [`LoggingSession`]).
    pub fn session(mut self, session: Arc<dyn AudioSession>) -> Self {
        self.session = session;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PlayerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> PlaybackController {
        let Self {
            engine,
            session,
            observer,
            config,
        } = self;

        let (tx, rx) = unbounded();
        let settings = StreamSettings {
            cache_directory: config.cache.resolved_directory(),
            volume: config.playback.volume.map(clamp_volume),
        };
        let cache_directory = settings.cache_directory.clone();
        let context = Arc::new(StreamContext::new(engine, settings, tx));

        let inner = Inner {
            store: PlaylistStore::new(Arc::downgrade(&context)),
            machine: PlaybackStateMachine::new(),
            resolver: ModeResolver::new(),
            mode: config.playback.mode,
            rate: 1.0,
            preload_next: config.playback.preload_next,
            automatic_session: config.playback.automatic_session_handling,
            cache_directory,
            cache_prefix: config.cache.file_prefix,
            progress_timer: None,
            buffer_timer: None,
            progress_generation: 0,
            buffer_generation: 0,
        };

        PlaybackController {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                observer: RwLock::new(observer),
                session,
                context,
                events: rx,
                progress_interval: config.timers.progress_interval(),
                buffer_interval: config.timers.buffer_interval(),
            }),
        }
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() { 1.0 } else { volume.clamp(0.0, 1.0) }
}

/// Log and swallow the errors a playlist mutation absorbs.
fn absorb(operation: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) if e.is_absorbed() => {
            tracing::debug!("Ignored {}: {}", operation, e);
            false
        }
        Err(e) => {
            tracing::warn!("{} failed: {}", operation, e);
            false
        }
    }
}

/// Playlist-aware playback controller.
///
/// Owns the playlist, one stream handle per item, the playback state
/// machine and both polling timers. Dropping the controller stops the
/// timers, every transport and the audio session.
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    /// Start building a controller around a streaming engine.
    pub fn builder(engine: Arc<dyn StreamEngine>) -> ControllerBuilder {
        ControllerBuilder::new(engine)
    }

    fn with_state<T>(&self, f: impl FnOnce(&Arc<Shared>, &mut Inner, &mut Outbox) -> T) -> T {
        let mut out = Outbox::default();
        let result = {
            let mut inner = self.shared.inner.lock();
            f(&self.shared, &mut *inner, &mut out)
        };
        self.shared.deliver(out);
        result
    }

    /// Apply a playlist mutation, absorbing index errors.
    ///
    /// When the mutation changes which item is current, the other handles
    /// are stopped and a new attempt starts.
    fn mutate(&self, operation: &str, f: impl FnOnce(&mut PlaylistStore) -> Result<()>) -> bool {
        self.with_state(|shared, inner, out| {
            let before = inner.current_handle_id();
            let result = f(&mut inner.store);
            if inner.current_handle_id() != before {
                if let Some(index) = inner.store.current_index() {
                    inner.store.deactivate_inactive(index);
                }
                // The new current handle was never started
                if inner.machine.playback_state() == PlaybackState::None {
                    inner.machine.begin_attempt();
                } else {
                    let effects = inner.machine.halt();
                    shared.apply(inner, effects, out);
                }
            }
            absorb(operation, result)
        })
    }

    /// Register (or clear) the observer.
    pub fn set_observer(&self, observer: Option<Arc<dyn PlayerObserver>>) {
        *self.shared.observer.write() = observer;
    }

    // ========================================================================
    // Playlist
    // ========================================================================

    /// Replace the playlist and start playing `start`.
    ///
    /// An empty list changes nothing. An out-of-range `start` loads the list
    /// without playing. Returns whether playback started.
    pub fn load_and_play(&self, items: Vec<SharedItem>, start: usize) -> bool {
        self.with_state(|shared, inner, out| {
            let count = items.len();
            match inner.store.load(items, start) {
                Ok(true) => {
                    tracing::info!("Loaded {} items, playing {}", count, start);
                    shared.switch_to(inner, start, out)
                }
                Ok(false) => {
                    tracing::debug!("Start index {} out of range for {} items", start, count);
                    let previous = inner.machine.playback_state();
                    if previous != PlaybackState::None && !previous.is_terminal() {
                        let effects = inner.machine.halt();
                        shared.apply(inner, effects, out);
                    } else {
                        inner.machine.begin_attempt();
                    }
                    false
                }
                Err(e) => absorb("load", Err(e)),
            }
        })
    }

    /// Replace the playlist with a single item and play it.
    pub fn play_single(&self, item: SharedItem) -> bool {
        self.load_and_play(vec![item], 0)
    }

    /// Make `index` current and play it.
    pub fn play_item(&self, index: usize) -> bool {
        self.with_state(|shared, inner, out| shared.switch_to(inner, index, out))
    }

    /// Append an item. The first item of an empty playlist becomes current.
    pub fn add_item(&self, item: SharedItem) -> bool {
        self.mutate("add", |store| {
            store.append(item);
            Ok(())
        })
    }

    pub fn insert_item(&self, item: SharedItem, at: usize) -> bool {
        self.mutate("insert", |store| store.insert(item, at))
    }

    pub fn move_item(&self, from: usize, to: usize) -> bool {
        self.mutate("move", |store| store.move_item(from, to))
    }

    /// Replace a non-current item.
    pub fn replace_item(&self, at: usize, item: SharedItem) -> bool {
        self.mutate("replace", |store| store.replace(at, item).map(|_| ()))
    }

    /// Remove an item unless it is current and playing.
    pub fn remove_item(&self, at: usize) -> bool {
        self.mutate("remove", |store| store.remove(at).map(|_| ()))
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Resume when paused, otherwise start the current item from the beginning.
    pub fn play(&self) {
        self.with_state(|shared, inner, out| shared.play_current(inner, out));
    }

    pub fn pause(&self) {
        self.with_state(|_, inner, _| {
            if let Some(handle) = inner.store.current_handle_mut() {
                handle.pause();
            }
        });
    }

    /// Continue the paused transport. Does nothing unless paused.
    pub fn resume(&self) {
        self.with_state(|shared, inner, out| {
            let state = inner.machine.playback_state();
            if state != PlaybackState::Paused {
                tracing::debug!("Ignored resume while {}", state);
                return;
            }
            let Some(handle) = inner.store.current_handle_mut() else {
                return;
            };
            if let Err(e) = handle.resume() {
                shared.fail(inner, out, e);
            }
        });
    }

    pub fn stop(&self) {
        self.with_state(|_, inner, _| {
            inner.stop_buffer_timer();
            if let Some(handle) = inner.store.current_handle_mut() {
                handle.stop();
            }
        });
    }

    /// Advance forward per the play mode. Returns `false` on an empty playlist.
    pub fn next(&self) -> bool {
        self.step(Direction::Forward)
    }

    /// Advance backward per the play mode.
    pub fn previous(&self) -> bool {
        self.step(Direction::Backward)
    }

    fn step(&self, direction: Direction) -> bool {
        self.with_state(|shared, inner, out| match inner.next_index(direction) {
            Some(index) => shared.switch_to(inner, index, out),
            None => false,
        })
    }

    /// Seek the current item to a fraction of its length.
    pub fn set_progress(&self, progress: f32) {
        let target = machine::seek_target(progress);
        self.with_state(|shared, inner, out| {
            let Some(handle) = inner.store.current_handle_mut() else {
                return;
            };
            if let Err(e) = handle.seek(target) {
                shared.fail(inner, out, e);
            }
        });
    }

    /// Set the playback rate. Returns the rate actually applied.
    pub fn set_rate(&self, rate: f32) -> f32 {
        let rate = machine::clamp_rate(rate);
        self.with_state(|_, inner, _| {
            inner.rate = rate;
            if let Some(handle) = inner.store.current_handle_mut()
                && handle.is_open()
                && let Err(e) = handle.set_rate(rate)
            {
                tracing::warn!("Failed to set rate: {}", e);
            }
        });
        rate
    }

    /// Set the output volume. Returns the volume actually applied.
    ///
    /// Open transports change immediately, later ones start at this volume.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.shared.context.set_volume(volume);
        self.with_state(|_, inner, _| {
            for handle in inner.store.handles_mut() {
                handle.set_volume(volume);
            }
        });
        volume
    }

    pub fn set_mode(&self, mode: PlayMode) {
        self.with_state(|_, inner, _| {
            if inner.mode == mode {
                return;
            }
            if mode == PlayMode::Shuffle {
                inner.resolver.reset();
            }
            tracing::info!("Play mode {:?} -> {:?}", inner.mode, mode);
            inner.mode = mode;
        });
    }

    /// Enable or disable preloading of the next item.
    pub fn set_preload_next(&self, enabled: bool) {
        self.shared.inner.lock().preload_next = enabled;
    }

    /// Delete the engine's cache files. Fails while something is playing.
    ///
    /// Returns the number of files removed.
    pub fn clear_cached_files(&self) -> Result<usize> {
        let (directory, prefix) = {
            let inner = self.shared.inner.lock();
            if inner.store.is_current_playing() {
                return Err(Error::CacheBusy);
            }
            (inner.cache_directory.clone(), inner.cache_prefix.clone())
        };

        let Some(directory) = directory else {
            tracing::debug!("No cache directory configured");
            return Ok(0);
        };
        if !directory.exists() {
            return Ok(0);
        }
        if !directory.is_dir() {
            return Err(Error::CacheDir(directory));
        }

        let mut removed = 0;
        let entries = std::fs::read_dir(&directory)
            .with_context(format!("reading cache directory {}", directory.display()))?;
        for entry in entries {
            let entry = entry.with_context("reading cache entry")?;
            if !entry.file_name().to_string_lossy().starts_with(&prefix) {
                continue;
            }
            let path = entry.path();
            if path.is_file() {
                std::fs::remove_file(&path)
                    .with_context(format!("removing {}", path.display()))?;
                removed += 1;
            }
        }

        tracing::info!("Removed {} cached files from {:?}", removed, directory);
        Ok(removed)
    }

    // ========================================================================
    // Events and OS integration
    // ========================================================================

    /// Apply one engine event. Events from non-current handles are ignored.
    pub fn handle_event(&self, event: StreamEvent) {
        self.shared.handle_event(event);
    }

    /// Apply every queued engine event. Returns how many were handled.
    pub fn pump_events(&self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.shared.events.try_recv() {
            self.shared.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Apply engine events on a background thread until the controller is dropped.
    pub fn spawn_event_pump(&self) -> Result<thread::JoinHandle<()>> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let events = self.shared.events.clone();

        thread::Builder::new()
            .name("event-pump".to_string())
            .spawn(move || {
                loop {
                    match events.recv_timeout(PUMP_POLL) {
                        Ok(event) => match weak.upgrade() {
                            Some(shared) => shared.handle_event(event),
                            None => break,
                        },
                        Err(RecvTimeoutError::Timeout) => {
                            if weak.strong_count() == 0 {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("Event pump finished");
            })
            .with_context("spawning event pump")
    }

    /// React to an interruption or route change.
    pub fn handle_session_signal(&self, signal: &SessionSignal) {
        tracing::debug!("Session signal: {:?}", signal);
        match signal.response() {
            SessionResponse::Pause => self.pause(),
            SessionResponse::Play => self.play(),
            SessionResponse::Stop => self.stop(),
            SessionResponse::Ignore => {}
        }
    }

    /// Execute a command from the OS remote-control surface.
    pub fn handle_remote_command(&self, command: RemoteCommand) {
        tracing::debug!("Remote command: {:?}", command);
        match command {
            RemoteCommand::Play => self.play(),
            RemoteCommand::Pause => self.pause(),
            RemoteCommand::TogglePlayPause => {
                if self.is_playing() {
                    self.pause();
                } else {
                    self.play();
                }
            }
            RemoteCommand::Next => {
                self.next();
            }
            RemoteCommand::Previous => {
                self.previous();
            }
            RemoteCommand::ChangePosition(position) => {
                let duration = self.duration();
                if duration.is_zero() {
                    tracing::debug!("Ignoring position change: duration unknown");
                    return;
                }
                self.set_progress((position.as_secs_f64() / duration.as_secs_f64()) as f32);
            }
        }
    }

    /// Snapshot for the OS now-playing display.
    pub fn now_playing(&self) -> Option<NowPlaying> {
        let inner = self.shared.inner.lock();
        let item = inner.store.current_item()?;
        let handle = inner.store.current_handle()?;
        let position = handle.position();
        let rate = if inner.machine.playback_state() == PlaybackState::Playing {
            inner.rate
        } else {
            0.0
        };
        Some(
            NowPlaying::for_item(item.as_ref())
                .timing(position.elapsed, handle.duration())
                .rate(rate),
        )
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn len(&self) -> usize {
        self.shared.inner.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.inner.lock().store.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.shared.inner.lock().store.current_index()
    }

    pub fn current_item(&self) -> Option<SharedItem> {
        self.shared.inner.lock().store.current_item().cloned()
    }

    pub fn items(&self) -> Vec<SharedItem> {
        self.shared.inner.lock().store.items().to_vec()
    }

    pub fn has_multiple_items(&self) -> bool {
        self.len() > 1
    }

    /// Next is always available with two or more items (wrap-around).
    pub fn has_next(&self) -> bool {
        self.has_multiple_items()
    }

    pub fn has_previous(&self) -> bool {
        self.has_multiple_items()
    }

    /// Whether the current transport reports playing.
    pub fn is_playing(&self) -> bool {
        self.shared.inner.lock().store.is_current_playing()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.shared.inner.lock().machine.playback_state()
    }

    pub fn buffer_state(&self) -> BufferState {
        self.shared.inner.lock().machine.buffer_state()
    }

    pub fn mode(&self) -> PlayMode {
        self.shared.inner.lock().mode
    }

    pub fn rate(&self) -> f32 {
        self.shared.inner.lock().rate
    }

    /// Explicitly set volume, if any.
    pub fn volume(&self) -> Option<f32> {
        self.shared.context.settings().volume
    }

    /// Duration of the current item (zero while unknown).
    pub fn duration(&self) -> Duration {
        self.shared
            .inner
            .lock()
            .store
            .current_handle()
            .map(|h| h.duration())
            .unwrap_or_default()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.stop_progress_timer();
            inner.stop_buffer_timer();
            inner.store.deactivate_all();
        }
        self.shared.deactivate_session();
        tracing::debug!("Playback controller released");
    }
}
