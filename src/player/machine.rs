//! Playback state machine.
//!
//! Consumes stream lifecycle events and buffer samples and derives the
//! externally visible [`PlaybackState`] and [`BufferState`]. The machine does
//! no I/O itself: every transition returns a list of [`Effect`]s that the
//! controller carries out in order (timers, audio session, observer
//! notifications, auto-advance, preload). That keeps the transition table
//! testable without a clock or an engine.
//!
//! ```text
//! retrieving-locator ─▶ Loading
//! buffering          ─▶ Buffering        (activate session)
//! playing            ─▶ Playing          (start progress timer, report duration once)
//! paused             ─▶ Paused           (stop progress timer)
//! stopped            ─▶ Stopped          (unless switching or already Ended)
//! completed + next   ─▶ SwitchingTrack   (advance, play new current)
//! completed, no next ─▶ Ended
//! failed             ─▶ Error            (deactivate session)
//! end-of-file        ─▶ (unchanged)      (final buffer sample, maybe preload)
//! ```

use smallvec::{SmallVec, smallvec};

use super::mode::PlayMode;
use super::state::{BufferState, PlaybackState};
use super::stream::StreamEventKind;

/// Ratio above which buffering snaps to done.
pub const BUFFER_SNAP_THRESHOLD: f32 = 0.9;

/// Slowest and fastest playback rate.
pub const RATE_RANGE: (f32, f32) = (0.5, 2.0);

/// Seek fraction handed to the transport for a requested progress.
///
/// Engines misbehave at the exact ends of a stream, so 0 and 1 are nudged
/// just inside.
pub fn seek_target(progress: f32) -> f32 {
    let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    if progress <= 0.0 {
        0.001
    } else if progress >= 1.0 {
        0.999
    } else {
        progress
    }
}

/// Clamp a playback rate into [`RATE_RANGE`].
pub fn clamp_rate(rate: f32) -> f32 {
    let (min, max) = RATE_RANGE;
    if rate.is_nan() { 1.0 } else { rate.clamp(min, max) }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Tell the observer about the (new) playback state
    Notify(PlaybackState),
    StartProgressTimer,
    StopProgressTimer,
    StopBufferTimer,
    /// Activate the audio session (setting the category first when automatic)
    ActivateSession,
    DeactivateSession,
    /// Report the current item's total duration
    ReportDuration,
    /// Move the current index per the play mode and start a new attempt
    Advance,
    /// Start the (new) current item from the beginning
    PlayCurrent,
    /// Take one buffer sample now
    RefreshBuffer,
    /// Offer the next item for preloading
    RequestPreload,
}

/// Effects of one transition, in execution order.
pub type Effects = SmallVec<[Effect; 4]>;

/// Facts about the playlist the transitions depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext {
    /// Whether an advance would reach another item
    pub has_next: bool,
    pub mode: PlayMode,
    /// Preload the next item once the current one is fully received
    pub preload_enabled: bool,
}

/// How `play()` should drive the current transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayAction {
    /// Continue the paused transport
    Resume,
    /// Start the transport fresh
    Start,
}

/// Outcome of `prepare_play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayPlan {
    pub action: PlayAction,
    /// Buffering is not finished: (re)start the buffer timer
    pub start_buffer_timer: bool,
}

/// One buffer sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferProgress {
    /// Reported fraction (snapped to exactly 1.0 when done)
    pub fraction: f32,
    pub state: BufferState,
}

/// Derive buffer progress from byte counts.
///
/// Byte ratios rarely reach exactly 1.0, so anything above
/// [`BUFFER_SNAP_THRESHOLD`] that rounds to 1 is reported as done.
pub fn buffer_progress(prebuffered: u64, content_length: u64) -> BufferProgress {
    let raw = if content_length > 0 {
        prebuffered as f32 / content_length as f32
    } else {
        0.0
    };

    if raw > BUFFER_SNAP_THRESHOLD && raw.round() >= 1.0 {
        BufferProgress {
            fraction: 1.0,
            state: BufferState::Finished,
        }
    } else {
        BufferProgress {
            fraction: raw,
            state: BufferState::Buffering,
        }
    }
}

/// Playback and buffer state of the current item.
#[derive(Debug, Clone, Default)]
pub struct PlaybackStateMachine {
    playback: PlaybackState,
    buffer: BufferState,
    /// An advance is underway; a `stopped` event is not a user stop
    switch_in_progress: bool,
    /// Total duration was reported for this attempt
    duration_reported: bool,
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    pub fn buffer_state(&self) -> BufferState {
        self.buffer
    }

    pub fn is_switching(&self) -> bool {
        self.switch_in_progress
    }

    fn enter(&mut self, state: PlaybackState) {
        if self.playback != state {
            tracing::debug!("Playback state {} -> {}", self.playback, state);
        }
        self.playback = state;
    }

    /// Apply one lifecycle event of the current stream.
    pub fn on_event(&mut self, kind: &StreamEventKind, ctx: EventContext) -> Effects {
        match kind {
            StreamEventKind::RetrievingLocator => {
                self.enter(PlaybackState::Loading);
                smallvec![Effect::Notify(PlaybackState::Loading)]
            }
            StreamEventKind::Buffering => {
                self.switch_in_progress = false;
                if self.buffer != BufferState::Finished {
                    self.buffer = BufferState::Buffering;
                }
                self.enter(PlaybackState::Buffering);
                smallvec![
                    Effect::ActivateSession,
                    Effect::Notify(PlaybackState::Buffering)
                ]
            }
            StreamEventKind::Seeking => Effects::new(),
            StreamEventKind::Playing => {
                let mut effects = Effects::new();
                if !self.duration_reported {
                    self.duration_reported = true;
                    effects.push(Effect::ReportDuration);
                }
                if self.playback != PlaybackState::Playing {
                    self.enter(PlaybackState::Playing);
                    effects.push(Effect::StartProgressTimer);
                    effects.push(Effect::Notify(PlaybackState::Playing));
                }
                effects
            }
            StreamEventKind::Paused => {
                self.enter(PlaybackState::Paused);
                smallvec![
                    Effect::StopProgressTimer,
                    Effect::Notify(PlaybackState::Paused)
                ]
            }
            StreamEventKind::Stopped => {
                if self.switch_in_progress || self.playback == PlaybackState::Ended {
                    return Effects::new();
                }
                self.enter(PlaybackState::Stopped);
                smallvec![
                    Effect::StopProgressTimer,
                    Effect::DeactivateSession,
                    Effect::Notify(PlaybackState::Stopped)
                ]
            }
            StreamEventKind::PlaybackCompleted => {
                if ctx.has_next || ctx.mode == PlayMode::RepeatOne {
                    self.switch_in_progress = true;
                    self.enter(PlaybackState::SwitchingTrack);
                    smallvec![
                        Effect::StopProgressTimer,
                        Effect::Advance,
                        Effect::Notify(PlaybackState::SwitchingTrack),
                        Effect::PlayCurrent
                    ]
                } else {
                    self.enter(PlaybackState::Ended);
                    smallvec![
                        Effect::StopProgressTimer,
                        Effect::DeactivateSession,
                        Effect::Notify(PlaybackState::Ended)
                    ]
                }
            }
            StreamEventKind::Failed(reason) => {
                tracing::warn!("Stream failed: {}", reason);
                self.fail()
            }
            StreamEventKind::EndOfFile => {
                let mut effects: Effects = smallvec![Effect::RefreshBuffer, Effect::StopBufferTimer];
                if ctx.preload_enabled && ctx.has_next {
                    effects.push(Effect::RequestPreload);
                }
                effects
            }
        }
    }

    /// Enter `Error` after a transport failure.
    pub fn fail(&mut self) -> Effects {
        self.switch_in_progress = false;
        self.enter(PlaybackState::Error);
        smallvec![
            Effect::StopProgressTimer,
            Effect::DeactivateSession,
            Effect::Notify(PlaybackState::Error)
        ]
    }

    /// Return to `Stopped` after the playlist was replaced without
    /// starting playback.
    pub fn halt(&mut self) -> Effects {
        self.switch_in_progress = false;
        self.begin_attempt();
        self.enter(PlaybackState::Stopped);
        smallvec![
            Effect::StopProgressTimer,
            Effect::StopBufferTimer,
            Effect::DeactivateSession,
            Effect::Notify(PlaybackState::Stopped)
        ]
    }

    /// Start a new attempt (the current item changed).
    pub fn begin_attempt(&mut self) {
        self.buffer = BufferState::None;
        self.duration_reported = false;
    }

    /// Enter `SwitchingTrack` for a user-requested advance.
    pub fn begin_switch(&mut self) -> Effects {
        self.switch_in_progress = true;
        self.enter(PlaybackState::SwitchingTrack);
        smallvec![
            Effect::StopProgressTimer,
            Effect::Notify(PlaybackState::SwitchingTrack)
        ]
    }

    /// Decide how `play()` drives the transport.
    ///
    /// A paused transport is resumed, anything else starts fresh. Unless
    /// buffering already finished for this attempt, the buffer state resets
    /// and the buffer timer must be (re)started.
    pub fn prepare_play(&mut self) -> PlayPlan {
        let action = if self.playback == PlaybackState::Paused {
            PlayAction::Resume
        } else {
            PlayAction::Start
        };
        let start_buffer_timer = self.buffer != BufferState::Finished;
        if start_buffer_timer {
            self.buffer = BufferState::None;
        }
        PlayPlan {
            action,
            start_buffer_timer,
        }
    }

    /// Fold one buffer sample into the buffer state.
    pub fn apply_buffer_sample(&mut self, prebuffered: u64, content_length: u64) -> (BufferProgress, Effects) {
        if self.buffer == BufferState::Finished {
            let done = BufferProgress {
                fraction: 1.0,
                state: BufferState::Finished,
            };
            return (done, smallvec![Effect::StopBufferTimer]);
        }

        let progress = buffer_progress(prebuffered, content_length);
        self.buffer = progress.state;
        let effects = if progress.state == BufferState::Finished {
            tracing::debug!("Buffering finished");
            smallvec![Effect::StopBufferTimer]
        } else {
            Effects::new()
        };
        (progress, effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(has_next: bool, mode: PlayMode) -> EventContext {
        EventContext {
            has_next,
            mode,
            preload_enabled: true,
        }
    }

    fn loop_ctx() -> EventContext {
        ctx(true, PlayMode::SequentialLoop)
    }

    #[test]
    fn test_loading_and_buffering() {
        let mut m = PlaybackStateMachine::new();
        let fx = m.on_event(&StreamEventKind::RetrievingLocator, loop_ctx());
        assert_eq!(m.playback_state(), PlaybackState::Loading);
        assert_eq!(fx.as_slice(), &[Effect::Notify(PlaybackState::Loading)]);

        let fx = m.on_event(&StreamEventKind::Buffering, loop_ctx());
        assert_eq!(m.playback_state(), PlaybackState::Buffering);
        assert_eq!(m.buffer_state(), BufferState::Buffering);
        assert_eq!(
            fx.as_slice(),
            &[Effect::ActivateSession, Effect::Notify(PlaybackState::Buffering)]
        );
    }

    #[test]
    fn test_seeking_changes_nothing() {
        let mut m = PlaybackStateMachine::new();
        m.on_event(&StreamEventKind::Playing, loop_ctx());
        let fx = m.on_event(&StreamEventKind::Seeking, loop_ctx());
        assert!(fx.is_empty());
        assert_eq!(m.playback_state(), PlaybackState::Playing);
    }

    #[test]
    fn test_playing_reports_duration_once() {
        let mut m = PlaybackStateMachine::new();
        let fx = m.on_event(&StreamEventKind::Playing, loop_ctx());
        assert_eq!(
            fx.as_slice(),
            &[
                Effect::ReportDuration,
                Effect::StartProgressTimer,
                Effect::Notify(PlaybackState::Playing)
            ]
        );

        // Repeated confirmation: no timer restart, no second duration
        let fx = m.on_event(&StreamEventKind::Playing, loop_ctx());
        assert!(fx.is_empty());

        // After a pause the timer restarts but duration is not re-reported
        m.on_event(&StreamEventKind::Paused, loop_ctx());
        let fx = m.on_event(&StreamEventKind::Playing, loop_ctx());
        assert_eq!(
            fx.as_slice(),
            &[Effect::StartProgressTimer, Effect::Notify(PlaybackState::Playing)]
        );

        m.begin_attempt();
        let fx = m.on_event(&StreamEventKind::Playing, loop_ctx());
        assert!(fx.contains(&Effect::ReportDuration));
    }

    #[test]
    fn test_pause_stops_progress_timer() {
        let mut m = PlaybackStateMachine::new();
        m.on_event(&StreamEventKind::Playing, loop_ctx());
        let fx = m.on_event(&StreamEventKind::Paused, loop_ctx());
        assert_eq!(m.playback_state(), PlaybackState::Paused);
        assert_eq!(
            fx.as_slice(),
            &[Effect::StopProgressTimer, Effect::Notify(PlaybackState::Paused)]
        );
    }

    #[test]
    fn test_stopped_unless_switching() {
        let mut m = PlaybackStateMachine::new();
        m.on_event(&StreamEventKind::Playing, loop_ctx());
        let fx = m.on_event(&StreamEventKind::Stopped, loop_ctx());
        assert_eq!(m.playback_state(), PlaybackState::Stopped);
        assert!(fx.contains(&Effect::DeactivateSession));

        let mut m = PlaybackStateMachine::new();
        m.begin_switch();
        let fx = m.on_event(&StreamEventKind::Stopped, loop_ctx());
        assert!(fx.is_empty());
        assert_eq!(m.playback_state(), PlaybackState::SwitchingTrack);

        // Buffering of the new item clears the switch flag
        m.on_event(&StreamEventKind::Buffering, loop_ctx());
        assert!(!m.is_switching());
        m.on_event(&StreamEventKind::Stopped, loop_ctx());
        assert_eq!(m.playback_state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_completed_advances() {
        let mut m = PlaybackStateMachine::new();
        m.on_event(&StreamEventKind::Playing, loop_ctx());
        let fx = m.on_event(&StreamEventKind::PlaybackCompleted, loop_ctx());
        assert_eq!(m.playback_state(), PlaybackState::SwitchingTrack);
        assert!(m.is_switching());
        assert_eq!(
            fx.as_slice(),
            &[
                Effect::StopProgressTimer,
                Effect::Advance,
                Effect::Notify(PlaybackState::SwitchingTrack),
                Effect::PlayCurrent
            ]
        );
    }

    #[test]
    fn test_completed_repeat_one_single_item() {
        let mut m = PlaybackStateMachine::new();
        let fx = m.on_event(&StreamEventKind::PlaybackCompleted, ctx(false, PlayMode::RepeatOne));
        assert!(fx.contains(&Effect::Advance));
        assert_eq!(m.playback_state(), PlaybackState::SwitchingTrack);
    }

    #[test]
    fn test_completed_without_next_ends() {
        let mut m = PlaybackStateMachine::new();
        m.on_event(&StreamEventKind::Playing, loop_ctx());
        let fx = m.on_event(&StreamEventKind::PlaybackCompleted, ctx(false, PlayMode::SequentialLoop));
        assert_eq!(m.playback_state(), PlaybackState::Ended);
        assert!(!fx.contains(&Effect::Advance));

        // The trailing stop keeps Ended
        let fx = m.on_event(&StreamEventKind::Stopped, loop_ctx());
        assert!(fx.is_empty());
        assert_eq!(m.playback_state(), PlaybackState::Ended);
    }

    #[test]
    fn test_failed_enters_error() {
        let mut m = PlaybackStateMachine::new();
        m.begin_switch();
        let fx = m.on_event(&StreamEventKind::Failed("404".into()), loop_ctx());
        assert_eq!(m.playback_state(), PlaybackState::Error);
        assert!(!m.is_switching());
        assert!(fx.contains(&Effect::DeactivateSession));
        assert!(fx.contains(&Effect::Notify(PlaybackState::Error)));
    }

    #[test]
    fn test_end_of_file_preload() {
        let mut m = PlaybackStateMachine::new();
        m.on_event(&StreamEventKind::Playing, loop_ctx());
        let fx = m.on_event(&StreamEventKind::EndOfFile, loop_ctx());
        assert_eq!(m.playback_state(), PlaybackState::Playing);
        assert_eq!(
            fx.as_slice(),
            &[Effect::RefreshBuffer, Effect::StopBufferTimer, Effect::RequestPreload]
        );

        let no_preload = EventContext {
            preload_enabled: false,
            ..loop_ctx()
        };
        let fx = m.on_event(&StreamEventKind::EndOfFile, no_preload);
        assert!(!fx.contains(&Effect::RequestPreload));

        let fx = m.on_event(&StreamEventKind::EndOfFile, ctx(false, PlayMode::SequentialLoop));
        assert!(!fx.contains(&Effect::RequestPreload));
    }

    #[test]
    fn test_buffer_snap() {
        let p = buffer_progress(95, 100);
        assert_eq!(p.fraction, 1.0);
        assert_eq!(p.state, BufferState::Finished);

        let p = buffer_progress(90, 100);
        assert!((p.fraction - 0.9).abs() < 1e-6);
        assert_eq!(p.state, BufferState::Buffering);

        let p = buffer_progress(10, 0);
        assert_eq!(p.fraction, 0.0);
        assert_eq!(p.state, BufferState::Buffering);
    }

    #[test]
    fn test_buffer_state_is_monotonic() {
        let mut m = PlaybackStateMachine::new();
        let (p, fx) = m.apply_buffer_sample(50, 100);
        assert_eq!(p.state, BufferState::Buffering);
        assert!(fx.is_empty());

        let (p, fx) = m.apply_buffer_sample(95, 100);
        assert_eq!(p.fraction, 1.0);
        assert_eq!(fx.as_slice(), &[Effect::StopBufferTimer]);

        // A late sample cannot pull it back
        let (p, _) = m.apply_buffer_sample(10, 100);
        assert_eq!(p.state, BufferState::Finished);
        m.on_event(&StreamEventKind::Buffering, loop_ctx());
        assert_eq!(m.buffer_state(), BufferState::Finished);

        m.begin_attempt();
        assert_eq!(m.buffer_state(), BufferState::None);
    }

    #[test]
    fn test_halt() {
        let mut m = PlaybackStateMachine::new();
        m.on_event(&StreamEventKind::Playing, loop_ctx());
        m.apply_buffer_sample(100, 100);
        let fx = m.halt();
        assert_eq!(m.playback_state(), PlaybackState::Stopped);
        assert_eq!(m.buffer_state(), BufferState::None);
        assert_eq!(fx.last(), Some(&Effect::Notify(PlaybackState::Stopped)));
    }

    #[test]
    fn test_seek_boundaries() {
        assert_eq!(seek_target(0.0), 0.001);
        assert_eq!(seek_target(1.0), 0.999);
        assert_eq!(seek_target(-3.0), 0.001);
        assert_eq!(seek_target(7.5), 0.999);
        assert_eq!(seek_target(0.25), 0.25);
    }

    #[test]
    fn test_rate_clamp() {
        assert_eq!(clamp_rate(0.1), 0.5);
        assert_eq!(clamp_rate(3.0), 2.0);
        assert_eq!(clamp_rate(1.25), 1.25);
        assert_eq!(clamp_rate(f32::NAN), 1.0);
    }

    #[test]
    fn test_prepare_play() {
        let mut m = PlaybackStateMachine::new();
        let plan = m.prepare_play();
        assert_eq!(plan.action, PlayAction::Start);
        assert!(plan.start_buffer_timer);

        m.on_event(&StreamEventKind::Paused, loop_ctx());
        m.apply_buffer_sample(100, 100);
        let plan = m.prepare_play();
        assert_eq!(plan.action, PlayAction::Resume);
        assert!(!plan.start_buffer_timer);
        assert_eq!(m.buffer_state(), BufferState::Finished);

        m.on_event(&StreamEventKind::Stopped, loop_ctx());
        assert_eq!(m.prepare_play().action, PlayAction::Start);
    }
}
