//! Audio session collaborator and OS session signals.
//!
//! The process-wide audio session is a shared OS resource. The controller
//! only talks to it through the injected [`AudioSession`]; hosts implement it
//! on top of the platform API, tests use a recording fake.

use std::fmt;

use crate::error::Result;

/// Audio session category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCategory {
    /// Mixes with other audio, silenced by the ring switch
    Ambient,
    /// Silences other audio, silenced by the ring switch
    SoloAmbient,
    /// Foreground and background playback
    Playback,
}

impl fmt::Display for SessionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ambient => write!(f, "ambient"),
            Self::SoloAmbient => write!(f, "solo-ambient"),
            Self::Playback => write!(f, "playback"),
        }
    }
}

/// Process-wide audio session.
pub trait AudioSession: Send + Sync {
    fn set_category(&self, category: SessionCategory) -> Result<()>;

    /// Activate or deactivate the session. Deactivation lets other apps
    /// resume their audio.
    fn set_active(&self, active: bool) -> Result<()>;
}

/// Session that only logs. Used when the host has no OS session to drive.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSession;

impl AudioSession for LoggingSession {
    fn set_category(&self, category: SessionCategory) -> Result<()> {
        tracing::debug!("Audio session category: {}", category);
        Ok(())
    }

    fn set_active(&self, active: bool) -> Result<()> {
        tracing::debug!("Audio session active: {}", active);
        Ok(())
    }
}

/// Why the audio route changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChangeReason {
    NewDeviceAvailable,
    /// The previous output went away (headphones unplugged)
    OldDeviceUnavailable,
    CategoryChange,
    Override,
    Other,
}

/// Kind of an output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPort {
    Headphones,
    BuiltInSpeaker,
    Bluetooth,
    AirPlay,
    LineOut,
    Other,
}

/// Notifications from the OS audio session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// Another app or a call took the session
    InterruptionBegan,
    /// The interruption is over
    InterruptionEnded { should_resume: bool },
    /// The output route changed; `previous` lists the old outputs
    RouteChanged {
        reason: RouteChangeReason,
        previous: Vec<OutputPort>,
    },
}

/// What the controller does in response to a session signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionResponse {
    Pause,
    Play,
    Stop,
    Ignore,
}

impl SessionSignal {
    /// Map the signal to a playback command.
    ///
    /// Unplugging headphones stops playback so audio never jumps to the
    /// speaker. Only the first previous output is considered.
    pub fn response(&self) -> SessionResponse {
        match self {
            Self::InterruptionBegan => SessionResponse::Pause,
            Self::InterruptionEnded { should_resume: true } => SessionResponse::Play,
            Self::InterruptionEnded { should_resume: false } => SessionResponse::Ignore,
            Self::RouteChanged {
                reason: RouteChangeReason::OldDeviceUnavailable,
                previous,
            } if previous.first() == Some(&OutputPort::Headphones) => SessionResponse::Stop,
            Self::RouteChanged { .. } => SessionResponse::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interruption_responses() {
        assert_eq!(SessionSignal::InterruptionBegan.response(), SessionResponse::Pause);
        assert_eq!(
            SessionSignal::InterruptionEnded { should_resume: true }.response(),
            SessionResponse::Play
        );
        assert_eq!(
            SessionSignal::InterruptionEnded { should_resume: false }.response(),
            SessionResponse::Ignore
        );
    }

    #[test]
    fn test_headphones_unplugged_stops() {
        let unplugged = SessionSignal::RouteChanged {
            reason: RouteChangeReason::OldDeviceUnavailable,
            previous: vec![OutputPort::Headphones],
        };
        assert_eq!(unplugged.response(), SessionResponse::Stop);

        let bluetooth_gone = SessionSignal::RouteChanged {
            reason: RouteChangeReason::OldDeviceUnavailable,
            previous: vec![OutputPort::Bluetooth, OutputPort::Headphones],
        };
        assert_eq!(bluetooth_gone.response(), SessionResponse::Ignore);

        let plugged_in = SessionSignal::RouteChanged {
            reason: RouteChangeReason::NewDeviceAvailable,
            previous: vec![OutputPort::Headphones],
        };
        assert_eq!(plugged_in.response(), SessionResponse::Ignore);

        let no_outputs = SessionSignal::RouteChanged {
            reason: RouteChangeReason::OldDeviceUnavailable,
            previous: vec![],
        };
        assert_eq!(no_outputs.response(), SessionResponse::Ignore);
    }

    #[test]
    fn test_logging_session_never_fails() {
        let session = LoggingSession;
        assert!(session.set_category(SessionCategory::Playback).is_ok());
        assert!(session.set_active(true).is_ok());
        assert_eq!(SessionCategory::SoloAmbient.to_string(), "solo-ambient");
    }
}
