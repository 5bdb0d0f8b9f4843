use chrono::Duration;
use thiserror::Error;

use crate::Timestamp;

/// The playback state of a room's clock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// No song is active
    #[default]
    Idle,
    Playing {
        /// When playback last started or resumed
        started_at: Timestamp,
    },
    Paused {
        /// When playback was paused
        paused_at: Timestamp,
    },
}

impl ClockState {
    pub fn name(&self) -> &'static str {
        match self {
            ClockState::Idle => "idle",
            ClockState::Playing { .. } => "playing",
            ClockState::Paused { .. } => "paused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

/// Derives how much of the active song has played from wall clock timestamps.
///
/// The clock never reads the time itself, every operation is given `now`.
/// Elapsed time is accumulated in `current_duration` whenever playback pauses,
/// so only the span since the last start or resume is derived from timestamps.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlaybackClock {
    state: ClockState,
    /// Milliseconds played up to the last pause, or zero since the last play.
    current_duration: u64,
    /// The length of the active song in milliseconds.
    target_duration: u64,
}

impl PlaybackClock {
    /// Restores a clock from its stored parts.
    pub fn from_parts(state: ClockState, current_duration: u64, target_duration: u64) -> Self {
        let target_duration = match state {
            ClockState::Idle => 0,
            _ => target_duration,
        };

        Self {
            state,
            current_duration: current_duration.min(target_duration),
            target_duration,
        }
    }

    /// Starts playing a song of the given length from the beginning.
    pub fn play(&mut self, target_duration: u64, now: Timestamp) {
        self.state = ClockState::Playing { started_at: now };
        self.current_duration = 0;
        self.target_duration = target_duration;
    }

    pub fn pause(&mut self, now: Timestamp) -> Result<(), ClockError> {
        match self.state {
            ClockState::Playing { started_at } => {
                self.current_duration = self.elapsed_with(started_at, now);
                self.state = ClockState::Paused { paused_at: now };
                Ok(())
            }
            state => Err(ClockError::InvalidTransition {
                action: "pause",
                state: state.name(),
            }),
        }
    }

    pub fn resume(&mut self, now: Timestamp) -> Result<(), ClockError> {
        match self.state {
            ClockState::Paused { .. } => {
                self.state = ClockState::Playing { started_at: now };
                Ok(())
            }
            state => Err(ClockError::InvalidTransition {
                action: "resume",
                state: state.name(),
            }),
        }
    }

    /// Clears the active song.
    pub fn stop(&mut self) {
        *self = Self::default();
    }

    /// Returns how many milliseconds of the active song have played.
    pub fn elapsed(&self, now: Timestamp) -> u64 {
        match self.state {
            ClockState::Idle => 0,
            ClockState::Paused { .. } => self.current_duration,
            ClockState::Playing { started_at } => self.elapsed_with(started_at, now),
        }
    }

    /// Returns how many milliseconds of the active song are left, clamped to zero.
    pub fn remaining(&self, now: Timestamp) -> u64 {
        self.target_duration.saturating_sub(self.elapsed(now))
    }

    /// Returns true if the active song has played to the end.
    pub fn is_finished(&self, now: Timestamp) -> bool {
        self.is_playing() && self.remaining(now) == 0
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, ClockState::Playing { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, ClockState::Paused { .. })
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        match self.state {
            ClockState::Playing { started_at } => Some(started_at),
            _ => None,
        }
    }

    pub fn paused_at(&self) -> Option<Timestamp> {
        match self.state {
            ClockState::Paused { paused_at } => Some(paused_at),
            _ => None,
        }
    }

    pub fn current_duration(&self) -> u64 {
        self.current_duration
    }

    pub fn target_duration(&self) -> u64 {
        self.target_duration
    }

    fn elapsed_with(&self, started_at: Timestamp, now: Timestamp) -> u64 {
        // A timestamp from before the start counts as no progress
        let since_start = (now - started_at).max(Duration::zero());
        let since_start = since_start.num_milliseconds() as u64;

        self.current_duration
            .saturating_add(since_start)
            .min(self.target_duration)
    }
}
