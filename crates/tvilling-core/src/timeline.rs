//! Timeline controller.
//!
//! Maps a normalized scrub position in `0..=100` onto virtual handshake
//! time and evaluates both protocols at that instant. The span of the
//! timeline is the full protocol A handshake, so the end of the timeline is
//! the moment protocol A becomes ready.
//!
//! Playback is a cursor that [`TimelineController::tick`] moves forward by
//! `increment × speed`. Every tick re-seeks through the same pure evaluator
//! a direct seek uses, which is what makes playing to a position and
//! seeking to it produce the same snapshot.
//!
//! # Invariants
//!
//! - `0 <= position <= 100`
//! - Playback stops by itself at 100

use serde::{Deserialize, Serialize};
use tracing::debug;
use tvilling_proto::{HandshakeState, NetworkProfile, Protocol};

use crate::{error::SimError, handshake};

/// End of the timeline.
pub const TIMELINE_END: f64 = 100.0;

/// Default position increment per tick at speed 1.
pub const DEFAULT_INCREMENT: f64 = 2.0;

/// Fastest accepted animation speed.
pub const MAX_SPEED: f64 = 10.0;

/// Both handshakes at one timeline position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    /// Position in `0..=100`.
    pub position: f64,
    /// Virtual time the position maps to.
    pub virtual_ms: f64,
    /// Whether playback is running.
    pub playing: bool,
    /// Protocol A handshake at `virtual_ms`.
    pub tcp: HandshakeState,
    /// Protocol B handshake at `virtual_ms`.
    pub quic: HandshakeState,
}

/// Virtual time for `position` under `profile`.
pub fn virtual_time_ms(position: f64, profile: &NetworkProfile) -> f64 {
    position / TIMELINE_END * handshake::total_duration_ms(Protocol::TcpTls, profile)
}

/// Evaluate both protocols at `position`.
pub fn evaluate_at(position: f64, profile: &NetworkProfile) -> TimelineSnapshot {
    let virtual_ms = virtual_time_ms(position, profile);
    TimelineSnapshot {
        position,
        virtual_ms,
        playing: false,
        tcp: handshake::evaluate(Protocol::TcpTls, virtual_ms, profile),
        quic: handshake::evaluate(Protocol::Quic, virtual_ms, profile),
    }
}

/// Owner of the timeline position and playback state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineController {
    position: f64,
    playing: bool,
    speed: f64,
    increment: f64,
}

impl Default for TimelineController {
    fn default() -> Self {
        Self::new(DEFAULT_INCREMENT)
    }
}

impl TimelineController {
    /// Paused at 0, speed 1, moving `increment` per tick.
    pub const fn new(increment: f64) -> Self {
        Self { position: 0.0, playing: false, speed: 1.0, increment }
    }

    /// Current position.
    pub const fn position(&self) -> f64 {
        self.position
    }

    /// Whether playback is running.
    pub const fn is_playing(&self) -> bool {
        self.playing
    }

    /// Animation speed multiplier.
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Snapshot at the current position.
    pub fn snapshot(&self, profile: &NetworkProfile) -> TimelineSnapshot {
        TimelineSnapshot { playing: self.playing, ..evaluate_at(self.position, profile) }
    }

    /// Jump to `position`.
    ///
    /// Playback keeps running if it was.
    ///
    /// # Errors
    ///
    /// - `InvalidPosition` if `position` is not a finite value in `0..=100`
    pub fn seek(
        &mut self,
        position: f64,
        profile: &NetworkProfile,
    ) -> Result<TimelineSnapshot, SimError> {
        if !position.is_finite() || !(0.0..=TIMELINE_END).contains(&position) {
            return Err(SimError::InvalidPosition { position });
        }
        self.position = position;
        Ok(self.snapshot(profile))
    }

    /// Start playback.
    ///
    /// Returns `false` if already playing or at the end.
    pub fn play(&mut self) -> bool {
        if self.playing || self.position >= TIMELINE_END {
            return false;
        }
        self.playing = true;
        true
    }

    /// Pause playback. Returns `true` if it was running.
    pub const fn pause(&mut self) -> bool {
        let was = self.playing;
        self.playing = false;
        was
    }

    /// Advance one playback tick.
    ///
    /// Returns `None` while paused.
    pub fn tick(&mut self, profile: &NetworkProfile) -> Option<TimelineSnapshot> {
        if !self.playing {
            return None;
        }

        self.position = (self.position + self.increment * self.speed).min(TIMELINE_END);
        if self.position >= TIMELINE_END {
            self.playing = false;
            debug!("timeline reached the end");
        }
        Some(self.snapshot(profile))
    }

    /// Pause and rewind to 0.
    pub fn reset(&mut self, profile: &NetworkProfile) -> TimelineSnapshot {
        self.playing = false;
        self.position = 0.0;
        self.snapshot(profile)
    }

    /// Change the animation speed.
    ///
    /// # Errors
    ///
    /// - `InvalidSpeed` unless `0 < speed <= 10`
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SimError> {
        if !speed.is_finite() || speed <= 0.0 || speed > MAX_SPEED {
            return Err(SimError::InvalidSpeed { speed });
        }
        self.speed = speed;
        Ok(())
    }
}
