//! Event types for the AutoDJ event stream
//!
//! Events are broadcast by the player and serialized for SSE transmission.
//! All events use this central enum for type safety and exhaustive matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifying metadata of a track, as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// External track identifier (the `song_id` column)
    pub track_id: String,
    pub title: String,
    pub artist: String,
}

impl std::fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// How a playback session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Primary stream exited on its own
    Completed,
    /// Skip requested while playing or paused
    Skipped,
    /// Hard shutdown
    Stopped,
    /// Stream could not be started or resumed
    Error,
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOutcome::Completed => write!(f, "completed"),
            SessionOutcome::Skipped => write!(f, "skipped"),
            SessionOutcome::Stopped => write!(f, "stopped"),
            SessionOutcome::Error => write!(f, "error"),
        }
    }
}

/// Crossfade engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum EngineState {
    /// No session running
    Idle,
    /// Primary stream only
    PlayingSolo,
    /// Primary stream fading out while the next track fades in
    PlayingWithOverlap,
    /// Streams stopped, resume point retained
    Paused,
    /// Session ended with the given outcome
    Terminated(SessionOutcome),
}

impl EngineState {
    /// True while a primary stream is (supposed to be) audible
    pub fn is_playing(&self) -> bool {
        matches!(self, EngineState::PlayingSolo | EngineState::PlayingWithOverlap)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, EngineState::Paused)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::PlayingSolo => write!(f, "playing_solo"),
            EngineState::PlayingWithOverlap => write!(f, "playing_with_overlap"),
            EngineState::Paused => write!(f, "paused"),
            EngineState::Terminated(outcome) => write!(f, "terminated({})", outcome),
        }
    }
}

/// AutoDJ event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AutoDjEvent {
    /// Engine state machine transitioned
    PlaybackStateChanged {
        old_state: EngineState,
        new_state: EngineState,
        timestamp: DateTime<Utc>,
    },

    /// Primary stream started (fresh start or resume)
    TrackStarted {
        /// Playback session the stream belongs to
        session_id: Uuid,
        track: TrackInfo,
        /// 0 for a fresh start, the frozen position for a resume
        start_offset_seconds: f64,
        /// Probed duration (0 when unknown)
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Overlap stream started for the next track
    CrossfadeStarted {
        session_id: Uuid,
        next_track: TrackInfo,
        /// Position of the outgoing track when the overlap began
        elapsed_seconds: f64,
        window_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Playback paused, resume point retained
    TrackPaused {
        session_id: Uuid,
        track: TrackInfo,
        elapsed_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Session ended
    TrackFinished {
        session_id: Uuid,
        track: TrackInfo,
        outcome: SessionOutcome,
        elapsed_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Volume for upcoming stream starts changed
    VolumeChanged {
        volume_percent: u8,
        timestamp: DateTime<Utc>,
    },

    /// Request queue entry marked played
    EntryMarkedPlayed {
        entry_id: i64,
        track: TrackInfo,
        /// False for fail-forward marking (no history row written)
        recorded_in_history: bool,
        timestamp: DateTime<Utc>,
    },

    /// Refill of the fallback playlist requested from the external generator
    FallbackRefillRequested { timestamp: DateTime<Utc> },
}

impl AutoDjEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            AutoDjEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            AutoDjEvent::TrackStarted { .. } => "TrackStarted",
            AutoDjEvent::CrossfadeStarted { .. } => "CrossfadeStarted",
            AutoDjEvent::TrackPaused { .. } => "TrackPaused",
            AutoDjEvent::TrackFinished { .. } => "TrackFinished",
            AutoDjEvent::VolumeChanged { .. } => "VolumeChanged",
            AutoDjEvent::EntryMarkedPlayed { .. } => "EntryMarkedPlayed",
            AutoDjEvent::FallbackRefillRequested { .. } => "FallbackRefillRequested",
        }
    }
}
