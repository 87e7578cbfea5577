//! Playback session types

use autodj_common::{SessionOutcome, TrackInfo};
use std::path::PathBuf;

/// A track with its resolved local file
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRef {
    pub info: TrackInfo,
    pub file_path: PathBuf,
}

/// Frozen position of a paused session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumePoint {
    pub elapsed_seconds: f64,
    /// Duration probed when the track first started, reused on resume
    pub total_duration_seconds: f64,
}

/// Input of one engine run
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub current: TrackRef,
    /// Crossfade candidate; `None` disables the overlap
    pub next: Option<TrackRef>,
    /// Set when continuing a paused session
    pub resume: Option<ResumePoint>,
}

/// Terminal result of one engine run
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Completed,
    Skipped,
    Paused(ResumePoint),
    Stopped,
    Error(String),
}

impl PlaybackOutcome {
    /// Terminal state outcome; `None` for a pause
    pub fn session_outcome(&self) -> Option<SessionOutcome> {
        match self {
            PlaybackOutcome::Completed => Some(SessionOutcome::Completed),
            PlaybackOutcome::Skipped => Some(SessionOutcome::Skipped),
            PlaybackOutcome::Stopped => Some(SessionOutcome::Stopped),
            PlaybackOutcome::Error(_) => Some(SessionOutcome::Error),
            PlaybackOutcome::Paused(_) => None,
        }
    }
}

/// Command queued by the control surface, consumed by the engine on its next tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingCommand {
    #[default]
    None,
    Skip,
    Pause,
}

/// Fade-out applied to a stream, in track-absolute seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOut {
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

/// Fades baked into a stream when it starts
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FadeSpec {
    /// Fade-in from the start position
    pub fade_in_seconds: Option<f64>,
    pub fade_out: Option<FadeOut>,
}

impl FadeSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fade_in(seconds: f64) -> Self {
        Self {
            fade_in_seconds: Some(seconds),
            fade_out: None,
        }
    }

    pub fn with_fade_out(mut self, start_seconds: f64, duration_seconds: f64) -> Self {
        self.fade_out = Some(FadeOut {
            start_seconds,
            duration_seconds,
        });
        self
    }
}

/// Effective overlap window for a session
///
/// Zero (crossfade disabled) without a next track, when the duration is
/// unknown, or when the track is not longer than the configured window.
pub fn effective_window(crossfade_seconds: f64, total_duration: f64, has_next: bool) -> f64 {
    if !has_next || crossfade_seconds <= 0.0 || total_duration <= crossfade_seconds {
        0.0
    } else {
        crossfade_seconds
    }
}
