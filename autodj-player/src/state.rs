//! Shared session state
//!
//! Single point of contact between the control surface and the playback task.
//! All mutable fields sit behind one mutex that is held only for field
//! assignment; no lock is ever held across an `.await`.

use crate::playback::types::PendingCommand;
use autodj_common::{AutoDjEvent, EngineState, SessionOutcome, TrackInfo};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

/// Where the current track was selected from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    /// Shared request queue
    Request,
    /// Fallback auto-playlist
    Fallback,
}

/// Status snapshot returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: EngineState,
    pub current_track: Option<TrackInfo>,
    pub overlap_track: Option<TrackInfo>,
    pub source: Option<TrackSource>,
    pub is_playing: bool,
    pub is_paused: bool,
    pub elapsed_seconds: f64,
    pub total_duration_seconds: f64,
    pub volume_percent: u8,
    pub crossfade_seconds: f64,
    pub queue_length: i64,
}

/// Commands the engine must react to on its next tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickCommands {
    pub stop: bool,
    pub pending: PendingCommand,
    pub resume: bool,
}

#[derive(Debug)]
struct SessionState {
    engine_state: EngineState,
    pending: PendingCommand,
    resume_requested: bool,
    stop_requested: bool,
    volume_percent: u8,
    crossfade_seconds: f64,
    current_track: Option<TrackInfo>,
    overlap_track: Option<TrackInfo>,
    source: Option<TrackSource>,
    elapsed_seconds: f64,
    total_duration_seconds: f64,
    queue_length: i64,
}

/// Shared state accessible by the playback task and all handlers
pub struct SharedState {
    session: Mutex<SessionState>,

    /// Event broadcaster for SSE events
    event_tx: broadcast::Sender<AutoDjEvent>,

    /// Flips to true once on shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl SharedState {
    pub fn new(volume_percent: u8, crossfade_seconds: f64) -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            session: Mutex::new(SessionState {
                engine_state: EngineState::Idle,
                pending: PendingCommand::None,
                resume_requested: false,
                stop_requested: false,
                volume_percent: volume_percent.min(100),
                crossfade_seconds,
                current_track: None,
                overlap_track: None,
                source: None,
                elapsed_seconds: 0.0,
                total_duration_seconds: 0.0,
                queue_length: 0,
            }),
            event_tx,
            shutdown_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // Field assignments only, a poisoned guard still holds consistent data
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: AutoDjEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<AutoDjEvent> {
        self.event_tx.subscribe()
    }

    // ------------------------------------------------------------------
    // Control surface side
    // ------------------------------------------------------------------

    /// Queue a skip; accepted while playing or paused
    pub fn request_skip(&self) -> bool {
        let mut s = self.lock();
        if s.stop_requested || !(s.engine_state.is_playing() || s.engine_state.is_paused()) {
            return false;
        }
        s.pending = PendingCommand::Skip;
        true
    }

    /// Queue a pause; accepted while playing, never overrides a pending skip
    pub fn request_pause(&self) -> bool {
        let mut s = self.lock();
        if s.stop_requested || !s.engine_state.is_playing() {
            return false;
        }
        if s.pending != PendingCommand::Skip {
            s.pending = PendingCommand::Pause;
        }
        true
    }

    /// Queue a resume; accepted only while paused
    pub fn request_resume(&self) -> bool {
        let mut s = self.lock();
        if s.stop_requested || !s.engine_state.is_paused() {
            return false;
        }
        s.resume_requested = true;
        true
    }

    /// Set volume for the next stream start; running streams are untouched
    pub fn set_volume(&self, volume_percent: u8) -> u8 {
        let volume = volume_percent.min(100);
        self.lock().volume_percent = volume;
        self.broadcast_event(AutoDjEvent::VolumeChanged {
            volume_percent: volume,
            timestamp: Utc::now(),
        });
        volume
    }

    /// Hard cancellation; idempotent
    ///
    /// With no live streams (idle, paused, already terminated) the state moves
    /// to `TERMINATED(stopped)` immediately, otherwise the engine does so on
    /// its next tick after stopping both streams.
    pub fn request_stop(&self) {
        let transition = {
            let mut s = self.lock();
            s.stop_requested = true;
            s.pending = PendingCommand::None;
            s.resume_requested = false;
            if s.engine_state.is_playing()
                || s.engine_state == EngineState::Terminated(SessionOutcome::Stopped)
            {
                None
            } else {
                let old = s.engine_state;
                s.engine_state = EngineState::Terminated(SessionOutcome::Stopped);
                Some(old)
            }
        };

        self.shutdown_tx.send_replace(true);

        if let Some(old_state) = transition {
            self.broadcast_event(AutoDjEvent::PlaybackStateChanged {
                old_state,
                new_state: EngineState::Terminated(SessionOutcome::Stopped),
                timestamp: Utc::now(),
            });
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// Resolves once shutdown has been requested
    pub async fn stopped(&self) {
        let mut rx = self.shutdown_tx.subscribe();
        // Sender lives as long as self, so this only errors on drop
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    pub fn status(&self) -> StatusSnapshot {
        let s = self.lock();
        StatusSnapshot {
            state: s.engine_state,
            current_track: s.current_track.clone(),
            overlap_track: s.overlap_track.clone(),
            source: s.source,
            is_playing: s.engine_state.is_playing(),
            is_paused: s.engine_state.is_paused(),
            elapsed_seconds: s.elapsed_seconds,
            total_duration_seconds: s.total_duration_seconds,
            volume_percent: s.volume_percent,
            crossfade_seconds: s.crossfade_seconds,
            queue_length: s.queue_length,
        }
    }

    pub fn engine_state(&self) -> EngineState {
        self.lock().engine_state
    }

    pub fn volume_percent(&self) -> u8 {
        self.lock().volume_percent
    }

    // ------------------------------------------------------------------
    // Playback task side
    // ------------------------------------------------------------------

    /// Record the elapsed position and take the commands pending for this tick
    ///
    /// Skip and pause are consumed; resume stays until taken by
    /// [`SharedState::take_resume`].
    pub fn take_tick_commands(&self, elapsed_seconds: f64) -> TickCommands {
        let mut s = self.lock();
        if s.engine_state.is_playing() {
            s.elapsed_seconds = elapsed_seconds;
        }
        let pending = std::mem::take(&mut s.pending);
        TickCommands {
            stop: s.stop_requested,
            pending,
            resume: s.resume_requested,
        }
    }

    pub fn take_resume(&self) -> bool {
        std::mem::take(&mut self.lock().resume_requested)
    }

    /// Transition the engine state, broadcasting the change
    pub fn set_engine_state(&self, new_state: EngineState) {
        let old_state = {
            let mut s = self.lock();
            let old = s.engine_state;
            s.engine_state = new_state;
            if !new_state.is_playing() {
                s.overlap_track = None;
            }
            if !new_state.is_paused() {
                // A resume only ever applies to the pause it was accepted for
                s.resume_requested = false;
            }
            if !new_state.is_playing() && !new_state.is_paused() {
                // Commands addressed to the finished session must not leak into the next one
                s.pending = PendingCommand::None;
            }
            if matches!(new_state, EngineState::Terminated(_)) {
                // Nothing is audible until the next session begins
                s.current_track = None;
                s.source = None;
                s.elapsed_seconds = 0.0;
                s.total_duration_seconds = 0.0;
            }
            old
        };

        if old_state != new_state {
            self.broadcast_event(AutoDjEvent::PlaybackStateChanged {
                old_state,
                new_state,
                timestamp: Utc::now(),
            });
        }
    }

    /// Publish the track a session is (re)starting with
    pub fn begin_session(
        &self,
        track: TrackInfo,
        source: Option<TrackSource>,
        elapsed_seconds: f64,
        total_duration_seconds: f64,
    ) {
        let mut s = self.lock();
        s.current_track = Some(track);
        if source.is_some() {
            s.source = source;
        }
        s.overlap_track = None;
        s.elapsed_seconds = elapsed_seconds;
        s.total_duration_seconds = total_duration_seconds;
    }

    pub fn set_overlap_track(&self, track: Option<TrackInfo>) {
        self.lock().overlap_track = track;
    }

    pub fn set_source(&self, source: Option<TrackSource>) {
        self.lock().source = source;
    }

    /// Nothing playable; clears the track fields unless shutdown already won
    pub fn set_idle(&self) {
        {
            let mut s = self.lock();
            if s.stop_requested {
                return;
            }
            s.current_track = None;
            s.overlap_track = None;
            s.source = None;
            s.elapsed_seconds = 0.0;
            s.total_duration_seconds = 0.0;
        }
        self.set_engine_state(EngineState::Idle);
    }

    pub fn set_queue_length(&self, queue_length: i64) {
        self.lock().queue_length = queue_length;
    }

    pub fn set_crossfade_seconds(&self, crossfade_seconds: f64) {
        self.lock().crossfade_seconds = crossfade_seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> TrackInfo {
        TrackInfo {
            track_id: "abc".into(),
            title: "Song".into(),
            artist: "Band".into(),
        }
    }

    #[test]
    fn test_commands_rejected_when_idle() {
        let state = SharedState::new(100, 10.0);
        assert!(!state.request_skip());
        assert!(!state.request_pause());
        assert!(!state.request_resume());
    }

    #[test]
    fn test_skip_wins_over_pause() {
        let state = SharedState::new(100, 10.0);
        state.set_engine_state(EngineState::PlayingSolo);

        assert!(state.request_skip());
        assert!(state.request_pause());

        let commands = state.take_tick_commands(1.0);
        assert_eq!(commands.pending, PendingCommand::Skip);
        // Consumed
        assert_eq!(state.take_tick_commands(1.5).pending, PendingCommand::None);
    }

    #[test]
    fn test_resume_only_while_paused() {
        let state = SharedState::new(100, 10.0);
        state.set_engine_state(EngineState::PlayingSolo);
        assert!(!state.request_resume());

        state.set_engine_state(EngineState::Paused);
        assert!(state.request_resume());
        assert!(state.take_resume());
        assert!(!state.take_resume());
    }

    #[test]
    fn test_resume_cleared_when_playback_restarts() {
        let state = SharedState::new(100, 10.0);
        state.set_engine_state(EngineState::Paused);
        assert!(state.request_resume());
        assert!(state.take_resume());

        // Second press while the track is being restarted
        assert!(state.request_resume());
        state.set_engine_state(EngineState::PlayingSolo);

        state.set_engine_state(EngineState::Paused);
        assert!(!state.take_tick_commands(0.0).resume);
        assert!(!state.take_resume());
    }

    #[test]
    fn test_terminated_clears_current_track() {
        let state = SharedState::new(100, 10.0);
        state.begin_session(track(), Some(TrackSource::Request), 0.0, 30.0);
        state.set_engine_state(EngineState::PlayingSolo);
        state.take_tick_commands(12.0);
        assert_eq!(state.status().current_track, Some(track()));

        state.set_engine_state(EngineState::Terminated(SessionOutcome::Completed));

        let status = state.status();
        assert_eq!(status.current_track, None);
        assert_eq!(status.source, None);
        assert_eq!(status.elapsed_seconds, 0.0);
        assert_eq!(status.total_duration_seconds, 0.0);
    }

    #[test]
    fn test_elapsed_frozen_while_paused() {
        let state = SharedState::new(100, 10.0);
        state.begin_session(track(), Some(TrackSource::Request), 0.0, 30.0);
        state.set_engine_state(EngineState::PlayingSolo);
        state.take_tick_commands(12.0);

        state.set_engine_state(EngineState::Paused);
        state.take_tick_commands(20.0);

        let status = state.status();
        assert_eq!(status.elapsed_seconds, 12.0);
        assert!(status.is_paused);
        assert!(!status.is_playing);
    }

    #[test]
    fn test_volume_clamped_and_broadcast() {
        let state = SharedState::new(100, 10.0);
        let mut rx = state.subscribe_events();

        assert_eq!(state.set_volume(150), 100);
        assert_eq!(state.set_volume(40), 40);
        assert_eq!(state.volume_percent(), 40);

        match rx.try_recv().unwrap() {
            AutoDjEvent::VolumeChanged { volume_percent, .. } => assert_eq!(volume_percent, 100),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_stop_idempotent_when_idle() {
        let state = SharedState::new(100, 10.0);
        state.request_stop();
        state.request_stop();

        assert_eq!(
            state.engine_state(),
            EngineState::Terminated(SessionOutcome::Stopped)
        );
        assert!(state.is_stop_requested());
        assert!(!state.request_skip());

        // Idle must not overwrite the terminal state
        state.set_idle();
        assert_eq!(
            state.engine_state(),
            EngineState::Terminated(SessionOutcome::Stopped)
        );
    }

    #[test]
    fn test_stop_while_playing_left_to_engine() {
        let state = SharedState::new(100, 10.0);
        state.set_engine_state(EngineState::PlayingSolo);
        state.request_stop();

        assert_eq!(state.engine_state(), EngineState::PlayingSolo);
        assert!(state.take_tick_commands(3.0).stop);
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_request() {
        let state = std::sync::Arc::new(SharedState::new(100, 10.0));
        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.stopped().await })
        };
        state.request_stop();
        waiter.await.unwrap();
    }
}
