//! Crossfade playback engine
//!
//! Drives one playback session: a primary stream for the current track and,
//! near its end, one overlap stream for the next track. The engine polls on a
//! fixed tick and, per tick, applies the first matching rule of:
//!
//! 1. stop requested: stop both streams, `TERMINATED(stopped)`
//! 2. skip pending: stop both streams, `TERMINATED(skipped)`
//! 3. primary exited: stop the overlap, `TERMINATED(completed)`
//! 4. pause pending: stop both streams, freeze position, `PAUSED`
//! 5. crossfade point reached: start the overlap (once per session)
//!
//! Position is the wall-clock time since the primary stream (re)started plus
//! the resume offset, so it is accurate to one tick.

use crate::audio::{DurationProbe, OutputDriver, StreamHandle, StreamRequest};
use crate::playback::types::{
    effective_window, FadeSpec, PendingCommand, PlayRequest, PlaybackOutcome, ResumePoint, TrackRef,
};
use crate::state::SharedState;
use autodj_common::{AutoDjEvent, EngineState, SessionOutcome};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a paused session was left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseExit {
    Resumed,
    Skipped,
    Stopped,
}

/// Crossfade playback engine
///
/// Only this type starts or stops output streams. At most one primary and one
/// overlap stream are alive at any instant, and both are gone when
/// [`CrossfadeEngine::play`] returns.
pub struct CrossfadeEngine {
    state: Arc<SharedState>,
    driver: Arc<dyn OutputDriver>,
    probe: Arc<dyn DurationProbe>,
    tick: Duration,
    crossfade_seconds: f64,
}

/// Streams of the running session
struct ActiveStreams {
    primary: Box<dyn StreamHandle>,
    overlap: Option<Box<dyn StreamHandle>>,
}

impl ActiveStreams {
    async fn terminate_overlap(&mut self) {
        if let Some(mut overlap) = self.overlap.take() {
            overlap.terminate().await;
        }
    }

    async fn terminate_all(&mut self) {
        self.primary.terminate().await;
        self.terminate_overlap().await;
    }
}

impl CrossfadeEngine {
    pub fn new(
        state: Arc<SharedState>,
        driver: Arc<dyn OutputDriver>,
        probe: Arc<dyn DurationProbe>,
        tick: Duration,
        crossfade_seconds: f64,
    ) -> Self {
        state.set_crossfade_seconds(crossfade_seconds);
        Self {
            state,
            driver,
            probe,
            tick,
            crossfade_seconds,
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Run one session until it terminates or pauses
    pub async fn play(&self, request: &PlayRequest) -> PlaybackOutcome {
        let session_id = Uuid::new_v4();
        let current = &request.current;

        if self.state.is_stop_requested() {
            self.state
                .set_engine_state(EngineState::Terminated(SessionOutcome::Stopped));
            return PlaybackOutcome::Stopped;
        }

        // Duration is probed once; a resumed session keeps the original value
        let (start_offset, total_duration) = match request.resume {
            Some(resume) => (resume.elapsed_seconds, resume.total_duration_seconds),
            None => (0.0, self.probe.probe(&current.file_path).await),
        };

        let window = effective_window(
            self.crossfade_seconds,
            total_duration,
            request.next.is_some(),
        );

        let mut fade = FadeSpec::none();
        if window > 0.0 {
            fade = fade.with_fade_out(total_duration - window, window);
        }

        let primary_request = StreamRequest {
            file_path: current.file_path.clone(),
            volume_percent: self.state.volume_percent(),
            start_offset_seconds: start_offset,
            fade,
        };

        let primary = match self.driver.start(primary_request).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Could not start {}: {}", current.info, e);
                self.state
                    .set_engine_state(EngineState::Terminated(SessionOutcome::Error));
                self.publish_finished(session_id, current, SessionOutcome::Error, start_offset);
                return PlaybackOutcome::Error(e.to_string());
            }
        };
        let started_at = Instant::now();

        info!(
            "Playing {} ({:.1}s, offset {:.1}s, crossfade window {:.1}s)",
            current.info, total_duration, start_offset, window
        );

        self.state
            .begin_session(current.info.clone(), None, start_offset, total_duration);
        self.state.set_engine_state(EngineState::PlayingSolo);
        self.state.broadcast_event(AutoDjEvent::TrackStarted {
            session_id,
            track: current.info.clone(),
            start_offset_seconds: start_offset,
            duration_seconds: total_duration,
            timestamp: Utc::now(),
        });

        let mut streams = ActiveStreams {
            primary,
            overlap: None,
        };
        let mut overlap_started = false;

        loop {
            tokio::time::sleep(self.tick).await;

            let elapsed = start_offset + started_at.elapsed().as_secs_f64();
            let primary_alive = streams.primary.is_alive();
            let commands = self.state.take_tick_commands(elapsed);

            if commands.stop {
                streams.terminate_all().await;
                info!("Stopped {} at {:.1}s", current.info, elapsed);
                return self.finish(session_id, current, SessionOutcome::Stopped, elapsed);
            }

            if commands.pending == PendingCommand::Skip {
                streams.terminate_all().await;
                info!("Skipped {} at {:.1}s", current.info, elapsed);
                return self.finish(session_id, current, SessionOutcome::Skipped, elapsed);
            }

            if !primary_alive {
                streams.terminate_overlap().await;
                if commands.pending == PendingCommand::Pause {
                    debug!("Pause request dropped, {} already finished", current.info);
                }
                info!("Completed {}", current.info);
                return self.finish(session_id, current, SessionOutcome::Completed, elapsed);
            }

            if commands.pending == PendingCommand::Pause {
                streams.terminate_all().await;
                let resume = ResumePoint {
                    elapsed_seconds: elapsed,
                    total_duration_seconds: total_duration,
                };
                info!("Paused {} at {:.1}s", current.info, elapsed);
                self.state.set_engine_state(EngineState::Paused);
                self.state.broadcast_event(AutoDjEvent::TrackPaused {
                    session_id,
                    track: current.info.clone(),
                    elapsed_seconds: elapsed,
                    timestamp: Utc::now(),
                });
                return PlaybackOutcome::Paused(resume);
            }

            if !overlap_started && window > 0.0 && elapsed >= total_duration - window {
                // One attempt per session, even if the start fails
                overlap_started = true;
                if let Some(next) = &request.next {
                    streams.overlap = self
                        .start_overlap(session_id, next, elapsed, total_duration, window)
                        .await;
                }
            }
        }
    }

    async fn start_overlap(
        &self,
        session_id: Uuid,
        next: &TrackRef,
        elapsed: f64,
        total_duration: f64,
        window: f64,
    ) -> Option<Box<dyn StreamHandle>> {
        let fade_in = window.min((total_duration - elapsed).max(0.0));
        let request = StreamRequest {
            file_path: next.file_path.clone(),
            volume_percent: self.state.volume_percent(),
            start_offset_seconds: 0.0,
            fade: FadeSpec::fade_in(fade_in),
        };

        match self.driver.start(request).await {
            Ok(handle) => {
                info!("Crossfading into {} at {:.1}s", next.info, elapsed);
                self.state.set_overlap_track(Some(next.info.clone()));
                self.state.set_engine_state(EngineState::PlayingWithOverlap);
                self.state.broadcast_event(AutoDjEvent::CrossfadeStarted {
                    session_id,
                    next_track: next.info.clone(),
                    elapsed_seconds: elapsed,
                    window_seconds: window,
                    timestamp: Utc::now(),
                });
                Some(handle)
            }
            Err(e) => {
                warn!("Overlap stream for {} failed, continuing solo: {}", next.info, e);
                None
            }
        }
    }

    /// Wait in `PAUSED` until resume, skip or stop
    ///
    /// No stream is alive while waiting.
    pub async fn hold_paused(&self) -> PauseExit {
        loop {
            let commands = self.state.take_tick_commands(0.0);

            if commands.stop {
                self.state
                    .set_engine_state(EngineState::Terminated(SessionOutcome::Stopped));
                return PauseExit::Stopped;
            }
            if commands.pending == PendingCommand::Skip {
                self.state
                    .set_engine_state(EngineState::Terminated(SessionOutcome::Skipped));
                return PauseExit::Skipped;
            }
            if commands.resume && self.state.take_resume() {
                info!("Resuming");
                return PauseExit::Resumed;
            }

            tokio::time::sleep(self.tick).await;
        }
    }

    fn finish(
        &self,
        session_id: Uuid,
        current: &TrackRef,
        outcome: SessionOutcome,
        elapsed: f64,
    ) -> PlaybackOutcome {
        self.state.set_engine_state(EngineState::Terminated(outcome));
        self.publish_finished(session_id, current, outcome, elapsed);
        match outcome {
            SessionOutcome::Completed => PlaybackOutcome::Completed,
            SessionOutcome::Skipped => PlaybackOutcome::Skipped,
            SessionOutcome::Stopped => PlaybackOutcome::Stopped,
            SessionOutcome::Error => PlaybackOutcome::Error("stream failed".to_string()),
        }
    }

    fn publish_finished(
        &self,
        session_id: Uuid,
        current: &TrackRef,
        outcome: SessionOutcome,
        elapsed: f64,
    ) {
        self.state.broadcast_event(AutoDjEvent::TrackFinished {
            session_id,
            track: current.info.clone(),
            outcome,
            elapsed_seconds: elapsed,
            timestamp: Utc::now(),
        });
    }
}
