//! Queue coordinator
//!
//! Feeds the crossfade engine from the request queue (or the fallback
//! auto-playlist when no request is pending) and writes each session's
//! outcome back to the database:
//!
//! | Outcome | Request entry | Fallback entry |
//! |---|---|---|
//! | completed, skipped | marked played + history row | removed |
//! | error | marked played, no history | removed |
//! | paused | untouched, re-offered with its resume point | untouched |
//! | stopped | untouched | untouched |

use crate::db::{fallback, queue};
use crate::error::Result;
use crate::playback::engine::{CrossfadeEngine, PauseExit};
use crate::playback::types::{PlayRequest, PlaybackOutcome, ResumePoint, TrackRef};
use crate::refill::RateLimitedRefill;
use crate::source::TrackResolver;
use crate::state::{SharedState, TrackSource};
use autodj_common::db::{FallbackEntry, QueueEntry};
use autodj_common::{AutoDjEvent, TrackInfo};
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Identity of a playable entry across iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKey {
    Request(i64),
    Fallback(i64),
}

/// An entry selected for playback
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Request(QueueEntry),
    Fallback(FallbackEntry),
}

impl Candidate {
    pub fn key(&self) -> EntryKey {
        match self {
            Candidate::Request(e) => EntryKey::Request(e.id),
            Candidate::Fallback(e) => EntryKey::Fallback(e.id),
        }
    }

    pub fn track_info(&self) -> TrackInfo {
        match self {
            Candidate::Request(e) => e.track_info(),
            Candidate::Fallback(e) => e.track_info(),
        }
    }

    pub fn source(&self) -> TrackSource {
        match self {
            Candidate::Request(_) => TrackSource::Request,
            Candidate::Fallback(_) => TrackSource::Fallback,
        }
    }
}

/// Result of one coordinator iteration
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A session ended (or paused) for the given entry
    Finished(EntryKey, PlaybackOutcome),
    /// Nothing to play
    Idle,
    /// Shutdown observed
    Stopped,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub idle_poll: Duration,
    pub error_backoff: Duration,
    pub fallback_enabled: bool,
    /// Fallback list length below which a refill is requested
    pub refill_threshold: i64,
}

/// A paused session waiting to be re-offered
#[derive(Debug, Clone)]
struct HeldSession {
    candidate: Candidate,
    resume: ResumePoint,
}

pub struct QueueCoordinator {
    db: Pool<Sqlite>,
    engine: CrossfadeEngine,
    resolver: Arc<dyn TrackResolver>,
    refill: Option<RateLimitedRefill>,
    config: CoordinatorConfig,
    held: Option<HeldSession>,
}

impl QueueCoordinator {
    pub fn new(
        db: Pool<Sqlite>,
        engine: CrossfadeEngine,
        resolver: Arc<dyn TrackResolver>,
        refill: Option<RateLimitedRefill>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            db,
            engine,
            resolver,
            refill,
            config,
            held: None,
        }
    }

    fn state(&self) -> &Arc<SharedState> {
        self.engine.state()
    }

    /// Playback loop; returns only after shutdown
    ///
    /// A failed iteration is logged and retried after the error backoff.
    pub async fn run(mut self) {
        info!("Playback loop started");

        loop {
            match self.run_once().await {
                Ok(Step::Stopped) => break,
                Ok(Step::Idle) => {
                    if self.wait_or_stop(self.config.idle_poll).await {
                        break;
                    }
                }
                Ok(Step::Finished(key, outcome)) => {
                    debug!("Iteration finished: {:?} -> {:?}", key, outcome);
                }
                Err(e) => {
                    error!("Playback iteration failed: {}", e);
                    if self.wait_or_stop(self.config.error_backoff).await {
                        break;
                    }
                }
            }
        }

        info!("Playback loop stopped");
    }

    /// Sleep, waking early on shutdown; true when shutdown was requested
    async fn wait_or_stop(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.state().is_stop_requested(),
            _ = self.state().stopped() => true,
        }
    }

    /// Select, resolve, play and reconcile one entry
    pub async fn run_once(&mut self) -> Result<Step> {
        if self.state().is_stop_requested() {
            return Ok(Step::Stopped);
        }

        if let Some(held) = self.held.take() {
            match self.engine.hold_paused().await {
                PauseExit::Resumed => self.held = Some(held),
                PauseExit::Skipped => {
                    info!("Skipped {} while paused", held.candidate.track_info());
                    let outcome = PlaybackOutcome::Skipped;
                    self.apply_outcome(&held.candidate, &outcome).await?;
                    return Ok(Step::Finished(held.candidate.key(), outcome));
                }
                PauseExit::Stopped => return Ok(Step::Stopped),
            }
        }

        let selection = self.select().await?;
        let Some(current) = selection.first().cloned() else {
            if self.held.take().is_some() {
                info!("Paused entry no longer available, discarding resume point");
            }
            self.state().set_idle();
            return Ok(Step::Idle);
        };

        let resume = match self.held.take() {
            Some(held) if held.candidate.key() == current.key() => Some(held.resume),
            Some(held) => {
                info!(
                    "{} no longer first in line, discarding resume point",
                    held.candidate.track_info()
                );
                None
            }
            None => None,
        };

        let current_path = match self.until_stopped(self.resolve(&current)).await {
            None => return Ok(Step::Stopped),
            Some(Ok(path)) => path,
            Some(Err(e)) => {
                warn!("Could not get {}: {}", current.track_info(), e);
                let outcome = PlaybackOutcome::Error(e.to_string());
                self.apply_outcome(&current, &outcome).await?;
                return Ok(Step::Finished(current.key(), outcome));
            }
        };

        let next = match selection.get(1) {
            Some(candidate) => match self.until_stopped(self.resolve(candidate)).await {
                None => return Ok(Step::Stopped),
                Some(Ok(path)) => Some(TrackRef {
                    info: candidate.track_info(),
                    file_path: path,
                }),
                Some(Err(e)) => {
                    warn!(
                        "Next track {} unavailable, no crossfade: {}",
                        candidate.track_info(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let request = PlayRequest {
            current: TrackRef {
                info: current.track_info(),
                file_path: current_path,
            },
            next,
            resume,
        };

        self.state().set_source(Some(current.source()));
        let outcome = self.engine.play(&request).await;

        match &outcome {
            PlaybackOutcome::Paused(resume) => {
                self.held = Some(HeldSession {
                    candidate: current.clone(),
                    resume: *resume,
                });
            }
            PlaybackOutcome::Stopped => return Ok(Step::Stopped),
            _ => self.apply_outcome(&current, &outcome).await?,
        }

        Ok(Step::Finished(current.key(), outcome))
    }

    /// Up to two candidates: pending requests first, then the fallback list
    async fn select(&self) -> Result<Vec<Candidate>> {
        let mut selection: Vec<Candidate> = queue::fetch_pending(&self.db, 2)
            .await?
            .into_iter()
            .map(Candidate::Request)
            .collect();

        self.state()
            .set_queue_length(queue::pending_count(&self.db).await?);

        if self.config.fallback_enabled && selection.len() < 2 {
            if selection.is_empty() {
                self.refill_if_low().await?;
            }
            let needed = 2 - selection.len() as i64;
            selection.extend(
                fallback::fetch_next(&self.db, needed)
                    .await?
                    .into_iter()
                    .map(Candidate::Fallback),
            );
        }

        Ok(selection)
    }

    async fn refill_if_low(&self) -> Result<()> {
        let Some(refill) = &self.refill else {
            return Ok(());
        };
        if fallback::count(&self.db).await? >= self.config.refill_threshold {
            return Ok(());
        }
        match refill.maybe_refill().await {
            Ok(true) => self
                .state()
                .broadcast_event(AutoDjEvent::FallbackRefillRequested {
                    timestamp: Utc::now(),
                }),
            Ok(false) => {}
            // Retried after the cooldown
            Err(e) => warn!("Fallback refill request failed: {}", e),
        }
        Ok(())
    }

    async fn resolve(&self, candidate: &Candidate) -> Result<PathBuf> {
        if let Candidate::Fallback(entry) = candidate {
            let path = Path::new(&entry.file_path);
            if path.exists() {
                return Ok(path.to_path_buf());
            }
        }
        self.resolver.resolve(&candidate.track_info()).await
    }

    /// `None` if shutdown was requested before `future` completed
    async fn until_stopped<T>(&self, future: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            value = future => Some(value),
            _ = self.state().stopped() => None,
        }
    }

    async fn apply_outcome(&self, candidate: &Candidate, outcome: &PlaybackOutcome) -> Result<()> {
        let record_history = match outcome {
            PlaybackOutcome::Completed | PlaybackOutcome::Skipped => true,
            PlaybackOutcome::Error(_) => false,
            PlaybackOutcome::Paused(_) | PlaybackOutcome::Stopped => return Ok(()),
        };

        match candidate {
            Candidate::Request(entry) => {
                if queue::mark_played(&self.db, entry, record_history).await? {
                    info!("Marked as played: {}", entry.title);
                    self.state().broadcast_event(AutoDjEvent::EntryMarkedPlayed {
                        entry_id: entry.id,
                        track: entry.track_info(),
                        recorded_in_history: record_history,
                        timestamp: Utc::now(),
                    });
                }
                self.state()
                    .set_queue_length(queue::pending_count(&self.db).await?);
            }
            Candidate::Fallback(entry) => {
                fallback::remove(&self.db, entry.id).await?;
                debug!("Removed fallback entry {}", entry.id);
            }
        }

        Ok(())
    }
}
