//! Test helpers for AutoDJ Player integration tests
//!
//! - FakeDriver: output streams that "play" on tokio's clock and record every start
//! - FakeProbe: fixed durations per file
//! - StaticResolver: track id to path table
//! - In-memory database with the full schema and insert helpers
//!
//! Tests using the fakes run with `start_paused = true` so time only advances
//! when every task is waiting, which makes tick timing exact.

#![allow(dead_code)]

use async_trait::async_trait;
use autodj_common::TrackInfo;
use autodj_player::audio::{DurationProbe, OutputDriver, StreamHandle, StreamRequest};
use autodj_player::playback::{CrossfadeEngine, TrackRef};
use autodj_player::source::TrackResolver;
use autodj_player::{Error, Result, SharedState};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const TICK: Duration = Duration::from_millis(500);
pub const TICK_SECONDS: f64 = 0.5;

// ============================================================================
// Fake output driver
// ============================================================================

/// One recorded stream start
#[derive(Debug, Clone)]
pub struct StartRecord {
    pub request: StreamRequest,
    /// Seconds since the driver was created
    pub at: f64,
    ends_at: Instant,
    terminated: Arc<AtomicBool>,
}

impl StartRecord {
    pub fn file_name(&self) -> String {
        self.request
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn is_alive(&self) -> bool {
        !self.is_terminated() && Instant::now() < self.ends_at
    }
}

/// Streams stay alive until their audio runs out or they are terminated
pub struct FakeDriver {
    created_at: Instant,
    /// Real audio length per file; streams of unknown files play 60 s
    lengths: HashMap<PathBuf, f64>,
    failing: HashSet<PathBuf>,
    starts: Mutex<Vec<StartRecord>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            created_at: Instant::now(),
            lengths: HashMap::new(),
            failing: HashSet::new(),
            starts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_track(mut self, path: &str, seconds: f64) -> Self {
        self.lengths.insert(PathBuf::from(path), seconds);
        self
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(PathBuf::from(path));
        self
    }

    pub fn starts(&self) -> Vec<StartRecord> {
        self.starts.lock().unwrap().clone()
    }

    pub fn alive_count(&self) -> usize {
        self.starts().iter().filter(|s| s.is_alive()).count()
    }

    pub fn elapsed(&self) -> f64 {
        self.created_at.elapsed().as_secs_f64()
    }
}

#[async_trait]
impl OutputDriver for FakeDriver {
    async fn start(&self, request: StreamRequest) -> Result<Box<dyn StreamHandle>> {
        if self.failing.contains(&request.file_path) {
            return Err(Error::Playback(format!(
                "cannot open {}",
                request.file_path.display()
            )));
        }

        let length = self.lengths.get(&request.file_path).copied().unwrap_or(60.0);
        let remaining = (length - request.start_offset_seconds).max(0.0);
        let ends_at = Instant::now() + Duration::from_secs_f64(remaining);
        let terminated = Arc::new(AtomicBool::new(false));

        self.starts.lock().unwrap().push(StartRecord {
            request,
            at: self.elapsed(),
            ends_at,
            terminated: terminated.clone(),
        });

        Ok(Box::new(FakeStream {
            ends_at,
            terminated,
        }))
    }
}

struct FakeStream {
    ends_at: Instant,
    terminated: Arc<AtomicBool>,
}

#[async_trait]
impl StreamHandle for FakeStream {
    fn is_alive(&mut self) -> bool {
        !self.terminated.load(Ordering::SeqCst) && Instant::now() < self.ends_at
    }

    async fn terminate(&mut self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Fake probe and resolver
// ============================================================================

/// Probed durations per file; unknown files probe as 0 (failure)
#[derive(Default)]
pub struct FakeProbe {
    durations: HashMap<PathBuf, f64>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, path: &str, seconds: f64) -> Self {
        self.durations.insert(PathBuf::from(path), seconds);
        self
    }
}

#[async_trait]
impl DurationProbe for FakeProbe {
    async fn probe(&self, file_path: &Path) -> f64 {
        self.durations.get(file_path).copied().unwrap_or(0.0)
    }
}

/// Resolves track ids from a fixed table
#[derive(Default)]
pub struct StaticResolver {
    paths: HashMap<String, PathBuf>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, track_id: &str, path: &str) -> Self {
        self.paths.insert(track_id.to_string(), PathBuf::from(path));
        self
    }
}

#[async_trait]
impl TrackResolver for StaticResolver {
    async fn resolve(&self, track: &TrackInfo) -> Result<PathBuf> {
        self.paths
            .get(&track.track_id)
            .cloned()
            .ok_or_else(|| Error::Resolve(format!("{} not available", track)))
    }
}

// ============================================================================
// Engine construction
// ============================================================================

/// Driver and probe agreeing on the same track lengths
pub fn fakes(tracks: &[(&str, f64)]) -> (FakeDriver, FakeProbe) {
    let mut driver = FakeDriver::new();
    let mut probe = FakeProbe::new();
    for (path, seconds) in tracks {
        driver = driver.with_track(path, *seconds);
        probe = probe.with_track(path, *seconds);
    }
    (driver, probe)
}

pub fn engine(
    driver: Arc<FakeDriver>,
    probe: FakeProbe,
    crossfade_seconds: f64,
) -> (Arc<SharedState>, CrossfadeEngine) {
    let state = Arc::new(SharedState::new(100, crossfade_seconds));
    let engine = CrossfadeEngine::new(
        state.clone(),
        driver,
        Arc::new(probe),
        TICK,
        crossfade_seconds,
    );
    (state, engine)
}

pub fn track(path: &str) -> TrackRef {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    TrackRef {
        info: TrackInfo {
            track_id: stem.clone(),
            title: stem.to_uppercase(),
            artist: "Test Artist".to_string(),
        },
        file_path: PathBuf::from(path),
    }
}

/// Let the virtual clock run for `seconds`
pub async fn advance(seconds: f64) {
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
}

// ============================================================================
// Database
// ============================================================================

pub async fn memory_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    autodj_common::db::create_schema(&pool).await.unwrap();
    pool
}

pub async fn insert_request(pool: &Pool<Sqlite>, song_id: &str, requested_at: &str) -> i64 {
    sqlx::query("INSERT INTO queue (song_id, title, artist, requested_at) VALUES (?, ?, ?, ?)")
        .bind(song_id)
        .bind(song_id.to_uppercase())
        .bind("Test Artist")
        .bind(requested_at)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn insert_fallback(pool: &Pool<Sqlite>, song_id: &str, file_path: &str, position: i64) -> i64 {
    sqlx::query(
        "INSERT INTO auto_playlist_queue (song_id, title, artist, file_path, queue_position) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(song_id)
    .bind(song_id.to_uppercase())
    .bind("Auto DJ")
    .bind(file_path)
    .bind(position)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn is_played(pool: &Pool<Sqlite>, id: i64) -> bool {
    sqlx::query_scalar::<_, bool>("SELECT played FROM queue WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn history_song_ids(pool: &Pool<Sqlite>) -> Vec<String> {
    sqlx::query_scalar("SELECT song_id FROM recently_played ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}
