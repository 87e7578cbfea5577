//! Database models

use serde::{Deserialize, Serialize};

use crate::events::TrackInfo;

/// A song request in the shared `queue` table
///
/// Rows are created by the request front end and only ever mutated by
/// flipping `played` from false to true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntry {
    pub id: i64,
    pub song_id: String,
    pub title: String,
    pub artist: String,
    /// Ordering key (SQLite `DATETIME` text)
    pub requested_at: String,
    pub played: bool,
}

impl QueueEntry {
    pub fn track_info(&self) -> TrackInfo {
        TrackInfo {
            track_id: self.song_id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

/// A row of the `auto_playlist_queue` fallback list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FallbackEntry {
    pub id: i64,
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub file_path: String,
    pub queue_position: i64,
}

impl FallbackEntry {
    pub fn track_info(&self) -> TrackInfo {
        TrackInfo {
            track_id: self.song_id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

/// A row of the append-only `recently_played` history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub played_at: String,
}

/// A row of the `music_library` index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LibraryTrack {
    pub id: i64,
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub file_path: String,
    pub genre: Option<String>,
    pub downloaded: bool,
}
