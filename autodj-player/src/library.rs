//! Music library index population
//!
//! Registers the mp3 files of the music folder in `music_library`, which the
//! fallback playlist generator draws from.

use crate::error::Result;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const SONG_ID_MAX_CHARS: usize = 50;

/// Metadata derived from a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFileName {
    pub song_id: String,
    pub title: String,
    pub artist: String,
}

/// Parse an `Artist - Title` file stem
///
/// Stems without the separator get `Unknown Artist` and the whole stem as
/// title. The song id is the stem with spaces and dashes turned into
/// underscores, cut to 50 characters.
pub fn parse_file_stem(stem: &str) -> ParsedFileName {
    let (artist, title) = match stem.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => (UNKNOWN_ARTIST.to_string(), stem.to_string()),
    };

    let song_id = stem
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .take(SONG_ID_MAX_CHARS)
        .collect();

    ParsedFileName {
        song_id,
        title,
        artist,
    }
}

/// Counts reported by [`populate_library`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulateReport {
    pub found: usize,
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Top-level `*.mp3` files of the folder, sorted
pub fn scan_mp3_files(music_folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(music_folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("mp3"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Insert every unregistered mp3 of `music_folder` into `music_library`
pub async fn populate_library(db: &Pool<Sqlite>, music_folder: &Path) -> Result<PopulateReport> {
    let folder = music_folder.to_path_buf();
    let files = tokio::task::spawn_blocking(move || scan_mp3_files(&folder))
        .await
        .map_err(|e| crate::error::Error::Internal(format!("Folder scan failed: {}", e)))?;

    let mut report = PopulateReport {
        found: files.len(),
        ..Default::default()
    };
    info!("Found {} music files in {}", files.len(), music_folder.display());

    for file in files {
        let Some(stem) = file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let path_str = file.to_string_lossy().into_owned();

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM music_library WHERE file_path = ?")
                .bind(&path_str)
                .fetch_optional(db)
                .await?;
        if existing.is_some() {
            debug!("Skipped (already registered): {}", stem);
            report.skipped += 1;
            continue;
        }

        let parsed = parse_file_stem(&stem);
        let inserted = sqlx::query(
            r#"
            INSERT INTO music_library (song_id, title, artist, file_path, genre, downloaded)
            VALUES (?, ?, ?, ?, 'general', 1)
            "#,
        )
        .bind(&parsed.song_id)
        .bind(&parsed.title)
        .bind(&parsed.artist)
        .bind(&path_str)
        .execute(db)
        .await;

        match inserted {
            Ok(_) => {
                info!("Added: {} - {}", parsed.artist, parsed.title);
                report.added += 1;
            }
            Err(e) => {
                warn!("Could not add {}: {}", stem, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autodj_common::db::LibraryTrack;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn test_parse_artist_title() {
        let parsed = parse_file_stem("Daft Punk - One More Time");
        assert_eq!(parsed.artist, "Daft Punk");
        assert_eq!(parsed.title, "One More Time");
        assert_eq!(parsed.song_id, "Daft_Punk___One_More_Time");
    }

    #[test]
    fn test_parse_without_separator() {
        let parsed = parse_file_stem("mystery-track");
        assert_eq!(parsed.artist, "Unknown Artist");
        assert_eq!(parsed.title, "mystery-track");
        assert_eq!(parsed.song_id, "mystery_track");
    }

    #[test]
    fn test_song_id_truncated() {
        let parsed = parse_file_stem(&"x".repeat(80));
        assert_eq!(parsed.song_id.chars().count(), 50);
    }

    #[tokio::test]
    async fn test_populate_skips_registered_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Band - Song.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("Loose Track.MP3"), b"x").unwrap();
        std::fs::write(dir.path().join("cover.jpg"), b"x").unwrap();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        autodj_common::db::create_schema(&pool).await.unwrap();

        let first = populate_library(&pool, dir.path()).await.unwrap();
        assert_eq!(first.found, 2);
        assert_eq!(first.added, 2);
        assert_eq!(first.skipped, 0);

        let second = populate_library(&pool, dir.path()).await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, 2);

        let tracks: Vec<LibraryTrack> = sqlx::query_as(
            "SELECT id, song_id, title, artist, file_path, genre, downloaded FROM music_library ORDER BY file_path",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tracks[0].artist, "Band");
        assert_eq!(tracks[0].genre.as_deref(), Some("general"));
        assert!(tracks[0].downloaded);
        assert_eq!(tracks[1].artist, "Unknown Artist");
    }
}
