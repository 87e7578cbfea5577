//! Music folder search

use super::{sanitize, TrackResolver};
use crate::error::{Error, Result};
use async_trait::async_trait;
use autodj_common::TrackInfo;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Audio extensions tried for every name pattern, in order
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "flac", "wav"];

/// Finds tracks in the top level of the music folder
///
/// Name patterns, most specific first: `artist - title`, `artist-title`,
/// `title`, then the track identifier. A file matches when its name contains
/// the pattern (case-insensitive) and ends with the extension.
#[derive(Debug, Clone)]
pub struct LibrarySearch {
    music_folder: PathBuf,
}

impl LibrarySearch {
    pub fn new(music_folder: impl Into<PathBuf>) -> Self {
        Self {
            music_folder: music_folder.into(),
        }
    }

    pub fn search_patterns(track: &TrackInfo) -> Vec<String> {
        let artist = sanitize(&track.artist);
        let title = sanitize(&track.title);
        let mut patterns = Vec::with_capacity(4);
        if !artist.is_empty() && !title.is_empty() {
            patterns.push(format!("{} - {}", artist, title));
            patterns.push(format!("{}-{}", artist, title));
        }
        if !title.is_empty() {
            patterns.push(title);
        }
        let id = track.track_id.trim();
        if !id.is_empty() {
            patterns.push(id.to_string());
        }
        patterns
    }

    /// Blocking scan; run through `spawn_blocking`
    pub fn find(music_folder: &Path, patterns: &[String]) -> Option<PathBuf> {
        let mut names: Vec<(String, PathBuf)> = WalkDir::new(music_folder)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                (
                    entry.file_name().to_string_lossy().to_lowercase(),
                    entry.into_path(),
                )
            })
            .collect();
        names.sort();

        for pattern in patterns {
            let pattern = pattern.to_lowercase();
            for ext in AUDIO_EXTENSIONS {
                let suffix = format!(".{}", ext);
                let hit = names.iter().find(|(name, _)| {
                    name.ends_with(&suffix) && name[..name.len() - suffix.len()].contains(&pattern)
                });
                if let Some((_, path)) = hit {
                    return Some(path.clone());
                }
            }
        }
        None
    }
}

#[async_trait]
impl TrackResolver for LibrarySearch {
    async fn resolve(&self, track: &TrackInfo) -> Result<PathBuf> {
        let patterns = Self::search_patterns(track);
        let folder = self.music_folder.clone();

        let found = tokio::task::spawn_blocking(move || Self::find(&folder, &patterns))
            .await
            .map_err(|e| Error::Internal(format!("Library search task failed: {}", e)))?;

        found.ok_or_else(|| Error::Resolve(format!("{} not in music folder", track)))
    }
}
