//! Network download fallback (yt-dlp)

use super::{sanitize, TrackResolver};
use crate::error::{Error, Result};
use async_trait::async_trait;
use autodj_common::TrackInfo;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Downloads a track as mp3 into the music folder
#[derive(Debug, Clone)]
pub struct Downloader {
    command: String,
    url_template: String,
    music_folder: PathBuf,
    timeout: Duration,
}

impl Downloader {
    pub fn new(
        command: impl Into<String>,
        url_template: impl Into<String>,
        music_folder: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            url_template: url_template.into(),
            music_folder: music_folder.into(),
            timeout,
        }
    }

    /// Target file: `<music>/<artist - title>.mp3`, sanitized
    pub fn output_path(&self, track: &TrackInfo) -> Option<PathBuf> {
        let stem = sanitize(&format!("{} - {}", track.artist, track.title));
        if stem.is_empty() || stem == "-" {
            return None;
        }
        Some(self.music_folder.join(format!("{}.mp3", stem)))
    }

    pub fn source_url(&self, track: &TrackInfo) -> String {
        self.url_template.replace("{id}", track.track_id.trim())
    }
}

#[async_trait]
impl TrackResolver for Downloader {
    async fn resolve(&self, track: &TrackInfo) -> Result<PathBuf> {
        if track.track_id.trim().is_empty() {
            return Err(Error::Resolve(format!("{} has no identifier to download", track)));
        }
        let output = self
            .output_path(track)
            .ok_or_else(|| Error::Resolve(format!("No usable file name for {}", track)))?;

        if output.exists() {
            info!("Already downloaded: {}", output.display());
            return Ok(output);
        }

        tokio::fs::create_dir_all(&self.music_folder).await?;

        let url = self.source_url(track);
        info!("Downloading {} from {}", track, url);

        let status = Command::new(&self.command)
            .args(["-x", "--audio-format", "mp3", "--audio-quality", "0", "-o"])
            .arg(&output)
            .args(["--no-playlist", "--quiet"])
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        let status = match tokio::time::timeout(self.timeout, status).await {
            Ok(result) => result.map_err(|e| {
                Error::Download(format!("Failed to run {}: {}", self.command, e))
            })?,
            Err(_) => {
                warn!("Download of {} timed out after {:?}", track, self.timeout);
                return Err(Error::Download(format!("Timed out downloading {}", track)));
            }
        };

        if status.success() && output.exists() {
            info!("Downloaded {}", output.display());
            Ok(output)
        } else {
            Err(Error::Download(format!(
                "{} exited with {} for {}",
                self.command, status, track
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader(folder: &std::path::Path) -> Downloader {
        Downloader::new(
            "autodj-no-such-downloader-xyz",
            "https://www.youtube.com/watch?v={id}",
            folder,
            Duration::from_secs(5),
        )
    }

    fn track() -> TrackInfo {
        TrackInfo {
            track_id: "dQw4w9WgXcQ".into(),
            title: "Never Gonna Give You Up!".into(),
            artist: "Rick Astley".into(),
        }
    }

    #[test]
    fn test_output_path_and_url() {
        let d = downloader(std::path::Path::new("/music"));
        assert_eq!(
            d.output_path(&track()).unwrap(),
            PathBuf::from("/music/Rick Astley - Never Gonna Give You Up.mp3")
        );
        assert_eq!(
            d.source_url(&track()),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[tokio::test]
    async fn test_existing_target_reused() {
        let dir = tempfile::tempdir().unwrap();
        let d = downloader(dir.path());
        let target = d.output_path(&track()).unwrap();
        std::fs::write(&target, b"x").unwrap();

        assert_eq!(d.resolve(&track()).await.unwrap(), target);
    }

    #[tokio::test]
    async fn test_missing_tool_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = downloader(dir.path()).resolve(&track()).await;
        assert!(matches!(result, Err(Error::Download(_))));
    }
}
