//! Track source resolution
//!
//! Turns a requested track into a local audio file: first by searching the
//! music folder, then by downloading it.

pub mod download;
pub mod library;

pub use download::Downloader;
pub use library::LibrarySearch;

use crate::error::{Error, Result};
use async_trait::async_trait;
use autodj_common::TrackInfo;
use std::path::PathBuf;
use tracing::debug;

/// Locates the audio file for a track
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Local file path, or `Error::Resolve` when the track is unavailable
    async fn resolve(&self, track: &TrackInfo) -> Result<PathBuf>;
}

/// Tries each resolver in order, returning the first hit
pub struct ChainResolver {
    resolvers: Vec<Box<dyn TrackResolver>>,
}

impl ChainResolver {
    pub fn new(resolvers: Vec<Box<dyn TrackResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl TrackResolver for ChainResolver {
    async fn resolve(&self, track: &TrackInfo) -> Result<PathBuf> {
        let mut last_error = None;
        for resolver in &self.resolvers {
            match resolver.resolve(track).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    debug!("Resolver miss for {}: {}", track, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Resolve(format!("No source for {}", track))))
    }
}

/// Keep alphanumerics, space, `-` and `_`; trim the result
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}
