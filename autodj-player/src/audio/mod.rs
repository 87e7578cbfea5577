//! Audio output and duration probing
//!
//! Each audible stream is an independent output handle. The crossfade engine
//! owns at most two of them (primary and overlap) and is the only caller of
//! [`OutputDriver::start`] and [`StreamHandle::terminate`].

pub mod probe;
pub mod process;

pub use probe::FfprobeDurationProbe;
pub use process::ProcessOutputDriver;

use crate::error::Result;
use crate::playback::types::FadeSpec;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// Parameters of one stream start
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub file_path: PathBuf,
    /// 0-100, fixed for the life of the stream
    pub volume_percent: u8,
    pub start_offset_seconds: f64,
    pub fade: FadeSpec,
}

/// Starts output streams
#[async_trait]
pub trait OutputDriver: Send + Sync {
    /// Start a stream; fails if the output could not be opened
    async fn start(&self, request: StreamRequest) -> Result<Box<dyn StreamHandle>>;
}

/// A running (or exited) output stream
#[async_trait]
pub trait StreamHandle: Send {
    /// True until the stream exits, naturally or by termination
    fn is_alive(&mut self) -> bool;

    /// Stop the stream; idempotent, never fails
    async fn terminate(&mut self);
}

/// Reads a track's duration
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration in seconds, 0.0 when it cannot be determined
    async fn probe(&self, file_path: &Path) -> f64;
}

/// Check that an external tool can be executed
pub async fn tool_available(command: &str, version_arg: &str) -> bool {
    match Command::new(command)
        .arg(version_arg)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

/// Log the availability of each external tool (warning only)
pub async fn check_tools(tools: &[(&str, &str)]) {
    for (command, version_arg) in tools {
        if tool_available(command, version_arg).await {
            info!("External tool available: {}", command);
        } else {
            warn!("External tool not runnable: {} (related features will fail)", command);
        }
    }
}
