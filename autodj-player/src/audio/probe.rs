//! Track duration via ffprobe

use super::DurationProbe;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    command: String,
}

impl FfprobeDurationProbe {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn probe(&self, file_path: &Path) -> f64 {
        let output = Command::new(&self.command)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(file_path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(PROBE_TIMEOUT, output).await {
            Ok(Ok(output)) if output.status.success() => {
                parse_duration(&String::from_utf8_lossy(&output.stdout)).unwrap_or_else(|| {
                    warn!("Unparsable duration for {}", file_path.display());
                    0.0
                })
            }
            Ok(Ok(output)) => {
                warn!(
                    "Duration probe failed for {} ({})",
                    file_path.display(),
                    output.status
                );
                0.0
            }
            Ok(Err(e)) => {
                warn!("Duration probe could not run: {}", e);
                0.0
            }
            Err(_) => {
                warn!("Duration probe timed out for {}", file_path.display());
                0.0
            }
        }
    }
}

/// Parse the probe's single-line output; rejects negative and non-finite values
pub fn parse_duration(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}
