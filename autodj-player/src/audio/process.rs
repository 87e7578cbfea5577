//! Process-backed output streams
//!
//! Every stream is its own `ffplay -nodisp -autoexit` child. Volume, seek
//! offset and fades are fixed on the command line when the stream starts, so
//! a running stream is never modified; it is only polled and killed.

use super::{OutputDriver, StreamHandle, StreamRequest};
use crate::error::{Error, Result};
use crate::playback::types::FadeSpec;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Spawns one player process per stream
#[derive(Debug, Clone)]
pub struct ProcessOutputDriver {
    command: String,
    audio_device: Option<String>,
}

impl ProcessOutputDriver {
    pub fn new(command: impl Into<String>, audio_device: Option<String>) -> Self {
        Self {
            command: command.into(),
            audio_device,
        }
    }

    /// Player arguments for a stream (without the program name)
    pub fn build_args(request: &StreamRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-nodisp".into(),
            "-autoexit".into(),
            "-loglevel".into(),
            "quiet".into(),
            "-volume".into(),
            request.volume_percent.min(100).to_string(),
        ];

        if request.start_offset_seconds > 0.0 {
            args.push("-ss".into());
            args.push(format!("{:.3}", request.start_offset_seconds));
        }

        if let Some(filter) = fade_filter(&request.fade, request.start_offset_seconds) {
            args.push("-af".into());
            args.push(filter);
        }

        args.push(request.file_path.to_string_lossy().into_owned());
        args
    }
}

/// `afade` filter chain; timestamps are track positions (seeking keeps them)
fn fade_filter(fade: &FadeSpec, start_offset: f64) -> Option<String> {
    let mut filters = Vec::new();

    if let Some(seconds) = fade.fade_in_seconds.filter(|s| *s > 0.0) {
        filters.push(format!("afade=t=in:st={:.3}:d={:.3}", start_offset, seconds));
    }
    if let Some(out) = fade.fade_out.filter(|f| f.duration_seconds > 0.0) {
        filters.push(format!(
            "afade=t=out:st={:.3}:d={:.3}",
            out.start_seconds.max(0.0),
            out.duration_seconds
        ));
    }

    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

#[async_trait]
impl OutputDriver for ProcessOutputDriver {
    async fn start(&self, request: StreamRequest) -> Result<Box<dyn StreamHandle>> {
        if !request.file_path.exists() {
            return Err(Error::Playback(format!(
                "File not found: {}",
                request.file_path.display()
            )));
        }

        let args = Self::build_args(&request);
        let mut command = Command::new(&self.command);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(device) = &self.audio_device {
            command.env("AUDIODEV", device);
        }

        let child = command.spawn().map_err(|e| {
            Error::Playback(format!("Failed to start {}: {}", self.command, e))
        })?;

        debug!(
            "Started stream pid={:?} file={} offset={:.1}s volume={}",
            child.id(),
            request.file_path.display(),
            request.start_offset_seconds,
            request.volume_percent
        );

        Ok(Box::new(ProcessStream { child }))
    }
}

/// Handle to one player child process
#[derive(Debug)]
pub struct ProcessStream {
    child: Child,
}

#[async_trait]
impl StreamHandle for ProcessStream {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn terminate(&mut self) {
        if !self.is_alive() {
            return;
        }
        if let Err(e) = self.child.kill().await {
            // Exited between the check and the kill
            warn!("Stream termination: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(offset: f64, fade: FadeSpec) -> StreamRequest {
        StreamRequest {
            file_path: PathBuf::from("/music/a.mp3"),
            volume_percent: 80,
            start_offset_seconds: offset,
            fade,
        }
    }

    #[test]
    fn test_args_plain_start() {
        let args = ProcessOutputDriver::build_args(&request(0.0, FadeSpec::none()));
        assert_eq!(
            args,
            vec!["-nodisp", "-autoexit", "-loglevel", "quiet", "-volume", "80", "/music/a.mp3"]
        );
    }

    #[test]
    fn test_args_fade_out_and_resume_offset() {
        let args = ProcessOutputDriver::build_args(&request(
            12.0,
            FadeSpec::none().with_fade_out(20.0, 10.0),
        ));
        assert!(args.windows(2).any(|w| w == ["-ss", "12.000"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["-af", "afade=t=out:st=20.000:d=10.000"]));
        assert_eq!(args.last().map(String::as_str), Some("/music/a.mp3"));
    }

    #[test]
    fn test_args_fade_in() {
        let args = ProcessOutputDriver::build_args(&request(0.0, FadeSpec::fade_in(10.0)));
        assert!(args
            .windows(2)
            .any(|w| w == ["-af", "afade=t=in:st=0.000:d=10.000"]));
    }

    #[tokio::test]
    async fn test_start_missing_file_fails() {
        let driver = ProcessOutputDriver::new("ffplay", None);
        let mut req = request(0.0, FadeSpec::none());
        req.file_path = PathBuf::from("/definitely/missing.mp3");
        assert!(matches!(driver.start(req).await, Err(Error::Playback(_))));
    }
}
