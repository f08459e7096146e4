//! Task engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use transcoder_media::{check_ffmpeg, check_ffprobe, FfmpegEngine, MediaResult};

/// Task engine configuration.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Scratch directory holding uploads and derived artifacts
    pub work_dir: PathBuf,
    /// URL prefix under which `work_dir` is published
    pub public_prefix: String,
    /// Watch cadence while a task is still encoding
    pub active_poll_interval: Duration,
    /// Watch cadence once a task has ended (only detects removal)
    pub idle_poll_interval: Duration,
    /// Explicit ffmpeg binary, otherwise looked up on PATH
    pub ffmpeg_bin: Option<PathBuf>,
    /// Explicit ffprobe binary, otherwise looked up on PATH
    pub ffprobe_bin: Option<PathBuf>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("transcoder"),
            public_prefix: "/public".to_string(),
            active_poll_interval: Duration::from_secs(2),
            idle_poll_interval: Duration::from_secs(30),
            ffmpeg_bin: None,
            ffprobe_bin: None,
        }
    }
}

impl TaskConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("TRANSCODER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            public_prefix: std::env::var("TRANSCODER_PUBLIC_PREFIX")
                .unwrap_or(defaults.public_prefix),
            active_poll_interval: std::env::var("TRANSCODER_ACTIVE_POLL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.active_poll_interval),
            idle_poll_interval: std::env::var("TRANSCODER_IDLE_POLL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_poll_interval),
            ffmpeg_bin: std::env::var("FFMPEG_BIN").ok().map(PathBuf::from),
            ffprobe_bin: std::env::var("FFPROBE_BIN").ok().map(PathBuf::from),
        }
    }

    /// Build the FFmpeg-backed engine, resolving unset binaries on PATH.
    pub fn ffmpeg_engine(&self) -> MediaResult<FfmpegEngine> {
        let ffmpeg = match &self.ffmpeg_bin {
            Some(path) => path.clone(),
            None => check_ffmpeg()?,
        };
        let ffprobe = match &self.ffprobe_bin {
            Some(path) => path.clone(),
            None => check_ffprobe()?,
        };
        Ok(FfmpegEngine::new(ffmpeg, ffprobe))
    }
}
