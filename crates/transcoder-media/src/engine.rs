//! The external transcoding engine as an injectable capability.
//!
//! Everything the task engine needs from FFmpeg goes through [`MediaEngine`],
//! so tests can substitute a fake without spawning processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;

use transcoder_models::encoding::{AUDIO_BITRATE, AUDIO_CHANNELS, AUDIO_CODEC, IMAGE_QUALITY, TRANSCODE_CRF};
use transcoder_models::Tier;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Exit report of a finished stage process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageExit {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl StageExit {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running transcode process.
#[async_trait]
pub trait StageProcess: Send {
    /// Wait for the process to exit.
    async fn wait(&mut self) -> MediaResult<StageExit>;

    /// Terminate the process.
    async fn kill(&mut self) -> MediaResult<()>;
}

/// One encode of a source into a tier, reporting to a progress log.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeStage {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub tier: Tier,
    pub progress_log: PathBuf,
}

impl TranscodeStage {
    /// FFmpeg invocation for this stage.
    pub fn to_command(&self) -> FfmpegCommand {
        FfmpegCommand::new(&self.source, &self.destination)
            .video_codec(self.tier.codec.encoder())
            .video_filter(self.tier.video_filter())
            .audio_codec(AUDIO_CODEC)
            .audio_channels(AUDIO_CHANNELS)
            .audio_bitrate(AUDIO_BITRATE)
            .constant_quality(TRANSCODE_CRF)
            .progress_log(&self.progress_log)
    }
}

/// Capabilities consumed from the external media engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Produce the engine's textual analysis report for a file.
    async fn probe(&self, path: &Path) -> MediaResult<String>;

    /// Decode a single frame of `source` into `destination`, optionally scaled.
    async fn extract_frame(
        &self,
        source: &Path,
        destination: &Path,
        scale: Option<(u32, u32)>,
    ) -> MediaResult<()>;

    /// Re-encode a still image; the codec follows the destination extension.
    async fn encode_image(&self, source: &Path, destination: &Path) -> MediaResult<()>;

    /// Start a long-running transcode without waiting for it.
    fn start_transcode(&self, stage: &TranscodeStage) -> MediaResult<Box<dyn StageProcess>>;
}

/// [`MediaEngine`] backed by the `ffmpeg` / `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    runner: FfmpegRunner,
    ffprobe: PathBuf,
}

impl FfmpegEngine {
    /// Create an engine from explicit binary paths.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            runner: FfmpegRunner::new(ffmpeg),
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe(&self, path: &Path) -> MediaResult<String> {
        if !tokio::fs::try_exists(path).await? {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        debug!("Running FFprobe: ffprobe {}", path.display());
        let output = Command::new(&self.ffprobe)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MediaError::spawn_failed(self.ffprobe.to_string_lossy(), e))?;

        // The human-readable report goes to stderr.
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: format!("FFprobe failed on {}", path.display()),
                stderr: Some(stderr),
            });
        }

        let mut report = String::from_utf8_lossy(&output.stdout).to_string();
        report.push_str(&stderr);
        Ok(report)
    }

    async fn extract_frame(
        &self,
        source: &Path,
        destination: &Path,
        scale: Option<(u32, u32)>,
    ) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::new(source, destination);
        if let Some((width, height)) = scale {
            cmd = cmd.video_filter(format!("scale={}x{}", width, height));
        }
        let cmd = cmd.single_frame().quality(IMAGE_QUALITY);
        self.runner.run(&cmd).await
    }

    async fn encode_image(&self, source: &Path, destination: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(source, destination).quality(IMAGE_QUALITY);
        self.runner.run(&cmd).await
    }

    fn start_transcode(&self, stage: &TranscodeStage) -> MediaResult<Box<dyn StageProcess>> {
        let child = self.runner.spawn(&stage.to_command())?;
        Ok(Box::new(FfmpegProcess { child }))
    }
}

/// A spawned FFmpeg child.
struct FfmpegProcess {
    child: Child,
}

#[async_trait]
impl StageProcess for FfmpegProcess {
    async fn wait(&mut self) -> MediaResult<StageExit> {
        let status = self.child.wait().await?;
        Ok(StageExit {
            code: status.code(),
        })
    }

    async fn kill(&mut self) -> MediaResult<()> {
        self.child.kill().await?;
        Ok(())
    }
}
