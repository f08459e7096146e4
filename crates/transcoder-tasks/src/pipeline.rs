//! Transcode pipeline: turns a stored upload into outputs.
//!
//! Images are compressed synchronously into every [`ImageVariant`]. Videos
//! get a synchronous cover frame and an asynchronous two-stage chain (low
//! tier, then high tier) reporting to one shared progress log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;
use transcoder_media::{
    probe_image, probe_video_auto, remove_if_exists, MediaEngine, TranscodeChain, TranscodeStage,
};
use transcoder_models::timestamp::format_seconds;
use transcoder_models::{artifact_stem, ImageVariant, ProgressInfo, Tier};

use crate::error::{TaskError, TaskResult};
use crate::logging::TaskLogger;
use crate::task::{public_url, Task};

/// Drives the media engine for new tasks.
#[derive(Clone)]
pub struct TranscodePipeline {
    engine: Arc<dyn MediaEngine>,
    work_dir: PathBuf,
    public_prefix: String,
}

impl TranscodePipeline {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        work_dir: impl Into<PathBuf>,
        public_prefix: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            work_dir: work_dir.into(),
            public_prefix: public_prefix.into(),
        }
    }

    /// Compress an image into all variants at its original resolution.
    ///
    /// The task is ended on return.
    pub async fn process_image(&self, task: &mut Task) -> TaskResult<()> {
        let logger = TaskLogger::new(&task.id, "process_image");

        task.media_info = probe_image(self.engine.as_ref(), &task.origin_path)
            .await
            .map_err(TaskError::Probe)?;
        let stem = artifact_stem(
            task.id.as_str(),
            task.media_info.width,
            task.media_info.height,
        );

        for variant in ImageVariant::ALL {
            let destination = self.artifact(&stem, variant.extension());
            if let Err(e) = self
                .engine
                .encode_image(&task.origin_path, &destination)
                .await
            {
                discard(&destination).await;
                return Err(TaskError::Encode(e));
            }
            task.output_files.push(destination);
        }

        task.public_url = task
            .output_files
            .first()
            .and_then(|p| public_url(&self.public_prefix, p));
        task.progress_info = ProgressInfo::ended();
        task.is_ended = true;

        logger.log_completion(&format!(
            "{}x{} compressed into {} variants",
            task.media_info.width,
            task.media_info.height,
            task.output_files.len()
        ));
        Ok(())
    }

    /// Probe a video, extract its cover and launch the tier chain.
    ///
    /// Returns as soon as the first stage is running.
    pub async fn process_video(&self, task: &mut Task) -> TaskResult<()> {
        let logger = TaskLogger::new(&task.id, "process_video");

        task.media_info = probe_video_auto(self.engine.as_ref(), &task.origin_path)
            .await
            .map_err(TaskError::Probe)?;
        let low = Tier::low(&task.media_info);
        let high = Tier::high(&task.media_info);

        let stem = artifact_stem(task.id.as_str(), low.width, low.height);
        let progress_log = self.artifact(&stem, "progress.txt");
        task.progress_log_path = Some(progress_log.clone());

        let cover = self.artifact(&stem, "cover.avif");
        if let Err(e) = self
            .engine
            .extract_frame(&task.origin_path, &cover, Some((low.width, low.height)))
            .await
        {
            discard(&cover).await;
            return Err(TaskError::Encode(e));
        }
        task.output_files.push(cover);

        let stages: Vec<TranscodeStage> = [low, high]
            .into_iter()
            .map(|tier| TranscodeStage {
                source: task.origin_path.clone(),
                destination: self.artifact(&stem, &format!("{}.mp4", tier.codec.label())),
                tier,
                progress_log: progress_log.clone(),
            })
            .collect();
        let outputs: Vec<PathBuf> = stages.iter().map(|s| s.destination.clone()).collect();

        let chain =
            TranscodeChain::start(self.engine.clone(), stages).map_err(TaskError::EncodeLaunch)?;
        task.pending_outputs = outputs;
        task.chain = Some(chain);

        logger.log_progress(&format!(
            "{}x{} ({}) transcoding to {}x{} {} then {}x{} {}",
            task.media_info.width,
            task.media_info.height,
            format_seconds(task.media_info.duration_seconds),
            low.width,
            low.height,
            low.codec.label(),
            high.width,
            high.height,
            high.codec.label()
        ));
        Ok(())
    }

    /// `{work_dir}/{stem}.{suffix}`
    fn artifact(&self, stem: &str, suffix: &str) -> PathBuf {
        self.work_dir.join(format!("{}.{}", stem, suffix))
    }
}

/// Remove a half-written artifact after a failed encode.
async fn discard(path: &Path) {
    if let Err(e) = remove_if_exists(path).await {
        warn!("Failed to remove partial artifact {}: {}", path.display(), e);
    }
}
