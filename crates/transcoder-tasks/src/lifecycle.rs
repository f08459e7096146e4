//! Task-level progress and cleanup operations.

use tracing::{debug, warn};
use transcoder_media::{remove_if_exists, tail_progress_log};
use transcoder_models::ProgressInfo;

use crate::error::{TaskError, TaskResult};
use crate::metrics;
use crate::task::Task;

impl Task {
    /// Whether the task has reached a terminal state.
    ///
    /// Images are ended from creation. A video is ended once its log reports
    /// `end` while the chain is on its last stage; the first stage's own
    /// `end` record does not count.
    pub async fn check_is_ended(&self) -> TaskResult<bool> {
        if self.is_ended || !self.is_video() {
            return Ok(true);
        }
        let final_stage = self.on_final_stage();
        let progress = self.read_progress().await?;
        Ok(final_stage && progress.is_end())
    }

    /// Refresh `progress_info` from the log.
    ///
    /// No-op for ended tasks. On a parse failure the previous snapshot is
    /// kept and the error returned.
    pub async fn load_progress(&mut self) -> TaskResult<()> {
        self.sync_chain_outputs();
        if self.is_ended || !self.is_video() {
            return Ok(());
        }

        let final_stage = self.on_final_stage();
        let progress = self.read_progress().await?;
        if final_stage && progress.is_end() {
            debug!(task_id = %self.id, "Transcode reported end on final stage");
            self.is_ended = true;
        }
        self.progress_info = progress;
        Ok(())
    }

    /// Best-effort removal of every file the task owns.
    ///
    /// Failures are logged and skipped. A running chain is left alone.
    /// Returns the number of files actually removed.
    pub async fn clean_files(&self) -> usize {
        let mut removed = 0;
        for path in self.artifact_paths() {
            match remove_if_exists(&path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    metrics::record_cleanup_failure();
                    warn!(
                        task_id = %self.id,
                        "Failed to remove {}: {}", path.display(), e
                    );
                }
            }
        }
        removed
    }

    async fn read_progress(&self) -> TaskResult<ProgressInfo> {
        tail_progress_log(self.active_progress_log())
            .await
            .map_err(TaskError::from_progress)
    }

    /// Sampled before the log is read: the chain resets the log before it
    /// advances, so a final-stage sample guarantees the log read afterwards
    /// was written by the final stage.
    fn on_final_stage(&self) -> bool {
        self.chain
            .as_ref()
            .map_or(true, |chain| chain.state().on_final_stage())
    }
}
