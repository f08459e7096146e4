//! The task record: one job per uploaded file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use transcoder_media::ChainHandle;
use transcoder_models::{MediaInfo, MimeCategory, ProgressInfo, TaskId};

/// State of one transcoding job.
///
/// Tasks are stored by value in the registry; readers work on clones and
/// write refreshed fields back with [`Task::merge_refresh`].
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Task {
    pub id: TaskId,
    /// Opaque identity of the uploader
    pub owner: String,
    /// Stored upload, `{work_dir}/{id}{ext}`
    pub origin_path: PathBuf,
    /// Upload extension including the dot, empty when absent
    pub ext: String,
    pub category: MimeCategory,
    pub media_info: MediaInfo,
    pub progress_info: ProgressInfo,
    /// Shared progress log of the transcode chain (video only)
    #[serde(skip)]
    pub progress_log_path: Option<PathBuf>,
    /// Artifacts produced by completed stages, in production order
    pub output_files: Vec<PathBuf>,
    /// Artifacts the running chain has yet to finish
    #[serde(skip)]
    pub pending_outputs: Vec<PathBuf>,
    /// Published URL of the primary output (images only)
    pub public_url: Option<String>,
    pub is_ended: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub chain: Option<ChainHandle>,
}

impl Task {
    /// Create a fresh, not yet processed task for a stored upload.
    pub fn new(
        id: TaskId,
        owner: impl Into<String>,
        origin_path: PathBuf,
        category: MimeCategory,
    ) -> Self {
        let ext = origin_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Self {
            id,
            owner: owner.into(),
            origin_path,
            ext,
            category,
            media_info: MediaInfo::default(),
            progress_info: ProgressInfo::default(),
            progress_log_path: None,
            output_files: Vec::new(),
            pending_outputs: Vec::new(),
            public_url: None,
            is_ended: false,
            created_at: Utc::now(),
            chain: None,
        }
    }

    pub fn is_video(&self) -> bool {
        self.category == MimeCategory::Video
    }

    /// Log to tail for progress, `None` once nothing is left to observe.
    pub fn active_progress_log(&self) -> Option<&Path> {
        if self.is_ended {
            return None;
        }
        self.progress_log_path.as_deref()
    }

    /// Move outputs of stages the chain reports as finished into
    /// `output_files`.
    pub fn sync_chain_outputs(&mut self) {
        let Some(chain) = &self.chain else {
            return;
        };
        let completed = chain.state().completed_outputs;
        let (done, pending): (Vec<_>, Vec<_>) = self
            .pending_outputs
            .drain(..)
            .partition(|p| completed.contains(p));
        self.output_files.extend(done);
        self.pending_outputs = pending;
    }

    /// Copy the mutable fields of a refreshed snapshot.
    ///
    /// `is_ended` never goes back to false, so a refresh cannot undo a
    /// concurrent cancellation.
    pub fn merge_refresh(&mut self, refreshed: &Task) {
        self.progress_info = refreshed.progress_info.clone();
        self.is_ended |= refreshed.is_ended;
        self.output_files = refreshed.output_files.clone();
        self.pending_outputs = refreshed.pending_outputs.clone();
    }

    /// Every file the task may own on disk.
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.origin_path.clone()];
        paths.extend(self.progress_log_path.iter().cloned());
        paths.extend(self.output_files.iter().cloned());
        paths.extend(self.pending_outputs.iter().cloned());
        paths
    }

    /// Public URLs of the completed outputs.
    pub fn output_urls(&self, public_prefix: &str) -> Vec<String> {
        self.output_files
            .iter()
            .filter_map(|p| public_url(public_prefix, p))
            .collect()
    }
}

/// `{prefix}/{file_name}` for an artifact in the work dir.
pub fn public_url(public_prefix: &str, path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_string_lossy();
    Some(format!("{}/{}", public_prefix.trim_end_matches('/'), file_name))
}
