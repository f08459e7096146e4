//! Task engine error types.

use std::path::PathBuf;

use thiserror::Error;
use transcoder_media::MediaError;
use transcoder_models::TaskId;

pub type TaskResult<T> = Result<T, TaskError>;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Unsupported file type: {file_name}")]
    UnsupportedMediaType { file_name: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Probe failed: {0}")]
    Probe(#[source] MediaError),

    #[error("Encode failed: {0}")]
    Encode(#[source] MediaError),

    #[error("Failed to launch transcode: {0}")]
    EncodeLaunch(#[source] MediaError),

    #[error("Failed to read progress: {0}")]
    ProgressParse(#[source] MediaError),

    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported(file_name: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            file_name: file_name.into(),
        }
    }

    /// Classify a progress-log failure.
    pub fn from_progress(err: MediaError) -> Self {
        match err {
            MediaError::ProgressParse { .. } | MediaError::Timestamp(_) => {
                Self::ProgressParse(err)
            }
            other => Self::Media(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskError::NotFound(_))
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TaskError::UnsupportedMediaType { .. } => "unsupported_media_type",
            TaskError::Io { .. } => "io",
            TaskError::Probe(_) => "probe",
            TaskError::Encode(_) => "encode",
            TaskError::EncodeLaunch(_) => "encode_launch",
            TaskError::ProgressParse(_) => "progress_parse",
            TaskError::NotFound(_) => "not_found",
            TaskError::Media(_) => "media",
        }
    }
}
