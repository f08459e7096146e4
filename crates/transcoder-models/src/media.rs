//! Media descriptions: category, probed dimensions and live progress.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Media category derived from the upload's file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MimeCategory {
    Image,
    Video,
}

impl MimeCategory {
    /// Resolve the category of a file name from its extension.
    ///
    /// Returns `None` for anything that is not `image/*` or `video/*`.
    pub fn from_file_name(file_name: impl AsRef<Path>) -> Option<Self> {
        let mime = mime_guess::from_path(file_name).first()?;
        match mime.type_().as_str() {
            "image" => Some(MimeCategory::Image),
            "video" => Some(MimeCategory::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MimeCategory::Image => "image",
            MimeCategory::Video => "video",
        }
    }
}

impl std::fmt::Display for MimeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Probed media information, set once per task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MediaInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Duration in whole seconds (0 when unknown)
    pub duration_seconds: u64,
}

/// Transcode phase as self-reported by FFmpeg (`progress=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Continue,
    End,
}

impl Phase {
    /// Map a `progress=` value; anything but `end` is still running.
    pub fn parse(value: &str) -> Self {
        if value.trim() == "end" {
            Phase::End
        } else {
            Phase::Continue
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Continue => "continue",
            Phase::End => "end",
        }
    }
}

/// Most recent status block parsed from a progress log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressInfo {
    /// Current frame number
    pub frame: u64,
    /// Output time as reported (HH:MM:SS.micros)
    pub out_time: String,
    /// Output time in whole seconds
    pub out_time_seconds: i64,
    /// Encoding speed as reported (e.g. "1.5x")
    pub speed: String,
    /// continue | end
    pub phase: Phase,
}

impl ProgressInfo {
    /// Snapshot for tasks with nothing left to encode.
    pub fn ended() -> Self {
        Self {
            phase: Phase::End,
            ..Default::default()
        }
    }

    pub fn is_end(&self) -> bool {
        self.phase == Phase::End
    }

    /// Completion percentage given the probed duration in seconds.
    pub fn percentage(&self, total_seconds: u64) -> f64 {
        if self.is_end() {
            return 100.0;
        }
        if total_seconds == 0 || self.out_time_seconds <= 0 {
            return 0.0;
        }
        ((self.out_time_seconds as f64 / total_seconds as f64) * 100.0).min(100.0)
    }
}
