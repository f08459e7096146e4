//! Encoding constants and output tiers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::fit::fit_constraint;
use crate::media::MediaInfo;

/// Low-bandwidth tier bounding box (AV1).
pub const LOW_TIER_MAX_WIDTH: u32 = 256;
pub const LOW_TIER_MAX_HEIGHT: u32 = 640;

/// Higher-quality tier bounding box (HEVC).
pub const HIGH_TIER_MAX_WIDTH: u32 = 640;
pub const HIGH_TIER_MAX_HEIGHT: u32 = 640;

/// Frame-rate cap applied to every video tier.
pub const TRANSCODE_FPS: u32 = 10;
/// Constant Rate Factor for video tiers.
pub const TRANSCODE_CRF: u8 = 42;

/// Audio settings shared by all video tiers.
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_CHANNELS: u8 = 1;
pub const AUDIO_BITRATE: &str = "24k";

/// `-q:v` used for still images and covers.
pub const IMAGE_QUALITY: u8 = 31;

/// Video codec of an output tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    Av1,
    Hevc,
}

impl VideoCodec {
    /// FFmpeg encoder name.
    pub fn encoder(&self) -> &'static str {
        match self {
            VideoCodec::Av1 => "libaom-av1",
            VideoCodec::Hevc => "libx265",
        }
    }

    /// Variant label used in artifact file names.
    pub fn label(&self) -> &'static str {
        match self {
            VideoCodec::Av1 => "av1",
            VideoCodec::Hevc => "hevc",
        }
    }
}

/// A target (resolution, codec) pairing for one video output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Tier {
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodec,
}

impl Tier {
    /// Low-bandwidth tier fitted to the source dimensions.
    pub fn low(info: &MediaInfo) -> Self {
        let (width, height) =
            fit_constraint(LOW_TIER_MAX_WIDTH, LOW_TIER_MAX_HEIGHT, info.width, info.height);
        Self {
            width,
            height,
            codec: VideoCodec::Av1,
        }
    }

    /// Higher-quality tier fitted to the source dimensions.
    pub fn high(info: &MediaInfo) -> Self {
        let (width, height) =
            fit_constraint(HIGH_TIER_MAX_WIDTH, HIGH_TIER_MAX_HEIGHT, info.width, info.height);
        Self {
            width,
            height,
            codec: VideoCodec::Hevc,
        }
    }

    /// `scale=WxH,fps=N` filter for this tier.
    pub fn video_filter(&self) -> String {
        format!("scale={}x{},fps={}", self.width, self.height, TRANSCODE_FPS)
    }
}

/// Still-image output variants, primary first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageVariant {
    /// Compact primary codec
    Avif,
    /// Widely supported fallback
    Webp,
}

impl ImageVariant {
    /// Variants in production order; the first one is published.
    pub const ALL: [ImageVariant; 2] = [ImageVariant::Avif, ImageVariant::Webp];

    pub fn extension(&self) -> &'static str {
        match self {
            ImageVariant::Avif => "avif",
            ImageVariant::Webp => "webp",
        }
    }
}

/// Build the `{id}@{w}x{h}` artifact stem.
pub fn artifact_stem(task_id: &str, width: u32, height: u32) -> String {
    format!("{}@{}x{}", task_id, width, height)
}
