//! Shared data models for the transcoder task engine.
//!
//! This crate provides Serde-serializable types and pure helpers for:
//! - Task identifiers and media categories
//! - Probed media information and progress snapshots
//! - Output tiers and encoding constants
//! - Timestamp parsing and aspect-preserving fitting

pub mod encoding;
pub mod fit;
pub mod media;
pub mod task;
pub mod timestamp;

// Re-export common types
pub use encoding::{artifact_stem, ImageVariant, Tier, VideoCodec};
pub use fit::fit_constraint;
pub use media::{MediaInfo, MimeCategory, Phase, ProgressInfo};
pub use task::TaskId;
pub use timestamp::{parse_duration_seconds, TimestampError};
