#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for media probing and tiered transcoding.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - The [`MediaEngine`] capability with an FFmpeg-backed implementation
//! - Dimension/duration probing, including rotation-aware video probing
//! - Progress parsing from `-progress <file>` logs
//! - Supervised multi-stage transcode chains with cancellation

pub mod chain;
pub mod command;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;

pub use chain::{ChainHandle, ChainOutcome, ChainState, TranscodeChain};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use engine::{FfmpegEngine, MediaEngine, StageExit, StageProcess, TranscodeStage};
pub use error::{MediaError, MediaResult};
pub use fs_utils::remove_if_exists;
pub use probe::{parse_report, probe_image, probe_video_auto, ProbeReport};
pub use progress::{parse_progress_block, tail_progress_log};
