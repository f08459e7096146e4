//! Media inspection from FFprobe's human-readable report.
//!
//! A typical report contains, among other lines:
//!
//! ```text
//! Duration: 00:01:20.48, start: 0.000000, bitrate: 16534 kb/s
//! Stream #0:1[0x2](und): Video: h264 (High) (avc1 / 0x31637661), yuvj420p(pc, progressive), 828x1792, 16366 kb/s, 58.90 fps
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use transcoder_models::{parse_duration_seconds, MediaInfo};

use crate::engine::MediaEngine;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_if_exists;

/// Values extracted from a probe report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// `WxH` of the first video stream line carrying one
    pub dimensions: Option<(u32, u32)>,
    /// Whole seconds from the `Duration:` line, 0 when absent or `N/A`
    pub duration_seconds: u64,
}

/// Parse FFprobe's textual report.
pub fn parse_report(report: &str) -> MediaResult<ProbeReport> {
    let mut parsed = ProbeReport::default();
    let mut saw_duration = false;

    for line in report.lines() {
        let line = line.trim();

        if parsed.dimensions.is_none() && line.starts_with("Stream") {
            if let Some(dimensions) = parse_stream_dimensions(line) {
                parsed.dimensions = Some(dimensions);
            }
            continue;
        }

        if !saw_duration {
            if let Some(rest) = line.strip_prefix("Duration:") {
                saw_duration = true;
                parsed.duration_seconds = parse_duration_field(rest)?;
            }
        }
    }

    Ok(parsed)
}

/// Extract the first `WxH` pair from a `Stream ... Video: ...` line.
fn parse_stream_dimensions(line: &str) -> Option<(u32, u32)> {
    let (_, description) = line.split_once("Video:")?;

    description.split(", ").find_map(|item| {
        let item = item.trim();
        // "1920x1080 [SAR 1:1 DAR 16:9]" carries trailing aspect info.
        let token = item.split(' ').next().unwrap_or(item);
        let (w, h) = token.split_once('x')?;
        let width = w.parse().ok()?;
        let height = h.parse().ok()?;
        Some((width, height))
    })
}

/// Parse the remainder of a `Duration:` line (`00:01:20.48, start: ...`).
fn parse_duration_field(rest: &str) -> MediaResult<u64> {
    let value = rest.split(',').next().unwrap_or(rest).trim();
    if value == "N/A" {
        return Ok(0);
    }
    let seconds = parse_duration_seconds(value)?;
    Ok(seconds.max(0) as u64)
}

/// Probe a still image for its dimensions.
pub async fn probe_image(engine: &dyn MediaEngine, path: &Path) -> MediaResult<MediaInfo> {
    let report = parse_report(&engine.probe(path).await?)?;
    let (width, height) = report.dimensions.ok_or_else(|| MediaError::ProbeIncomplete {
        path: path.to_path_buf(),
        missing: "a video stream with WxH dimensions",
    })?;

    Ok(MediaInfo {
        width,
        height,
        duration_seconds: report.duration_seconds,
    })
}

/// Probe a video, correcting for container rotation.
///
/// Raw stream dimensions ignore rotation metadata, so one decoded frame is
/// written next to the source and probed for width/height. The duration comes
/// from the source itself. The frame file is removed whatever the outcome.
pub async fn probe_video_auto(engine: &dyn MediaEngine, path: &Path) -> MediaResult<MediaInfo> {
    let frame_path = one_frame_path(path);

    let frame_info = probe_single_frame(engine, path, &frame_path).await;
    if let Err(e) = remove_if_exists(&frame_path).await {
        warn!("Failed to remove probe frame {}: {}", frame_path.display(), e);
    }
    let frame_info = frame_info?;

    let report = parse_report(&engine.probe(path).await?)?;
    debug!(
        "Probed {}: {}x{} ({}s)",
        path.display(),
        frame_info.width,
        frame_info.height,
        report.duration_seconds
    );

    Ok(MediaInfo {
        width: frame_info.width,
        height: frame_info.height,
        duration_seconds: report.duration_seconds,
    })
}

async fn probe_single_frame(
    engine: &dyn MediaEngine,
    source: &Path,
    frame_path: &Path,
) -> MediaResult<MediaInfo> {
    engine.extract_frame(source, frame_path, None).await?;
    probe_image(engine, frame_path).await
}

/// `{source}.1f{ext}` next to the source.
fn one_frame_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(".1f");
    if let Some(ext) = source.extension() {
        name.push(".");
        name.push(ext);
    }
    PathBuf::from(name)
}
