//! FFmpeg `-progress` log parsing.
//!
//! FFmpeg appends one status block per update:
//!
//! ```text
//! frame=7233
//! fps=48.76
//! out_time=00:04:01.100000
//! speed=1.63x
//! progress=continue
//! ```
//!
//! There is no record delimiter besides `progress=`, so the tail of the log is
//! folded key by key and later values win.

use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use transcoder_models::{parse_duration_seconds, Phase, ProgressInfo};

use crate::error::{MediaError, MediaResult};

/// Lines read from the end of the log; enough for one full status block.
pub const TAIL_LINES: usize = 12;

const TAIL_CHUNK: u64 = 4096;

/// Read the latest progress snapshot of a transcode.
///
/// Without a log path (images, or tasks that no longer encode) the snapshot
/// is synthesized as ended and the filesystem is not touched. A log that does
/// not exist yet means the encoder has not reported, which reads as
/// `continue`.
pub async fn tail_progress_log(log_path: Option<&Path>) -> MediaResult<ProgressInfo> {
    let Some(path) = log_path else {
        return Ok(ProgressInfo::ended());
    };

    match read_tail_lines(path, TAIL_LINES).await {
        Ok(text) => parse_progress_block(&text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(ProgressInfo::default()),
        Err(e) => Err(e.into()),
    }
}

/// Fold `key=value` lines into a snapshot, later keys overwriting earlier ones.
///
/// Unknown keys and lines that are not a single `key=value` pair are skipped.
/// A malformed `frame` or `out_time` fails the whole call. `speed` is kept
/// verbatim, padding included (FFmpeg right-aligns it).
pub fn parse_progress_block(text: &str) -> MediaResult<ProgressInfo> {
    let mut progress = ProgressInfo::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split('=');
        let (Some(key), Some(raw), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let value = raw.trim();

        match key {
            "frame" => {
                progress.frame = value
                    .parse()
                    .map_err(|_| MediaError::progress_parse(key, value))?;
            }
            "out_time" => {
                progress.out_time = value.to_string();
                progress.out_time_seconds = if value == "N/A" {
                    0
                } else {
                    parse_duration_seconds(value)
                        .map_err(|_| MediaError::progress_parse(key, value))?
                };
            }
            "speed" => progress.speed = raw.to_string(),
            "progress" => progress.phase = Phase::parse(value),
            _ => {}
        }
    }

    Ok(progress)
}

/// Return the last `max_lines` lines of a file, reading backwards in chunks.
async fn read_tail_lines(path: &Path, max_lines: usize) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut pos = file.metadata().await?.len();
    let mut buf: Vec<u8> = Vec::new();

    while pos > 0 {
        let step = TAIL_CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos)).await?;

        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk).await?;
        chunk.extend_from_slice(&buf);
        buf = chunk;

        // One newline more than needed guarantees the first kept line is whole.
        if buf.iter().filter(|&&b| b == b'\n').count() > max_lines {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    Ok(lines[start..].join("\n"))
}
