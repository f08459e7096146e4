//! Timestamp parsing for FFmpeg reports.
//!
//! FFmpeg prints times as `HH:MM:SS.micros` both in probe reports
//! (`Duration: 00:01:20.48, ...`) and in `-progress` blocks
//! (`out_time=00:00:05.120000`). Only whole seconds are kept.

/// Parse a `HH:MM:SS[.fraction]` timestamp into whole seconds.
///
/// The fractional part is discarded (truncated, not rounded). Exactly three
/// integer components are required and the total must fit in an `i64`.
///
/// # Examples
/// ```
/// use transcoder_models::timestamp::parse_duration_seconds;
/// assert_eq!(parse_duration_seconds("00:01:20.480363").unwrap(), 80);
/// assert_eq!(parse_duration_seconds("01:00:00").unwrap(), 3600);
/// assert!(parse_duration_seconds("abc").is_err());
/// ```
pub fn parse_duration_seconds(ts: &str) -> Result<i64, TimestampError> {
    let whole = match ts.rfind('.') {
        Some(idx) => &ts[..idx],
        None => ts,
    };

    let parts: Vec<&str> = whole.split(':').collect();
    if parts.len() != 3 {
        return Err(TimestampError::InvalidFormat(whole.to_string()));
    }

    let mut seconds = 0i64;
    for (idx, part) in parts.iter().enumerate() {
        // FFmpeg reports a negative out_time for the first block of some
        // encodes, so signed components are accepted.
        let value: i64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidFormat(whole.to_string()))?;
        let unit: i64 = match idx {
            0 => 3600,
            1 => 60,
            _ => 1,
        };
        seconds = value
            .checked_mul(unit)
            .and_then(|v| seconds.checked_add(v))
            .ok_or_else(|| TimestampError::InvalidFormat(whole.to_string()))?;
    }

    Ok(seconds)
}

/// Format whole seconds back into `HH:MM:SS`.
pub fn format_seconds(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    /// Wrong component count or a non-integer component.
    #[error("Invalid duration format: {0}")]
    InvalidFormat(String),
}
