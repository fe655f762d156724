use std::time::Duration;

use super::error::{ReelError, ReelResult};

// Absorbs binary representation error so 0.29 formats as 290ms, not 289ms.
const MILLIS_EPSILON: f64 = 1e-6;

/// Format seconds as `HH:MM:SS,mmm`.
///
/// Milliseconds are truncated, never rounded. Hours are padded to two digits
/// and widen past 99 instead of wrapping.
pub fn format_timecode(seconds: f64) -> ReelResult<String> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ReelError::InvalidTime(seconds));
    }

    let total_millis = (seconds * 1000.0 + MILLIS_EPSILON).floor() as u64;
    let millis = total_millis % 1000;
    let total_seconds = total_millis / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    Ok(format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}"))
}

pub fn parse_timecode(value: &str) -> ReelResult<Duration> {
    let invalid = |reason: &str| ReelError::validation(format!("timestamp '{value}' {reason}"));

    let cleaned = value.trim().replace(',', ".");
    let (time_part, fractional_part) = match cleaned.split_once('.') {
        Some((time, fraction)) => (time, fraction),
        None => (cleaned.as_str(), "0"),
    };

    let mut hms = time_part.split(':');
    let mut next_field = |name: &str| -> ReelResult<u64> {
        hms.next()
            .ok_or_else(|| invalid(&format!("is missing {name}")))?
            .parse::<u64>()
            .map_err(|_| invalid(&format!("has invalid {name}")))
    };
    let hours = next_field("hours")?;
    let minutes = next_field("minutes")?;
    let seconds = next_field("seconds")?;
    if hms.next().is_some() {
        return Err(invalid("has more than three components"));
    }
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid("has minutes or seconds out of range"));
    }

    let millis_digits: String = fractional_part.chars().chain("000".chars()).take(3).collect();
    let millis = millis_digits
        .parse::<u64>()
        .map_err(|_| invalid("has an invalid millisecond component"))?;

    let total_seconds = hours
        .checked_mul(3600)
        .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
        .ok_or_else(|| invalid("is out of range"))?;
    Ok(Duration::from_secs(total_seconds) + Duration::from_millis(millis))
}
