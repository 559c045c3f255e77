//! Clock-time and interval utilities
//!
//! Bookings store their slot as minutes since midnight; the HTTP layer
//! accepts "HH:mm" strings and normalizes them here. All interval
//! comparisons use half-open semantics: `[start, end)`, so a slot ending
//! at 10:00 does not overlap one starting at 10:00.

use crate::error::ApiError;

/// Buffer enforced around each booking at creation time, in minutes.
pub const DEFAULT_BUFFER_MINUTES: i32 = 15;

/// Upper bound for any slot end; bookings never cross midnight.
pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// True iff `[start, end)` is a well-formed interval inside one day.
pub fn fits_in_day(start: i32, end: i32) -> bool {
    start >= 0 && start < end && end <= MINUTES_PER_DAY
}

/// Parse a strict 24-hour "HH:mm" clock time into minutes since midnight.
///
/// Malformed input is a hard validation error rather than silently
/// producing garbage.
pub fn parse_clock(s: &str) -> Result<i32, ApiError> {
    let (hh, mm) = s
        .split_once(':')
        .ok_or_else(|| ApiError::ValidationError(format!("Invalid clock time '{}'", s)))?;

    if hh.len() != 2 || mm.len() != 2 {
        return Err(ApiError::ValidationError(format!(
            "Invalid clock time '{}': expected HH:mm",
            s
        )));
    }

    let hours: i32 = hh
        .parse()
        .map_err(|_| ApiError::ValidationError(format!("Invalid hours in '{}'", s)))?;
    let minutes: i32 = mm
        .parse()
        .map_err(|_| ApiError::ValidationError(format!("Invalid minutes in '{}'", s)))?;

    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(ApiError::ValidationError(format!(
            "Clock time '{}' out of range",
            s
        )));
    }

    Ok(hours * 60 + minutes)
}

/// Format minutes since midnight back to "HH:mm".
pub fn format_clock(minutes: i32) -> String {
    let clamped = minutes.clamp(0, MINUTES_PER_DAY - 1);
    format!("{:02}:{:02}", clamped / 60, clamped % 60)
}

/// Half-open interval overlap: true iff the two intervals share at least
/// one minute.
pub fn overlaps(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> bool {
    a_start.max(b_start) < a_end.min(b_end)
}

/// Widen an interval by `buffer` minutes on both sides.
pub fn with_buffer(start: i32, end: i32, buffer: i32) -> (i32, i32) {
    (start - buffer, end + buffer)
}
