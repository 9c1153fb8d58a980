//! Date, hour and lead-string handling
//!
//! Job configuration spells instants as `YYYYMMDDHH` and durations as
//! whole hours (`HH`). The stat tables spell leads as `HHMMSS` with the
//! hour part not always zero-padded, and valid ends as `YYYYMMDD_HHMMSS`.

use crate::errors::{Result, VerifError};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Format of initialization and valid instants in job configuration.
pub const CYCLE_FORMAT: &str = "%Y%m%d%H";

/// Format of `FCST_VALID_END` cells in stat tables.
pub const VALID_END_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format of ISO-like time stamps carried in CF attributes.
pub const ISO_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Parses a `YYYYMMDDHH` string; `field` names the option in error messages.
pub fn parse_cycle(field: &str, value: &str) -> Result<NaiveDateTime> {
    if value.len() != 10 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VerifError::config(field, value, "expected YYYYMMDDHH"));
    }
    NaiveDateTime::parse_from_str(&format!("{}0000", value), "%Y%m%d%H%M%S")
        .map_err(|e| VerifError::config(field, value, format!("expected YYYYMMDDHH ({})", e)))
}

/// Formats an instant as `YYYYMMDDHH`.
pub fn format_cycle(dt: &NaiveDateTime) -> String {
    dt.format(CYCLE_FORMAT).to_string()
}

/// Parses an hour count given as `HH` (one or more digits).
pub fn parse_hours(field: &str, value: &str) -> Result<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VerifError::config(field, value, "expected HH"));
    }
    value
        .parse::<u32>()
        .map_err(|e| VerifError::config(field, value, e.to_string()))
}

/// Parses a positive hour step; zero would never advance a window.
pub fn parse_step_hours(field: &str, value: &str) -> Result<u32> {
    match parse_hours(field, value)? {
        0 => Err(VerifError::config(field, value, "must be positive")),
        hours => Ok(hours),
    }
}

/// Enumerates `start, start + step, ...` up to and including `stop`.
pub fn cycle_range(start: NaiveDateTime, stop: NaiveDateTime, step_hours: u32) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    if step_hours == 0 {
        out.push(start);
        return out;
    }
    let step = Duration::hours(i64::from(step_hours));
    let mut current = start;
    while current <= stop {
        out.push(current);
        current += step;
    }
    out
}

/// Hour part of a lead string `HHMMSS` with possibly unpadded hours.
///
/// `"60000"` is 6 h, `"240000"` is 24 h, `"1200000"` is 120 h.
pub fn lead_hours(lead: &str) -> Option<u32> {
    let lead = lead.trim();
    if lead.len() < 5 || !lead.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    lead[..lead.len() - 4].parse().ok()
}

/// Lead string as the stat tables write it: unpadded hours followed by `MMSS`.
pub fn lead_string(hours: u32) -> String {
    format!("{}0000", hours)
}

/// Formats an instant as a `FCST_VALID_END` cell.
pub fn valid_end_string(dt: &NaiveDateTime) -> String {
    dt.format(VALID_END_FORMAT).to_string()
}

/// Seconds since the Unix epoch of a naive UTC instant.
pub fn unix_seconds(dt: &NaiveDateTime) -> i64 {
    DateTime::<Utc>::from_naive_utc_and_offset(*dt, Utc).timestamp()
}
