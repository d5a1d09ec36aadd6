//! Timezone-safe date-only helpers.
//!
//! Calendar dates (arrival date) are stored as nanosecond timestamps anchored
//! at 12:00 UTC, so converting back to a calendar day never drifts across a
//! timezone boundary.

use chrono::{Datelike, NaiveDate, TimeZone, Utc};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const ANCHOR_HOUR: u32 = 12;

/// Current time in nanoseconds since the Unix epoch.
pub fn now_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp().saturating_mul(NANOS_PER_SECOND))
}

/// Validate a `YYYY-MM-DD` string (years 1900-2100). Returns the trimmed
/// string when valid.
pub fn validate_date_only(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()?;
    if !(1900..=2100).contains(&date.year()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Convert `YYYY-MM-DD` to nanoseconds at 12:00 UTC of that day.
///
/// Invalid input falls back to the current time.
pub fn date_only_to_nanos(text: &str) -> i64 {
    validate_date_only(text)
        .and_then(|valid| NaiveDate::parse_from_str(&valid, "%Y-%m-%d").ok())
        .and_then(|date| date.and_hms_opt(ANCHOR_HOUR, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp() * NANOS_PER_SECOND)
        .unwrap_or_else(now_nanos)
}

/// Convert a nanosecond timestamp to its UTC calendar day as `YYYY-MM-DD`.
pub fn nanos_to_date_only(nanos: i64) -> String {
    let seconds = nanos.div_euclid(NANOS_PER_SECOND);
    Utc.timestamp_opt(seconds, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Format `YYYY-MM-DD` for display as `MM/DD/YYYY`; empty when invalid.
pub fn format_date_only(text: &str) -> String {
    match validate_date_only(text) {
        Some(valid) => format!("{}/{}/{}", &valid[5..7], &valid[8..10], &valid[0..4]),
        None => String::new(),
    }
}

/// Today's UTC date as `YYYY-MM-DD`.
pub fn today_date_only() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
