//! Time formatting helpers
//!
//! Relative times ("3 minutes ago"), elapsed durations ("2m 5s") and
//! zero-padded calendar dates.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Units from largest to smallest; year and month are averages
/// (365.25 and 30.44 days)
const UNITS: [(&str, i64); 7] = [
    ("year", 31_557_600_000),
    ("month", 2_630_016_000),
    ("week", 7 * DAY_MS),
    ("day", DAY_MS),
    ("hour", HOUR_MS),
    ("minute", MINUTE_MS),
    ("second", SECOND_MS),
];

/// Human-readable distance between `timestamp_ms` and `now_ms`
///
/// Uses the largest unit that fits at least once, truncating. Past times read
/// `"N units ago"`, future times `"in N units"`; anything within a second is
/// `"just now"`, and a missing timestamp is `"Never"`.
///
/// # Example
/// ```
/// use conveyor_core::format::relative_time;
///
/// assert_eq!(relative_time(Some(0), 90_000), "1 minute ago");
/// assert_eq!(relative_time(Some(3_600_000), 0), "in 1 hour");
/// assert_eq!(relative_time(None, 0), "Never");
/// ```
pub fn relative_time(timestamp_ms: Option<i64>, now_ms: i64) -> String {
    let Some(timestamp_ms) = timestamp_ms else {
        return "Never".to_string();
    };

    let diff = now_ms.saturating_sub(timestamp_ms);
    let magnitude = diff.unsigned_abs();

    for (unit, unit_ms) in UNITS {
        let count = magnitude / unit_ms as u64;
        if count >= 1 {
            let plural = if count > 1 { "s" } else { "" };
            return if diff < 0 {
                format!("in {} {}{}", count, unit, plural)
            } else {
                format!("{} {}{} ago", count, unit, plural)
            };
        }
    }

    "just now".to_string()
}

/// Relative time for an epoch-ms value where `0` means the event never happened
pub fn last_run_time(last_run_ms: Option<i64>, now_ms: i64) -> String {
    relative_time(last_run_ms.filter(|ms| *ms > 0), now_ms)
}

/// Elapsed time between two instants as `"<minutes>m <seconds>s"`
///
/// Both fields are truncated. An end before the start renders as `"0m 0s"`.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use conveyor_core::format::duration;
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 5).unwrap();
/// assert_eq!(duration(start, end), "2m 5s");
/// ```
pub fn duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let elapsed_ms = (end - start).num_milliseconds().max(0);
    format_elapsed_ms(elapsed_ms)
}

/// Format milliseconds as `"<minutes>m <seconds>s"`, truncating
pub fn format_elapsed_ms(elapsed_ms: i64) -> String {
    let minutes = elapsed_ms / MINUTE_MS;
    let seconds = (elapsed_ms % MINUTE_MS) / SECOND_MS;
    format!("{}m {}s", minutes, seconds)
}

/// Duration between two optional RFC 3339 strings; empty if either is missing
/// or unparseable
pub fn duration_between(start: Option<&str>, end: Option<&str>) -> String {
    match (start.and_then(parse_timestamp), end.and_then(parse_timestamp)) {
        (Some(start), Some(end)) => duration(start, end),
        _ => String::new(),
    }
}

/// Parse a timestamp given as RFC 3339 text or epoch milliseconds
///
/// Surrounding whitespace is ignored. Blank or invalid input yields `None`.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(ms) = input.parse::<i64>() {
        return Utc.timestamp_millis_opt(ms).single();
    }
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `YYYY-MM-DD`, or an empty string for a missing date
pub fn iso_date<Tz>(date: Option<&DateTime<Tz>>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// `YYYY-MM-DD hh:mm` (24-hour), or an empty string for a missing date
pub fn iso_date_time<Tz>(date: Option<&DateTime<Tz>>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    date.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// [`iso_date`] over raw input, see [`parse_timestamp`]
pub fn iso_date_str(input: &str) -> String {
    iso_date(parse_timestamp(input).as_ref())
}

/// [`iso_date_time`] over raw input, see [`parse_timestamp`]
pub fn iso_date_time_str(input: &str) -> String {
    iso_date_time(parse_timestamp(input).as_ref())
}
