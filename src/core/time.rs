//! Hour-aligned time helpers.
//!
//! The entire engine reasons in whole UTC hours: gaps are hour slots, windows
//! are inclusive hour ranges, and run lengths are hour counts. Converting every
//! timestamp to an hour index (hours since the Unix epoch) once, up front,
//! keeps the bucketing and adjacency logic integer-only.

#![allow(missing_docs)]

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Timelike, Utc, Weekday};

/// Seconds in one hour.
const HOUR_SECS: i64 = 3_600;

/// Floor a timestamp to the start of its UTC hour (drop minutes/seconds).
#[must_use]
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    hour_to_timestamp(hour_index(ts))
}

/// Hours elapsed since the Unix epoch for the hour containing `ts`.
#[must_use]
pub fn hour_index(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(HOUR_SECS)
}

/// Start-of-hour timestamp for an hour index.
#[must_use]
pub fn hour_to_timestamp(hour: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(hour * HOUR_SECS, 0)
        .single()
        .unwrap_or_default()
}

/// Whether the hour-of-day falls in the night band (00:00–06:59 UTC).
#[must_use]
pub const fn is_night_hour(hour_of_day: u32) -> bool {
    hour_of_day <= 6
}

/// Whether the timestamp falls on a Saturday or Sunday (UTC).
#[must_use]
pub fn is_weekend(ts: DateTime<Utc>) -> bool {
    matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Hour-of-day (0..24) for a timestamp.
#[must_use]
pub fn hour_of_day(ts: DateTime<Utc>) -> u32 {
    ts.hour()
}

/// RFC 3339 with millisecond precision, the storage format for all timestamps.
#[must_use]
pub fn format_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored RFC 3339 timestamp back to UTC.
#[must_use]
pub fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
