//! Telemetry gap detection: hour bucketing over an inclusive window.
//!
//! A gap is an hour slot inside the analysis window with no telemetry record.
//! Gaps are recomputed on every run and never cached — late-arriving
//! telemetry can retroactively fill what looked like a gap earlier.

#![allow(missing_docs)]

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::core::errors::Result;
use crate::core::time::{floor_to_hour, hour_index, hour_to_timestamp};
use crate::sources::TelemetrySource;

/// Inclusive, hour-aligned analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalysisWindow {
    /// Build a window, flooring both bounds to the hour.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: floor_to_hour(start),
            end: floor_to_hour(end),
        }
    }

    /// Number of hour slots in the window (inclusive of both ends).
    #[must_use]
    pub fn hours(&self) -> i64 {
        (hour_index(self.end) - hour_index(self.start)).max(0) + 1
    }
}

/// Stateless gap detector.
pub struct GapDetector;

impl GapDetector {
    /// Detect gap hours for a vehicle over `window`.
    ///
    /// Loads only timestamps, never payloads. Returns `None` when the vehicle
    /// has zero records in the window — "no data to analyze", which callers
    /// must not confuse with "zero gaps".
    pub fn detect(
        source: &dyn TelemetrySource,
        vehicle_id: &str,
        window: AnalysisWindow,
    ) -> Result<Option<Vec<DateTime<Utc>>>> {
        let timestamps = source.list_timestamps(vehicle_id, window.start, window.end)?;
        if timestamps.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::missing_hours(&timestamps, window)))
    }

    /// Pure bucketing: every hour in `window` absent from `timestamps`.
    ///
    /// O(records + hours-in-window).
    #[must_use]
    pub fn missing_hours(
        timestamps: &[DateTime<Utc>],
        window: AnalysisWindow,
    ) -> Vec<DateTime<Utc>> {
        let present: HashSet<i64> = timestamps.iter().map(|ts| hour_index(*ts)).collect();

        let first = hour_index(window.start);
        let last = hour_index(window.end);
        let mut gaps = Vec::new();
        for hour in first..=last {
            if !present.contains(&hour) {
                gaps.push(hour_to_timestamp(hour));
            }
        }
        gaps
    }

    /// Default reporting window ending at `now`.
    ///
    /// Start is `max(first ever record, now - monthly_hours)`, floored to the
    /// hour. Returns `None` for vehicles with no records at all.
    pub fn default_window(
        source: &dyn TelemetrySource,
        vehicle_id: &str,
        now: DateTime<Utc>,
        monthly_hours: i64,
    ) -> Result<Option<AnalysisWindow>> {
        let Some(first) = source.first_record_timestamp(vehicle_id)? else {
            return Ok(None);
        };
        let horizon = now - Duration::hours(monthly_hours);
        let start = first.max(horizon);
        Ok(Some(AnalysisWindow::new(start, now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::memory::MemoryFleet;
    use chrono::TimeZone;
    use serde_json::json;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn window_hours_inclusive() {
        let w = AnalysisWindow::new(hour(0), hour(5));
        assert_eq!(w.hours(), 6);
        let single = AnalysisWindow::new(hour(3), hour(3));
        assert_eq!(single.hours(), 1);
    }

    #[test]
    fn window_floors_bounds() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 45, 12).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 1, 5, 59, 59).unwrap();
        let w = AnalysisWindow::new(start, end);
        assert_eq!(w.start, hour(0));
        assert_eq!(w.end, hour(5));
    }

    #[test]
    fn detects_single_missing_hour() {
        let timestamps: Vec<_> = (0..6).filter(|h| *h != 3).map(hour).collect();
        let gaps = GapDetector::missing_hours(&timestamps, AnalysisWindow::new(hour(0), hour(5)));
        assert_eq!(gaps, vec![hour(3)]);
    }

    #[test]
    fn off_hour_records_count_for_their_hour() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 3, 42, 7).unwrap();
        let gaps = GapDetector::missing_hours(&[ts], AnalysisWindow::new(hour(3), hour(3)));
        assert!(gaps.is_empty());
    }

    #[test]
    fn no_records_in_window_means_no_data() {
        let fleet = MemoryFleet::new();
        fleet.add_vehicle("veh-1");
        let result =
            GapDetector::detect(&fleet, "veh-1", AnalysisWindow::new(hour(0), hour(5))).unwrap();
        assert!(result.is_none(), "zero records must read as no-data");
    }

    #[test]
    fn fully_covered_window_has_zero_gaps() {
        let fleet = MemoryFleet::new();
        for h in 0..6 {
            fleet.add_record("veh-1", hour(h), json!({}));
        }
        let result =
            GapDetector::detect(&fleet, "veh-1", AnalysisWindow::new(hour(0), hour(5))).unwrap();
        assert_eq!(result, Some(Vec::new()));
    }

    #[test]
    fn default_window_clamps_to_first_record() {
        let fleet = MemoryFleet::new();
        let first = hour(2);
        fleet.add_record("veh-1", first, json!({}));
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 10, 30, 0).unwrap();
        let window = GapDetector::default_window(&fleet, "veh-1", now, 720)
            .unwrap()
            .expect("vehicle has records");
        assert_eq!(window.start, first);
        assert_eq!(window.end, hour(10));
    }

    #[test]
    fn default_window_uses_monthly_horizon_for_old_fleets() {
        let fleet = MemoryFleet::new();
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        fleet.add_record("veh-1", first, json!({}));
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 10, 15, 0).unwrap();
        let window = GapDetector::default_window(&fleet, "veh-1", now, 720)
            .unwrap()
            .expect("vehicle has records");
        // horizon = now - 720h = 2026-01-02 10:15, floored to 10:00.
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap()
        );
        assert_eq!(window.hours(), 721);
    }

    #[test]
    fn default_window_none_without_history() {
        let fleet = MemoryFleet::new();
        let now = hour(10);
        assert!(GapDetector::default_window(&fleet, "ghost", now, 720)
            .unwrap()
            .is_none());
    }
}
