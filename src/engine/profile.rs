//! Historical usage-pattern learner.
//!
//! Derives, from timestamps alone, the hours of day a vehicle is typically
//! active and how reliably it has delivered data over the lookback window.
//! Both feed the confidence scorer as independent signals.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::core::errors::Result;
use crate::core::time::{hour_index, hour_of_day};
use crate::sources::TelemetrySource;

/// Number of hour-of-day buckets considered "typical" for a vehicle.
const TYPICAL_HOUR_COUNT: usize = 12;

/// Reliability assumed for vehicles with no history at all.
const DEFAULT_RELIABILITY: f64 = 0.5;

/// A vehicle's learned usage pattern over the trailing lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageProfile {
    /// The 12 busiest hours of day, by record count. Empty without history.
    typical_hours: HashSet<u32>,
    /// Fraction of expected hours that actually had data, in [0, 1].
    pub reliability: f64,
    /// Whether any history existed to learn from.
    pub has_history: bool,
}

impl UsageProfile {
    /// Neutral profile for a vehicle with no history.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            typical_hours: HashSet::new(),
            reliability: DEFAULT_RELIABILITY,
            has_history: false,
        }
    }

    /// Learn a profile from record timestamps over `[now - lookback_hours, now]`.
    ///
    /// `first_record` bounds the expected-hours denominator for young
    /// vehicles so a fleet addition from last week is not penalized for the
    /// weeks before it existed.
    #[must_use]
    pub fn learn(
        timestamps: &[DateTime<Utc>],
        first_record: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        lookback_hours: i64,
    ) -> Self {
        if timestamps.is_empty() {
            return Self::empty();
        }

        // Busiest hours of day.
        let mut counts = [0_u32; 24];
        for ts in timestamps {
            counts[hour_of_day(*ts) as usize] += 1;
        }
        let mut hours: Vec<u32> = (0..24).collect();
        // Descending by count; ascending hour as deterministic tie-break.
        hours.sort_by(|a, b| {
            counts[*b as usize]
                .cmp(&counts[*a as usize])
                .then_with(|| a.cmp(b))
        });
        let typical_hours: HashSet<u32> = hours
            .into_iter()
            .filter(|h| counts[*h as usize] > 0)
            .take(TYPICAL_HOUR_COUNT)
            .collect();

        // Reliability: distinct hours with data over expected hours.
        let distinct_hours: HashSet<i64> = timestamps.iter().map(|ts| hour_index(*ts)).collect();
        let hours_since_first = first_record.map_or(lookback_hours, |first| {
            (hour_index(now) - hour_index(first)).max(1)
        });
        let expected = lookback_hours.min(hours_since_first).max(1);
        let reliability = (distinct_hours.len() as f64 / expected as f64).clamp(0.0, 1.0);

        Self {
            typical_hours,
            reliability,
            has_history: true,
        }
    }

    /// Learn a profile for a vehicle by loading timestamps from the source.
    pub fn learn_from_source(
        source: &dyn TelemetrySource,
        vehicle_id: &str,
        now: DateTime<Utc>,
        lookback_hours: i64,
    ) -> Result<Self> {
        let from = now - chrono::Duration::hours(lookback_hours);
        let timestamps = source.list_timestamps(vehicle_id, from, now)?;
        let first = source.first_record_timestamp(vehicle_id)?;
        Ok(Self::learn(&timestamps, first, now, lookback_hours))
    }

    /// Whether an hour of day falls in the vehicle's typical active hours.
    #[must_use]
    pub fn is_typical_hour(&self, hour_of_day: u32) -> bool {
        self.typical_hours.contains(&hour_of_day)
    }

    #[must_use]
    pub fn typical_hour_count(&self) -> usize {
        self.typical_hours.len()
    }
}
