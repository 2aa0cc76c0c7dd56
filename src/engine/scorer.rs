//! Gap confidence scoring: five weighted signals plus flat bonuses.
//!
//! For every gap hour the scorer combines continuity, battery/odometer
//! progression, usage-pattern fit, gap-run length, and historical reliability
//! into a single 0–100 confidence that the gap reflects legitimate vehicle
//! inactivity. Documented technical failures and meaningful odometer travel
//! add flat bonuses outside the weighted sum. Missing inputs never fail a
//! gap; each signal degrades to a stated neutral default.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::ConfidenceConfig;
use crate::core::time::{hour_index, hour_of_day, is_night_hour, is_weekend};
use crate::engine::extract::{extract_battery_level, extract_odometer_km};
use crate::engine::profile::UsageProfile;

/// Maximum hours searched backward when measuring a gap run.
const RUN_SEARCH_BACK: i64 = 24;
/// Maximum hours searched forward when measuring a gap run.
const RUN_SEARCH_FORWARD: i64 = 48;

/// Neutral score when a signal's inputs are unavailable.
const NEUTRAL_SCORE: f64 = 0.5;

// ──────────────────── output types ────────────────────

/// Per-signal breakdown for one scored gap. Serialized into alert metrics
/// and certification records for human audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFactors {
    pub continuity: f64,
    pub progression: f64,
    pub pattern_fit: f64,
    pub run_length: f64,
    pub reliability: f64,
    pub run_length_hours: u32,
    pub technical_bonus_applied: bool,
    pub km_bonus_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_drop_per_hour: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odometer_delta_km: Option<f64>,
}

/// One scored gap. The profiled-session fields are filled by the overlay,
/// which runs strictly after scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapAnalysis {
    pub timestamp: DateTime<Utc>,
    /// Confidence the absence is benign, in [0, 100].
    pub confidence: f64,
    pub justification: String,
    pub factors: GapFactors,
    pub was_profiled_during_gap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiled_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiled_session_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiled_session_end: Option<DateTime<Utc>>,
}

/// Signal inputs for one vehicle's scoring pass.
pub struct ScoreContext<'a> {
    /// Hour indices with at least one telemetry record.
    pub present_hours: &'a HashSet<i64>,
    /// Payloads loaded for records adjacent to gaps, keyed by hour index.
    pub payloads: &'a BTreeMap<i64, Value>,
    /// Hour indices with a documented *technical* fetch failure.
    pub technical_failure_hours: &'a HashSet<i64>,
    /// Learned usage pattern.
    pub profile: &'a UsageProfile,
}

// ──────────────────── scorer ────────────────────

/// Deterministic confidence scorer built from configuration.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl ConfidenceScorer {
    #[must_use]
    pub fn from_config(config: &ConfidenceConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Score one gap hour. Never fails: absent inputs use neutral defaults.
    #[must_use]
    pub fn score_gap(&self, gap: DateTime<Utc>, ctx: &ScoreContext<'_>) -> GapAnalysis {
        let hour = hour_index(gap);

        let continuity = continuity_score(hour, ctx.present_hours);
        let (progression, battery_drop, odometer_delta) = progression_signals(hour, ctx.payloads);
        let pattern_fit = pattern_score(gap, ctx.profile);
        let (run_length_hours, run_length) = run_length_score(hour, ctx.present_hours);
        let reliability = ctx.profile.reliability;

        let technical = ctx.technical_failure_hours.contains(&hour);
        let km_bonus = odometer_delta.is_some_and(|delta| delta >= self.config.km_threshold);

        let weighted = self.config.run_length_weight.mul_add(
            run_length,
            self.config.reliability_weight.mul_add(
                reliability,
                self.config.pattern_weight.mul_add(
                    pattern_fit,
                    self.config
                        .continuity_weight
                        .mul_add(continuity, self.config.progression_weight * progression),
                ),
            ),
        );

        let mut confidence = 100.0 * weighted;
        if technical {
            confidence += self.config.technical_bonus;
        }
        if km_bonus {
            confidence += self.config.km_bonus;
        }
        let confidence = confidence.clamp(0.0, 100.0);

        let factors = GapFactors {
            continuity,
            progression,
            pattern_fit,
            run_length,
            reliability,
            run_length_hours,
            technical_bonus_applied: technical,
            km_bonus_applied: km_bonus,
            battery_drop_per_hour: battery_drop,
            odometer_delta_km: odometer_delta,
        };
        let justification = build_justification(gap, ctx, &factors);

        GapAnalysis {
            timestamp: gap,
            confidence,
            justification,
            factors,
            was_profiled_during_gap: false,
            profiled_subject: None,
            profiled_session_start: None,
            profiled_session_end: None,
        }
    }

    /// Score every gap in order.
    #[must_use]
    pub fn score_all(&self, gaps: &[DateTime<Utc>], ctx: &ScoreContext<'_>) -> Vec<GapAnalysis> {
        gaps.iter().map(|gap| self.score_gap(*gap, ctx)).collect()
    }
}

// ──────────────────── signal functions ────────────────────

/// Records in the directly adjacent hours: both 1.0, one 0.6, neither 0.2.
fn continuity_score(hour: i64, present: &HashSet<i64>) -> f64 {
    let before = present.contains(&(hour - 1));
    let after = present.contains(&(hour + 1));
    match (before, after) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.6,
        (false, false) => 0.2,
    }
}

/// Battery/odometer coherence across the gap.
///
/// Uses the nearest loaded payload strictly before and strictly after the
/// gap hour. Returns `(score, battery_drop_per_hour, odometer_delta_km)`.
fn progression_signals(
    hour: i64,
    payloads: &BTreeMap<i64, Value>,
) -> (f64, Option<f64>, Option<f64>) {
    let prev = payloads.range(..hour).next_back();
    let next = payloads.range(hour + 1..).next();
    let (Some((prev_hour, prev_payload)), Some((next_hour, next_payload))) = (prev, next) else {
        return (NEUTRAL_SCORE, None, None);
    };

    let hours_between = (next_hour - prev_hour).max(1) as f64;

    let battery_drop = match (
        extract_battery_level(prev_payload),
        extract_battery_level(next_payload),
    ) {
        (Some(prev_pct), Some(next_pct)) => Some((prev_pct - next_pct) / hours_between),
        _ => None,
    };

    let odometer_delta = match (
        extract_odometer_km(prev_payload),
        extract_odometer_km(next_payload),
    ) {
        (Some(prev_km), Some(next_km)) if next_km >= prev_km => Some(next_km - prev_km),
        _ => None,
    };

    let score = battery_drop.map_or(NEUTRAL_SCORE, |drop| {
        if (-1.0..=10.0).contains(&drop) {
            // Idle-consistent drain (or trickle charge).
            0.9
        } else if (-5.0..=15.0).contains(&drop) {
            0.7
        } else if drop < 0.0 {
            // Net charge across the gap: plugged in, plausibly parked.
            0.8
        } else {
            0.4
        }
    });

    (score, battery_drop, odometer_delta)
}

/// Usage-pattern fit: typical hour 0.9, night 0.6, weekend 0.7, else 0.5.
fn pattern_score(gap: DateTime<Utc>, profile: &UsageProfile) -> f64 {
    let hour = hour_of_day(gap);
    if profile.is_typical_hour(hour) {
        0.9
    } else if is_night_hour(hour) {
        0.6
    } else if is_weekend(gap) {
        0.7
    } else {
        0.5
    }
}

/// Length of the maximal consecutive absent-hour run containing `hour`.
///
/// Search is capped at 24 hours back and 48 forward to bound cost; anything
/// longer already lands in the lowest score band.
fn run_length_score(hour: i64, present: &HashSet<i64>) -> (u32, f64) {
    let mut length: i64 = 1;
    let mut cursor = hour - 1;
    while hour - cursor <= RUN_SEARCH_BACK && !present.contains(&cursor) {
        length += 1;
        cursor -= 1;
    }
    cursor = hour + 1;
    while cursor - hour <= RUN_SEARCH_FORWARD && !present.contains(&cursor) {
        length += 1;
        cursor += 1;
    }

    let score = match length {
        1 => 0.95,
        2 => 0.85,
        3..=4 => 0.70,
        5..=8 => 0.50,
        9..=24 => 0.30,
        _ => 0.15,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    (length as u32, score)
}

/// Short natural-language audit summary naming the signals that fired.
fn build_justification(gap: DateTime<Utc>, ctx: &ScoreContext<'_>, factors: &GapFactors) -> String {
    let mut parts: Vec<String> = Vec::new();

    let hour = hour_index(gap);
    let before = ctx.present_hours.contains(&(hour - 1));
    let after = ctx.present_hours.contains(&(hour + 1));
    match (before, after) {
        (true, true) => parts.push("records present on both sides of the gap".to_string()),
        (true, false) => parts.push("record present in the preceding hour only".to_string()),
        (false, true) => parts.push("record present in the following hour only".to_string()),
        (false, false) => parts.push("no records in adjacent hours".to_string()),
    }

    if factors.technical_bonus_applied {
        parts.push("documented technical fetch failure covers this hour".to_string());
    }

    if factors.run_length_hours == 1 {
        parts.push("isolated single-hour gap".to_string());
    } else {
        parts.push(format!(
            "part of a {}h consecutive gap run",
            factors.run_length_hours
        ));
    }

    let hod = hour_of_day(gap);
    if ctx.profile.is_typical_hour(hod) {
        parts.push("falls within the vehicle's typical active hours".to_string());
    } else if is_night_hour(hod) {
        parts.push("night hour with low expected activity".to_string());
    } else if is_weekend(gap) {
        parts.push("weekend hour with reduced expected activity".to_string());
    }

    if let Some(drop) = factors.battery_drop_per_hour {
        parts.push(format!(
            "battery progression across the gap is {drop:.1}%/h"
        ));
    }
    if let Some(delta) = factors.odometer_delta_km {
        if factors.km_bonus_applied {
            parts.push(format!("odometer advanced {delta:.1} km during the gap"));
        }
    }

    parts.join("; ")
}
