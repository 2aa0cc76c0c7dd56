//! Fleet alerting thresholds evaluated once per vehicle analysis.
//!
//! Rules are independent: one analysis can produce several drafts, one per
//! rule that fires. A draft is not yet an alert; the lifecycle layer
//! deduplicates against open alerts before anything is persisted.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::alerts::model::{AlertType, Severity};
use crate::core::config::ThresholdConfig;
use crate::engine::scorer::GapAnalysis;

/// Aggregated per-vehicle metrics over one analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleGapMetrics {
    pub gap_hours: u32,
    pub window_hours: u32,
    /// `gap_hours / window_hours`, in percent.
    pub gap_percentage: f64,
    /// Mean confidence over all gaps; 100.0 when there are none.
    pub avg_confidence: f64,
    /// Longest run of hour-adjacent gaps.
    pub max_consecutive_gaps: u32,
    /// Gaps covered by a profiled usage session.
    pub profiled_anomaly_count: u32,
    /// Gap hours as a share of the monthly-hours budget, in percent.
    pub monthly_downtime_percent: f64,
}

impl VehicleGapMetrics {
    /// Aggregate scored gaps into window metrics. `monthly_hours` is the
    /// configured monthly budget the downtime percentage is measured against.
    #[must_use]
    pub fn from_analyses(analyses: &[GapAnalysis], window_hours: i64, monthly_hours: i64) -> Self {
        let window_hours = u32::try_from(window_hours.max(1)).unwrap_or(u32::MAX);
        let monthly_hours = u32::try_from(monthly_hours.max(1)).unwrap_or(u32::MAX);
        let gap_hours = u32::try_from(analyses.len()).unwrap_or(u32::MAX);

        let avg_confidence = if analyses.is_empty() {
            100.0
        } else {
            analyses.iter().map(|a| a.confidence).sum::<f64>() / analyses.len() as f64
        };

        let max_consecutive_gaps = longest_run(analyses);
        let profiled_anomaly_count = analyses
            .iter()
            .filter(|a| a.was_profiled_during_gap)
            .count();
        Self {
            gap_hours,
            window_hours,
            gap_percentage: 100.0 * f64::from(gap_hours) / f64::from(window_hours),
            avg_confidence,
            max_consecutive_gaps,
            profiled_anomaly_count: u32::try_from(profiled_anomaly_count).unwrap_or(u32::MAX),
            monthly_downtime_percent: 100.0 * f64::from(gap_hours) / f64::from(monthly_hours),
        }
    }
}

/// Longest run of hour-adjacent gap timestamps. Input order follows the
/// detector, which emits gaps in ascending hour order.
fn longest_run(analyses: &[GapAnalysis]) -> u32 {
    let mut longest: u32 = 0;
    let mut current: u32 = 0;
    let mut prev_hour: Option<i64> = None;
    for analysis in analyses {
        let hour = crate::core::time::hour_index(analysis.timestamp);
        current = match prev_hour {
            Some(prev) if hour == prev + 1 => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        prev_hour = Some(hour);
    }
    longest
}

/// A threshold breach not yet reconciled against open alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub description: String,
    /// Metrics snapshot serialized into the alert row for audit.
    pub metrics: serde_json::Value,
}

/// Evaluates every rule against one vehicle's metrics.
pub struct ThresholdEvaluator {
    config: ThresholdConfig,
}

impl ThresholdEvaluator {
    #[must_use]
    pub fn from_config(config: &ThresholdConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// All rule breaches for this analysis, most severe first.
    #[must_use]
    pub fn evaluate(&self, vehicle_id: &str, metrics: &VehicleGapMetrics) -> Vec<AlertDraft> {
        let mut drafts = Vec::new();
        let snapshot = json!(metrics);

        if metrics.profiled_anomaly_count > 0 {
            drafts.push(AlertDraft {
                alert_type: AlertType::ProfiledAnomaly,
                severity: Severity::Critical,
                description: format!(
                    "{} gap hour(s) for {vehicle_id} fall inside active profiled usage sessions",
                    metrics.profiled_anomaly_count
                ),
                metrics: snapshot.clone(),
            });
        }

        if metrics.gap_hours > 0 && metrics.avg_confidence < self.config.min_avg_confidence {
            drafts.push(AlertDraft {
                alert_type: AlertType::LowConfidence,
                severity: Severity::Warning,
                description: format!(
                    "average gap confidence {:.1} for {vehicle_id} is below the {:.1} floor",
                    metrics.avg_confidence, self.config.min_avg_confidence
                ),
                metrics: snapshot.clone(),
            });
        }

        if metrics.max_consecutive_gaps > self.config.max_consecutive_gap_hours {
            drafts.push(AlertDraft {
                alert_type: AlertType::ConsecutiveGaps,
                severity: Severity::Warning,
                description: format!(
                    "{} consecutive gap hours for {vehicle_id} exceed the {}h limit",
                    metrics.max_consecutive_gaps, self.config.max_consecutive_gap_hours
                ),
                metrics: snapshot.clone(),
            });
        }

        if metrics.gap_percentage > self.config.max_gap_percent {
            drafts.push(AlertDraft {
                alert_type: AlertType::HighGapPercentage,
                severity: Severity::Warning,
                description: format!(
                    "{:.1}% of the window has no telemetry for {vehicle_id} (limit {:.1}%)",
                    metrics.gap_percentage, self.config.max_gap_percent
                ),
                metrics: snapshot.clone(),
            });
        }

        if metrics.monthly_downtime_percent > self.config.max_monthly_downtime_percent {
            drafts.push(AlertDraft {
                alert_type: AlertType::MonthlyThreshold,
                severity: Severity::Info,
                description: format!(
                    "telemetry downtime {:.1}% for {vehicle_id} exceeds the {:.1}% monthly budget",
                    metrics.monthly_downtime_percent, self.config.max_monthly_downtime_percent
                ),
                metrics: snapshot,
            });
        }

        drafts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scorer::GapFactors;
    use chrono::{DateTime, TimeZone, Utc};

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, h, 0, 0).unwrap()
    }

    fn gap(ts: DateTime<Utc>, confidence: f64, profiled: bool) -> GapAnalysis {
        GapAnalysis {
            timestamp: ts,
            confidence,
            justification: String::new(),
            factors: GapFactors {
                continuity: 0.5,
                progression: 0.5,
                pattern_fit: 0.5,
                run_length: 0.5,
                reliability: 0.5,
                run_length_hours: 1,
                technical_bonus_applied: false,
                km_bonus_applied: false,
                battery_drop_per_hour: None,
                odometer_delta_km: None,
            },
            was_profiled_during_gap: profiled,
            profiled_subject: None,
            profiled_session_start: None,
            profiled_session_end: None,
        }
    }

    #[test]
    fn zero_gaps_is_perfect_metrics() {
        let metrics = VehicleGapMetrics::from_analyses(&[], 720, 720);
        assert_eq!(metrics.gap_hours, 0);
        assert!((metrics.avg_confidence - 100.0).abs() < f64::EPSILON);
        assert_eq!(metrics.max_consecutive_gaps, 0);
        let evaluator = ThresholdEvaluator::from_config(&ThresholdConfig::default());
        assert!(evaluator.evaluate("veh-1", &metrics).is_empty());
    }

    #[test]
    fn longest_run_counts_adjacent_hours_only() {
        let analyses = vec![
            gap(hour(1), 80.0, false),
            gap(hour(2), 80.0, false),
            gap(hour(3), 80.0, false),
            gap(hour(7), 80.0, false),
            gap(hour(8), 80.0, false),
        ];
        let metrics = VehicleGapMetrics::from_analyses(&analyses, 24, 720);
        assert_eq!(metrics.max_consecutive_gaps, 3);
    }

    #[test]
    fn profiled_anomaly_is_critical() {
        let analyses = vec![gap(hour(1), 90.0, true)];
        let metrics = VehicleGapMetrics::from_analyses(&analyses, 720, 720);
        let drafts =
            ThresholdEvaluator::from_config(&ThresholdConfig::default()).evaluate("veh-1", &metrics);
        assert!(drafts
            .iter()
            .any(|d| d.alert_type == AlertType::ProfiledAnomaly && d.severity == Severity::Critical));
        // Critical draft leads the list.
        assert_eq!(drafts[0].severity, Severity::Critical);
    }

    #[test]
    fn low_average_confidence_warns() {
        let analyses = vec![gap(hour(1), 30.0, false), gap(hour(5), 40.0, false)];
        let metrics = VehicleGapMetrics::from_analyses(&analyses, 720, 720);
        let drafts =
            ThresholdEvaluator::from_config(&ThresholdConfig::default()).evaluate("veh-1", &metrics);
        let low = drafts
            .iter()
            .find(|d| d.alert_type == AlertType::LowConfidence)
            .expect("low-confidence draft");
        assert_eq!(low.severity, Severity::Warning);
        assert!(low.description.contains("35.0"));
    }

    #[test]
    fn no_low_confidence_draft_without_gaps() {
        // avg_confidence defaults to 100 with zero gaps; rule must also guard
        // against a zero-gap vehicle in case the floor is raised above 100.
        let mut config = ThresholdConfig::default();
        config.min_avg_confidence = 100.0;
        let metrics = VehicleGapMetrics::from_analyses(&[], 720, 720);
        let drafts = ThresholdEvaluator::from_config(&config).evaluate("veh-1", &metrics);
        assert!(drafts.is_empty());
    }

    #[test]
    fn consecutive_gap_rule_is_strictly_greater() {
        let config = ThresholdConfig::default();
        let at_limit: Vec<_> = (1..=config.max_consecutive_gap_hours)
            .map(|h| gap(hour(h), 90.0, false))
            .collect();
        let metrics = VehicleGapMetrics::from_analyses(&at_limit, 720, 720);
        let drafts = ThresholdEvaluator::from_config(&config).evaluate("veh-1", &metrics);
        assert!(!drafts
            .iter()
            .any(|d| d.alert_type == AlertType::ConsecutiveGaps));

        let over: Vec<_> = (1..=config.max_consecutive_gap_hours + 1)
            .map(|h| gap(hour(h), 90.0, false))
            .collect();
        let metrics = VehicleGapMetrics::from_analyses(&over, 720, 720);
        let drafts = ThresholdEvaluator::from_config(&config).evaluate("veh-1", &metrics);
        assert!(drafts
            .iter()
            .any(|d| d.alert_type == AlertType::ConsecutiveGaps));
    }

    #[test]
    fn gap_percentage_rule() {
        let config = ThresholdConfig::default();
        // 6 gaps in a 24h window = 25% > 20%.
        let analyses: Vec<_> = [1, 3, 5, 9, 12, 20]
            .iter()
            .map(|h| gap(hour(*h), 90.0, false))
            .collect();
        let metrics = VehicleGapMetrics::from_analyses(&analyses, 24, 720);
        assert!((metrics.gap_percentage - 25.0).abs() < 1e-9);
        let drafts = ThresholdEvaluator::from_config(&config).evaluate("veh-1", &metrics);
        assert!(drafts
            .iter()
            .any(|d| d.alert_type == AlertType::HighGapPercentage));
    }

    #[test]
    fn monthly_downtime_measures_gap_hours_against_monthly_budget() {
        let config = ThresholdConfig::default();
        // Confidence does not matter for downtime; 4 gap hours over a 720h
        // monthly budget, even at confidence 95.
        let analyses: Vec<_> = (1..=4).map(|h| gap(hour(h), 95.0, false)).collect();
        let metrics = VehicleGapMetrics::from_analyses(&analyses, 24, 720);
        assert!((metrics.monthly_downtime_percent - 100.0 * 4.0 / 720.0).abs() < 1e-9);
        let drafts = ThresholdEvaluator::from_config(&config).evaluate("veh-1", &metrics);
        assert!(!drafts
            .iter()
            .any(|d| d.alert_type == AlertType::MonthlyThreshold));

        // Same 4 gap hours against a 24h budget = 16.7% > 10%.
        let metrics = VehicleGapMetrics::from_analyses(&analyses, 24, 24);
        assert!((metrics.monthly_downtime_percent - 100.0 * 4.0 / 24.0).abs() < 1e-9);
        let drafts = ThresholdEvaluator::from_config(&config).evaluate("veh-1", &metrics);
        assert!(drafts
            .iter()
            .any(|d| d.alert_type == AlertType::MonthlyThreshold
                && d.severity == Severity::Info));
    }

    #[test]
    fn metrics_snapshot_embedded_in_draft() {
        let analyses = vec![gap(hour(1), 10.0, true)];
        let metrics = VehicleGapMetrics::from_analyses(&analyses, 24, 720);
        let drafts =
            ThresholdEvaluator::from_config(&ThresholdConfig::default()).evaluate("veh-1", &metrics);
        for draft in &drafts {
            assert_eq!(draft.metrics["gap_hours"], 1);
            assert_eq!(draft.metrics["profiled_anomaly_count"], 1);
        }
    }
}
