//! Per-vehicle analysis pipeline.
//!
//! One `analyze_vehicle` call runs the full chain: window selection, gap
//! detection, usage-profile learning, payload loading restricted to records
//! adjacent to gaps, confidence scoring, the profiled-session overlay,
//! metric aggregation, and threshold evaluation. The pipeline reads sources
//! only; persisting alerts is the lifecycle layer's job.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::Config;
use crate::core::errors::{FgmError, Result};
use crate::core::time::hour_index;
use crate::engine::detector::{AnalysisWindow, GapDetector};
use crate::engine::overlay::apply_session_overlay;
use crate::engine::profile::UsageProfile;
use crate::engine::scorer::{ConfidenceScorer, GapAnalysis, ScoreContext};
use crate::engine::thresholds::{AlertDraft, ThresholdEvaluator, VehicleGapMetrics};
use crate::sources::{FailureLogSource, ProfiledSessionSource, ReportCorrelator, TelemetrySource};

/// Result of one vehicle analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleAnalysis {
    pub vehicle_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub gaps: Vec<GapAnalysis>,
    pub metrics: VehicleGapMetrics,
    pub drafts: Vec<AlertDraft>,
    pub profile_reliability: f64,
    pub analyzed_at: DateTime<Utc>,
}

/// Read-only source bundle the analyzer consumes.
pub struct AnalyzerSources<'a> {
    pub telemetry: &'a dyn TelemetrySource,
    pub failures: &'a dyn FailureLogSource,
    pub sessions: &'a dyn ProfiledSessionSource,
}

/// Stateless pipeline built from one config snapshot.
pub struct GapAnalyzer {
    config: Config,
    scorer: ConfidenceScorer,
    evaluator: ThresholdEvaluator,
}

impl GapAnalyzer {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.clone(),
            scorer: ConfidenceScorer::from_config(&config.confidence),
            evaluator: ThresholdEvaluator::from_config(&config.thresholds),
        }
    }

    /// Analyze a vehicle over its default window ending at `now`.
    ///
    /// Returns `None` when the vehicle has no telemetry at all, or none
    /// inside the window; callers must not read that as "zero gaps".
    pub fn analyze_vehicle(
        &self,
        sources: &AnalyzerSources<'_>,
        vehicle_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VehicleAnalysis>> {
        let Some(window) = GapDetector::default_window(
            sources.telemetry,
            vehicle_id,
            now,
            self.config.window.monthly_hours,
        )?
        else {
            return Ok(None);
        };
        self.analyze_window(sources, vehicle_id, window, now)
    }

    /// Analyze a vehicle over an explicit window.
    pub fn analyze_window(
        &self,
        sources: &AnalyzerSources<'_>,
        vehicle_id: &str,
        window: AnalysisWindow,
        now: DateTime<Utc>,
    ) -> Result<Option<VehicleAnalysis>> {
        let timestamps = sources
            .telemetry
            .list_timestamps(vehicle_id, window.start, window.end)?;
        if timestamps.is_empty() {
            return Ok(None);
        }
        let gaps = GapDetector::missing_hours(&timestamps, window);

        let profile = UsageProfile::learn_from_source(
            sources.telemetry,
            vehicle_id,
            now,
            self.config.window.lookback_hours,
        )?;

        let present_hours: HashSet<i64> = timestamps.iter().map(|ts| hour_index(*ts)).collect();
        let gap_hours: HashSet<i64> = gaps.iter().map(|ts| hour_index(*ts)).collect();

        let payloads = self.load_adjacent_payloads(
            sources.telemetry,
            vehicle_id,
            &timestamps,
            &gap_hours,
        )?;

        let technical_failure_hours: HashSet<i64> = sources
            .failures
            .list_failures(vehicle_id, window.start, window.end)?
            .iter()
            .filter(|f| f.reason.is_technical())
            .map(|f| hour_index(f.attempted_at))
            .collect();

        let ctx = ScoreContext {
            present_hours: &present_hours,
            payloads: &payloads,
            technical_failure_hours: &technical_failure_hours,
            profile: &profile,
        };
        let mut analyses = self.scorer.score_all(&gaps, &ctx);

        let sessions = sources
            .sessions
            .list_active_sessions(vehicle_id, window.start, window.end)?;
        apply_session_overlay(&mut analyses, &sessions, &self.config.confidence);

        let metrics = VehicleGapMetrics::from_analyses(
            &analyses,
            window.hours(),
            self.config.window.monthly_hours,
        );
        let drafts = self.evaluator.evaluate(vehicle_id, &metrics);

        Ok(Some(VehicleAnalysis {
            vehicle_id: vehicle_id.to_string(),
            window_start: window.start,
            window_end: window.end,
            gaps: analyses,
            metrics,
            drafts,
            profile_reliability: profile.reliability,
            analyzed_at: now,
        }))
    }

    /// Analyze the vehicle and period a report identifier resolves to.
    ///
    /// Fails with `FGM-2002` for an unknown report.
    pub fn analyze_report(
        &self,
        sources: &AnalyzerSources<'_>,
        correlator: &dyn ReportCorrelator,
        report_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VehicleAnalysis>> {
        let Some(period) = correlator.report_period(report_id)? else {
            return Err(FgmError::UnknownReport {
                report_id: report_id.to_string(),
            });
        };
        let window = AnalysisWindow::new(period.period_start, period.period_end);
        self.analyze_window(sources, &period.vehicle_id, window, now)
    }

    /// Load payloads only for records in hours bordering a gap.
    ///
    /// The progression signal needs one record on each side of a gap run;
    /// loading anything more would pull full payloads for the whole window.
    fn load_adjacent_payloads(
        &self,
        telemetry: &dyn TelemetrySource,
        vehicle_id: &str,
        timestamps: &[DateTime<Utc>],
        gap_hours: &HashSet<i64>,
    ) -> Result<BTreeMap<i64, Value>> {
        let mut wanted: BTreeSet<DateTime<Utc>> = BTreeSet::new();
        for ts in timestamps {
            let hour = hour_index(*ts);
            if gap_hours.contains(&(hour - 1)) || gap_hours.contains(&(hour + 1)) {
                wanted.insert(*ts);
            }
        }
        if wanted.is_empty() {
            return Ok(BTreeMap::new());
        }

        let loaded = telemetry.load_payloads(vehicle_id, &wanted)?;
        let mut by_hour = BTreeMap::new();
        for (ts, payload) in loaded {
            // Last record of an hour wins; it sits closest to a trailing gap.
            by_hour.insert(hour_index(ts), payload);
        }
        Ok(by_hour)
    }
}
