//! End-to-end analysis scenarios: detector through scorer, overlay,
//! thresholds, and alert reconciliation, driven entirely through in-memory
//! sources.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use fleet_gap_monitor::prelude::*;

/// Window anchor: 72 hourly records starting here.
fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 12, 0, 0, 0).unwrap()
}

fn at(hours: i64) -> DateTime<Utc> {
    base() + Duration::hours(hours)
}

/// Vehicle with a record every hour for 72h except hour 40.
fn fleet_with_single_gap() -> MemoryFleet {
    let fleet = MemoryFleet::new();
    for h in 0..72i32 {
        if h == 40 {
            continue;
        }
        fleet.add_record(
            "veh-1",
            at(i64::from(h)),
            json!({"battery": {"level": 80.0 - f64::from(h) * 0.1}, "odometer": {"km": 12_000.0}}),
        );
    }
    fleet
}

fn analyze(fleet: &MemoryFleet, vehicle_id: &str) -> VehicleAnalysis {
    let sources = AnalyzerSources {
        telemetry: fleet,
        failures: fleet,
        sessions: fleet,
    };
    GapAnalyzer::from_config(&Config::default())
        .analyze_vehicle(&sources, vehicle_id, at(71))
        .expect("analysis should succeed")
        .expect("vehicle has telemetry")
}

#[test]
fn isolated_gap_with_healthy_neighbors_scores_high() {
    let fleet = fleet_with_single_gap();
    let analysis = analyze(&fleet, "veh-1");

    assert_eq!(analysis.gaps.len(), 1, "exactly one gap");
    let gap = &analysis.gaps[0];
    assert_eq!(gap.timestamp, at(40));
    assert!((gap.factors.continuity - 1.0).abs() < f64::EPSILON);
    assert_eq!(gap.factors.run_length_hours, 1);
    assert!(!gap.was_profiled_during_gap);
    assert!(
        gap.confidence >= 70.0,
        "benign isolated gap must clear 70, got {}",
        gap.confidence
    );
    assert!(analysis.drafts.is_empty(), "one benign gap raises nothing");
}

#[test]
fn technical_failure_adds_at_least_the_configured_bonus() {
    let config = Config::default();
    let plain = analyze(&fleet_with_single_gap(), "veh-1");

    let covered = fleet_with_single_gap();
    covered.add_failure(
        "veh-1",
        FailureEvent {
            attempted_at: at(40),
            reason: FailureReason::ApiOutage,
        },
    );
    let boosted = analyze(&covered, "veh-1");

    let delta = boosted.gaps[0].confidence - plain.gaps[0].confidence;
    assert!(
        delta >= config.confidence.technical_bonus - 1e-9
            || (boosted.gaps[0].confidence - 100.0).abs() < 1e-9,
        "expected at least the technical bonus (or the 100 ceiling), got delta {delta}"
    );
    assert!(boosted.gaps[0].factors.technical_bonus_applied);
}

#[test]
fn profiled_session_subtracts_malus_and_flags_the_gap() {
    let config = Config::default();
    let plain = analyze(&fleet_with_single_gap(), "veh-1");

    let covered = fleet_with_single_gap();
    covered.add_session(
        "veh-1",
        ProfiledSession {
            started_at: at(38),
            expires_at: Some(at(42)),
            subject: "driver-11".to_string(),
        },
    );
    let suspicious = analyze(&covered, "veh-1");

    let gap = &suspicious.gaps[0];
    assert!(gap.was_profiled_during_gap);
    assert_eq!(gap.profiled_subject.as_deref(), Some("driver-11"));
    assert!(
        gap.confidence
            <= (plain.gaps[0].confidence - config.confidence.profiled_malus).max(0.0) + 1e-9,
        "profiled gap {} vs clear gap {}",
        gap.confidence,
        plain.gaps[0].confidence
    );
    assert_eq!(suspicious.metrics.profiled_anomaly_count, 1);
    assert!(suspicious
        .drafts
        .iter()
        .any(|d| d.alert_type == AlertType::ProfiledAnomaly));
}

#[test]
fn low_confidence_vehicle_raises_one_alert_per_sweep_cycle() {
    // Sparse, erratic coverage: isolated records separated by long dead
    // zones drive the average gap confidence down.
    let fleet = MemoryFleet::new();
    for h in [0, 20, 21, 45, 46, 70, 71] {
        fleet.add_record("veh-2", at(h), json!({}));
    }
    let sources = AnalyzerSources {
        telemetry: &fleet,
        failures: &fleet,
        sessions: &fleet,
    };
    let analyzer = GapAnalyzer::from_config(&Config::default());
    let analysis = analyzer
        .analyze_vehicle(&sources, "veh-2", at(71))
        .unwrap()
        .unwrap();
    assert!(
        analysis.metrics.avg_confidence < 60.0,
        "fixture must sit below the default floor, got {}",
        analysis.metrics.avg_confidence
    );
    assert!(analysis
        .drafts
        .iter()
        .any(|d| d.alert_type == AlertType::LowConfidence));

    let repo = MemoryAlertRepository::new();
    let lifecycle = AlertLifecycle::new(&repo);
    lifecycle.raise_from_analysis(&analysis, at(71)).unwrap();
    let open_low = |repo: &MemoryAlertRepository| {
        repo.list(&AlertFilter {
            vehicle_id: Some("veh-2".to_string()),
            status: Some(AlertStatus::Open),
        })
        .unwrap()
        .into_iter()
        .filter(|a| a.alert_type == AlertType::LowConfidence)
        .count()
    };
    assert_eq!(open_low(&repo), 1, "exactly one OPEN alert after sweep 1");

    // Second consecutive sweep: same analysis, no new alert.
    let again = analyzer
        .analyze_vehicle(&sources, "veh-2", at(72))
        .unwrap()
        .unwrap();
    lifecycle.raise_from_analysis(&again, at(72)).unwrap();
    assert_eq!(open_low(&repo), 1, "sweep 2 must not stack a duplicate");
}

#[test]
fn escalate_then_certify_completes_with_ordered_audit() {
    let fleet = fleet_with_single_gap();
    fleet.add_session(
        "veh-1",
        ProfiledSession {
            started_at: at(38),
            expires_at: Some(at(42)),
            subject: "driver-11".to_string(),
        },
    );
    fleet.set_artifact("veh-1", "doc://analysis/veh-1/2026-01");
    let analysis = analyze(&fleet, "veh-1");

    let repo = MemoryAlertRepository::new();
    let lifecycle = AlertLifecycle::new(&repo);
    let alert_id = lifecycle.raise_from_analysis(&analysis, at(71)).unwrap()[0]
        .alert()
        .id;

    lifecycle
        .escalate(alert_id, "ops", Some("manual check".to_string()), at(72))
        .unwrap();
    let (alert, cert) = lifecycle
        .certify(alert_id, &analysis, &fleet, "ops", at(73))
        .unwrap();

    assert_eq!(alert.status, AlertStatus::Completed);
    assert!(cert.verify().unwrap());

    let trail = repo.audit_trail(alert_id).unwrap();
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[0].action.as_str(), "auto_detected");
    assert_eq!(trail[1].action.as_str(), "escalated");
    assert_eq!(trail[2].action.as_str(), "certified");
    assert!(trail[1].recorded_at < trail[2].recorded_at);
}

#[test]
fn late_arriving_telemetry_erases_the_gap_on_reanalysis() {
    let fleet = fleet_with_single_gap();
    assert_eq!(analyze(&fleet, "veh-1").gaps.len(), 1);

    // Backfilled record lands for the missing hour.
    fleet.add_record("veh-1", at(40) + Duration::minutes(20), json!({}));
    assert!(analyze(&fleet, "veh-1").gaps.is_empty());
}
