//! Alert lifecycle orchestration.
//!
//! Sits between the analysis pipeline and the repository: reconciles fresh
//! threshold drafts against open alerts, and drives the three operator
//! verbs (certify, escalate, mark-breach) with their preconditions and
//! audit payloads. State legality itself is enforced one layer down, in the
//! repository, so no path around this module can corrupt an alert.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};

use crate::alerts::certification::GapCertification;
use crate::alerts::model::{
    AlertStatus, AuditAction, FinalDecision, GapAlert, VerificationOutcome,
};
use crate::alerts::repo::{AlertRepository, CreateOutcome, TransitionRequest};
use crate::core::errors::{FgmError, Result};
use crate::engine::analyzer::VehicleAnalysis;
use crate::sources::ArtifactRegistry;

/// Actor recorded for automated transitions.
const SYSTEM_ACTOR: &str = "system";

pub struct AlertLifecycle<'a> {
    repo: &'a dyn AlertRepository,
}

impl<'a> AlertLifecycle<'a> {
    #[must_use]
    pub fn new(repo: &'a dyn AlertRepository) -> Self {
        Self { repo }
    }

    /// Reconcile one analysis result against the repository: every draft
    /// becomes an open alert unless one of the same type is already open.
    pub fn raise_from_analysis(
        &self,
        analysis: &VehicleAnalysis,
        now: DateTime<Utc>,
    ) -> Result<Vec<CreateOutcome>> {
        let mut outcomes = Vec::with_capacity(analysis.drafts.len());
        for draft in &analysis.drafts {
            outcomes.push(
                self.repo
                    .create_if_absent(&analysis.vehicle_id, draft, now)?,
            );
        }
        Ok(outcomes)
    }

    /// Certify an alert: close it as verified-benign and seal the evidence.
    ///
    /// Requires a completed analysis artifact for the vehicle (`FGM-2202`
    /// otherwise); its reference lands in both the certification record and
    /// the audit note.
    pub fn certify(
        &self,
        alert_id: i64,
        analysis: &VehicleAnalysis,
        artifacts: &dyn ArtifactRegistry,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(GapAlert, GapCertification)> {
        let alert = self.repo.get(alert_id)?;
        let artifact_ref = artifacts
            .completed_artifact(&alert.vehicle_id)?
            .ok_or_else(|| FgmError::MissingArtifact {
                vehicle_id: alert.vehicle_id.clone(),
            })?;

        let certification =
            GapCertification::from_analysis(alert_id, analysis, &artifact_ref, actor, now)?;

        let updated = self.repo.transition(
            alert_id,
            &TransitionRequest {
                next_status: AlertStatus::Completed,
                action: AuditAction::Certified,
                actor: actor.to_string(),
                outcome: Some(VerificationOutcome::Valid),
                decision: Some(FinalDecision::Accepted),
                note: Some(format!(
                    "certified against artifact {artifact_ref}; content hash {}",
                    certification.content_hash
                )),
            },
            now,
        )?;
        Ok((updated, certification))
    }

    /// Escalate an open alert for human review.
    pub fn escalate(
        &self,
        alert_id: i64,
        actor: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<GapAlert> {
        self.repo.transition(
            alert_id,
            &TransitionRequest {
                next_status: AlertStatus::Escalated,
                action: AuditAction::Escalated,
                actor: actor.to_string(),
                outcome: Some(VerificationOutcome::NeedsReview),
                decision: Some(FinalDecision::NeedsReview),
                note,
            },
            now,
        )
    }

    /// Close an alert as a confirmed contract breach.
    pub fn mark_breach(
        &self,
        alert_id: i64,
        actor: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<GapAlert> {
        self.repo.transition(
            alert_id,
            &TransitionRequest {
                next_status: AlertStatus::ContractBreach,
                action: AuditAction::ContractBreach,
                actor: actor.to_string(),
                outcome: Some(VerificationOutcome::Invalid),
                decision: Some(FinalDecision::Rejected),
                note,
            },
            now,
        )
    }

    /// Automated variant of `escalate` used by the monitoring daemon for
    /// critical drafts.
    pub fn auto_escalate(&self, alert_id: i64, now: DateTime<Utc>) -> Result<GapAlert> {
        self.escalate(
            alert_id,
            SYSTEM_ACTOR,
            Some("auto-escalated critical alert".to_string()),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::model::AlertType;
    use crate::alerts::repo::{AlertFilter, MemoryAlertRepository};
    use crate::core::config::Config;
    use crate::engine::analyzer::{AnalyzerSources, GapAnalyzer};
    use crate::sources::memory::MemoryFleet;
    use chrono::TimeZone;
    use serde_json::json;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 2, h, 0, 0).unwrap()
    }

    /// One vehicle with a 10h outage in a short window, enough to fire the
    /// consecutive-gaps and gap-percentage rules.
    fn gappy_fleet() -> MemoryFleet {
        let fleet = MemoryFleet::new();
        fleet.add_record("veh-1", hour(0), json!({}));
        fleet.add_record("veh-1", hour(11), json!({}));
        fleet
    }

    fn analyze(fleet: &MemoryFleet) -> VehicleAnalysis {
        let sources = AnalyzerSources {
            telemetry: fleet,
            failures: fleet,
            sessions: fleet,
        };
        GapAnalyzer::from_config(&Config::default())
            .analyze_vehicle(&sources, "veh-1", hour(11))
            .unwrap()
            .expect("vehicle has data")
    }

    #[test]
    fn raise_is_idempotent_across_sweeps() {
        let fleet = gappy_fleet();
        let analysis = analyze(&fleet);
        assert!(!analysis.drafts.is_empty());

        let repo = MemoryAlertRepository::new();
        let lifecycle = AlertLifecycle::new(&repo);
        let first = lifecycle.raise_from_analysis(&analysis, hour(11)).unwrap();
        assert!(first.iter().all(|o| matches!(o, CreateOutcome::Created(_))));

        let second = lifecycle
            .raise_from_analysis(&analysis, hour(11) + chrono::Duration::hours(1))
            .unwrap();
        assert!(second
            .iter()
            .all(|o| matches!(o, CreateOutcome::AlreadyOpen(_))));
        assert_eq!(
            repo.list(&AlertFilter::default()).unwrap().len(),
            analysis.drafts.len()
        );
    }

    #[test]
    fn certify_requires_completed_artifact() {
        let fleet = gappy_fleet();
        let analysis = analyze(&fleet);
        let repo = MemoryAlertRepository::new();
        let lifecycle = AlertLifecycle::new(&repo);
        let outcomes = lifecycle.raise_from_analysis(&analysis, hour(11)).unwrap();
        let alert_id = outcomes[0].alert().id;

        let err = lifecycle
            .certify(alert_id, &analysis, &fleet, "ops", hour(12))
            .expect_err("no artifact registered");
        assert_eq!(err.code(), "FGM-2202");
        // Precondition failure leaves the alert open with no extra audit.
        assert_eq!(repo.get(alert_id).unwrap().status, AlertStatus::Open);
        assert_eq!(repo.audit_trail(alert_id).unwrap().len(), 1);
    }

    #[test]
    fn certify_closes_alert_and_seals_evidence() {
        let fleet = gappy_fleet();
        fleet.set_artifact("veh-1", "doc://analysis/veh-1/42");
        let analysis = analyze(&fleet);
        let repo = MemoryAlertRepository::new();
        let lifecycle = AlertLifecycle::new(&repo);
        let alert_id = lifecycle.raise_from_analysis(&analysis, hour(11)).unwrap()[0]
            .alert()
            .id;

        let (alert, cert) = lifecycle
            .certify(alert_id, &analysis, &fleet, "ops", hour(12))
            .unwrap();
        assert_eq!(alert.status, AlertStatus::Completed);
        assert_eq!(alert.resolved_at, Some(hour(12)));
        assert!(cert.verify().unwrap());
        assert_eq!(cert.body.artifact_ref, "doc://analysis/veh-1/42");
        assert_eq!(cert.body.vehicle_id, "veh-1");

        let trail = repo.audit_trail(alert_id).unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].action, AuditAction::Certified);
        assert_eq!(trail[1].decision, Some(FinalDecision::Accepted));
        assert!(trail[1]
            .note
            .as_deref()
            .unwrap()
            .contains(&cert.content_hash));
    }

    #[test]
    fn escalate_then_breach() {
        let fleet = gappy_fleet();
        let analysis = analyze(&fleet);
        let repo = MemoryAlertRepository::new();
        let lifecycle = AlertLifecycle::new(&repo);
        let alert_id = lifecycle.raise_from_analysis(&analysis, hour(11)).unwrap()[0]
            .alert()
            .id;

        let escalated = lifecycle
            .escalate(alert_id, "ops", Some("looks wrong".to_string()), hour(12))
            .unwrap();
        assert_eq!(escalated.status, AlertStatus::Escalated);
        assert!(escalated.resolved_at.is_none());

        let breached = lifecycle
            .mark_breach(alert_id, "ops", None, hour(13))
            .unwrap();
        assert_eq!(breached.status, AlertStatus::ContractBreach);
        assert_eq!(breached.resolved_at, Some(hour(13)));

        let trail = repo.audit_trail(alert_id).unwrap();
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[2].outcome, Some(VerificationOutcome::Invalid));
    }

    #[test]
    fn certify_after_escalation_is_legal() {
        let fleet = gappy_fleet();
        fleet.set_artifact("veh-1", "doc://a");
        let analysis = analyze(&fleet);
        let repo = MemoryAlertRepository::new();
        let lifecycle = AlertLifecycle::new(&repo);
        let alert_id = lifecycle.raise_from_analysis(&analysis, hour(11)).unwrap()[0]
            .alert()
            .id;

        lifecycle.auto_escalate(alert_id, hour(12)).unwrap();
        let (alert, _) = lifecycle
            .certify(alert_id, &analysis, &fleet, "ops", hour(13))
            .unwrap();
        assert_eq!(alert.status, AlertStatus::Completed);
    }

    #[test]
    fn verbs_on_terminal_alert_fail_cleanly() {
        let fleet = gappy_fleet();
        let analysis = analyze(&fleet);
        let repo = MemoryAlertRepository::new();
        let lifecycle = AlertLifecycle::new(&repo);
        let alert_id = lifecycle.raise_from_analysis(&analysis, hour(11)).unwrap()[0]
            .alert()
            .id;
        lifecycle.mark_breach(alert_id, "ops", None, hour(12)).unwrap();

        let err = lifecycle
            .escalate(alert_id, "ops", None, hour(13))
            .expect_err("terminal");
        assert_eq!(err.code(), "FGM-2203");

        let types: Vec<AlertType> = repo
            .list(&AlertFilter::default())
            .unwrap()
            .iter()
            .map(|a| a.alert_type)
            .collect();
        assert!(!types.is_empty());
    }
}
