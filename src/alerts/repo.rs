//! Alert persistence contract and the in-memory reference implementation.
//!
//! Two invariants every implementation must hold:
//!   1. at most one open alert per (vehicle, alert type) — repeated sweeps
//!      touch the existing row instead of stacking duplicates;
//!   2. every state transition is atomic with exactly one audit entry, and
//!      illegal transitions change nothing at all.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::alerts::model::{
    AlertStatus, AlertType, AuditAction, AuditEntry, FinalDecision, GapAlert,
    VerificationOutcome,
};
use crate::core::errors::{FgmError, Result};
use crate::engine::thresholds::AlertDraft;

/// Result of `create_if_absent`.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A new alert row was inserted with its auto-detection audit entry.
    Created(GapAlert),
    /// An open alert of this type already existed; nothing was written.
    AlreadyOpen(GapAlert),
}

impl CreateOutcome {
    #[must_use]
    pub fn alert(&self) -> &GapAlert {
        match self {
            Self::Created(alert) | Self::AlreadyOpen(alert) => alert,
        }
    }
}

/// One requested state transition with its audit payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub next_status: AlertStatus,
    pub action: AuditAction,
    pub actor: String,
    pub outcome: Option<VerificationOutcome>,
    pub decision: Option<FinalDecision>,
    pub note: Option<String>,
}

/// Filter for alert listing; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub vehicle_id: Option<String>,
    pub status: Option<AlertStatus>,
}

/// Alert storage.
pub trait AlertRepository: Send + Sync {
    /// Insert an open alert for `(vehicle, draft.alert_type)` unless one is
    /// already open. Insertion writes the `auto_detected` audit entry in the
    /// same atomic step.
    fn create_if_absent(
        &self,
        vehicle_id: &str,
        draft: &AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome>;

    /// Fails with `FGM-2201` for an unknown id.
    fn get(&self, alert_id: i64) -> Result<GapAlert>;

    fn list(&self, filter: &AlertFilter) -> Result<Vec<GapAlert>>;

    /// Apply one legal transition atomically with exactly one audit entry.
    ///
    /// An illegal transition fails with `FGM-2203` and leaves the alert row
    /// and audit trail untouched. Entering a terminal state sets
    /// `resolved_at` once.
    fn transition(
        &self,
        alert_id: i64,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<GapAlert>;

    /// Audit entries for an alert, oldest first.
    fn audit_trail(&self, alert_id: i64) -> Result<Vec<AuditEntry>>;
}

// ──────────────────── in-memory implementation ────────────────────

#[derive(Default)]
struct RepoState {
    alerts: Vec<GapAlert>,
    audit: Vec<AuditEntry>,
    next_alert_id: i64,
    next_audit_id: i64,
}

/// In-memory repository for tests and single-process use. One mutex
/// serializes create and transition, which gives the at-most-one-open and
/// atomicity invariants for free.
#[derive(Default)]
pub struct MemoryAlertRepository {
    state: Mutex<RepoState>,
}

impl MemoryAlertRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn open_alert_position(state: &RepoState, vehicle_id: &str, alert_type: AlertType) -> Option<usize> {
    state.alerts.iter().position(|a| {
        a.vehicle_id == vehicle_id && a.alert_type == alert_type && a.status == AlertStatus::Open
    })
}

impl AlertRepository for MemoryAlertRepository {
    fn create_if_absent(
        &self,
        vehicle_id: &str,
        draft: &AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome> {
        let mut state = self.state.lock();
        if let Some(pos) = open_alert_position(&state, vehicle_id, draft.alert_type) {
            return Ok(CreateOutcome::AlreadyOpen(state.alerts[pos].clone()));
        }

        state.next_alert_id += 1;
        let alert = GapAlert {
            id: state.next_alert_id,
            vehicle_id: vehicle_id.to_string(),
            alert_type: draft.alert_type,
            severity: draft.severity,
            status: AlertStatus::Open,
            description: draft.description.clone(),
            metrics: draft.metrics.clone(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };
        state.alerts.push(alert.clone());

        state.next_audit_id += 1;
        let entry = AuditEntry {
            id: state.next_audit_id,
            alert_id: alert.id,
            action: AuditAction::AutoDetected,
            actor: "system".to_string(),
            outcome: None,
            decision: None,
            note: Some(draft.description.clone()),
            recorded_at: now,
        };
        state.audit.push(entry);

        Ok(CreateOutcome::Created(alert))
    }

    fn get(&self, alert_id: i64) -> Result<GapAlert> {
        self.state
            .lock()
            .alerts
            .iter()
            .find(|a| a.id == alert_id)
            .cloned()
            .ok_or(FgmError::UnknownAlert { alert_id })
    }

    fn list(&self, filter: &AlertFilter) -> Result<Vec<GapAlert>> {
        let state = self.state.lock();
        Ok(state
            .alerts
            .iter()
            .filter(|a| {
                filter
                    .vehicle_id
                    .as_ref()
                    .is_none_or(|v| *v == a.vehicle_id)
                    && filter.status.is_none_or(|s| s == a.status)
            })
            .cloned()
            .collect())
    }

    fn transition(
        &self,
        alert_id: i64,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<GapAlert> {
        let mut state = self.state.lock();
        let pos = state
            .alerts
            .iter()
            .position(|a| a.id == alert_id)
            .ok_or(FgmError::UnknownAlert { alert_id })?;

        let current = state.alerts[pos].status;
        if !current.can_transition_to(request.next_status) {
            return Err(FgmError::InvalidStateTransition {
                alert_id,
                current: current.as_str().to_string(),
                requested: request.next_status.as_str().to_string(),
            });
        }

        {
            let alert = &mut state.alerts[pos];
            alert.status = request.next_status;
            alert.updated_at = now;
            if request.next_status.is_terminal() {
                alert.resolved_at = Some(now);
            }
        }

        state.next_audit_id += 1;
        let entry = AuditEntry {
            id: state.next_audit_id,
            alert_id,
            action: request.action,
            actor: request.actor.clone(),
            outcome: request.outcome,
            decision: request.decision,
            note: request.note.clone(),
            recorded_at: now,
        };
        state.audit.push(entry);

        Ok(state.alerts[pos].clone())
    }

    fn audit_trail(&self, alert_id: i64) -> Result<Vec<AuditEntry>> {
        let state = self.state.lock();
        if !state.alerts.iter().any(|a| a.id == alert_id) {
            return Err(FgmError::UnknownAlert { alert_id });
        }
        Ok(state
            .audit
            .iter()
            .filter(|e| e.alert_id == alert_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::model::Severity;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap()
    }

    fn draft(alert_type: AlertType) -> AlertDraft {
        AlertDraft {
            alert_type,
            severity: Severity::Warning,
            description: "test draft".to_string(),
            metrics: json!({"gap_hours": 3}),
        }
    }

    #[test]
    fn create_writes_alert_and_audit_atomically() {
        let repo = MemoryAlertRepository::new();
        let outcome = repo
            .create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap();
        let CreateOutcome::Created(alert) = outcome else {
            panic!("expected creation");
        };
        assert_eq!(alert.status, AlertStatus::Open);
        assert!(alert.resolved_at.is_none());

        let trail = repo.audit_trail(alert.id).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::AutoDetected);
        assert_eq!(trail[0].actor, "system");
    }

    #[test]
    fn duplicate_open_alert_not_created() {
        let repo = MemoryAlertRepository::new();
        let first = repo
            .create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap();
        let second = repo
            .create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap();
        assert!(matches!(second, CreateOutcome::AlreadyOpen(_)));
        assert_eq!(second.alert().id, first.alert().id);
        assert_eq!(repo.list(&AlertFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn different_types_or_vehicles_coexist() {
        let repo = MemoryAlertRepository::new();
        repo.create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap();
        repo.create_if_absent("veh-1", &draft(AlertType::ConsecutiveGaps), now())
            .unwrap();
        repo.create_if_absent("veh-2", &draft(AlertType::LowConfidence), now())
            .unwrap();
        assert_eq!(repo.list(&AlertFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn resolved_alert_allows_new_one() {
        let repo = MemoryAlertRepository::new();
        let first = repo
            .create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap();
        repo.transition(
            first.alert().id,
            &TransitionRequest {
                next_status: AlertStatus::Completed,
                action: AuditAction::Certified,
                actor: "system".to_string(),
                outcome: Some(VerificationOutcome::Valid),
                decision: Some(FinalDecision::Accepted),
                note: None,
            },
            now(),
        )
        .unwrap();

        let second = repo
            .create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap();
        assert!(matches!(second, CreateOutcome::Created(_)));
        assert_ne!(second.alert().id, first.alert().id);
    }

    #[test]
    fn legal_transition_sets_resolved_at_and_audits_once() {
        let repo = MemoryAlertRepository::new();
        let created = repo
            .create_if_absent("veh-1", &draft(AlertType::ProfiledAnomaly), now())
            .unwrap();
        let id = created.alert().id;
        let later = now() + chrono::Duration::hours(1);

        let updated = repo
            .transition(
                id,
                &TransitionRequest {
                    next_status: AlertStatus::ContractBreach,
                    action: AuditAction::ContractBreach,
                    actor: "ops".to_string(),
                    outcome: Some(VerificationOutcome::Invalid),
                    decision: Some(FinalDecision::Rejected),
                    note: Some("manual review".to_string()),
                },
                later,
            )
            .unwrap();
        assert_eq!(updated.status, AlertStatus::ContractBreach);
        assert_eq!(updated.resolved_at, Some(later));

        let trail = repo.audit_trail(id).unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].action, AuditAction::ContractBreach);
        assert_eq!(trail[1].decision, Some(FinalDecision::Rejected));
    }

    #[test]
    fn illegal_transition_changes_nothing() {
        let repo = MemoryAlertRepository::new();
        let created = repo
            .create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap();
        let id = created.alert().id;
        repo.transition(
            id,
            &TransitionRequest {
                next_status: AlertStatus::Completed,
                action: AuditAction::Certified,
                actor: "system".to_string(),
                outcome: Some(VerificationOutcome::Valid),
                decision: Some(FinalDecision::Accepted),
                note: None,
            },
            now(),
        )
        .unwrap();

        // Terminal state: every further transition is illegal.
        let err = repo
            .transition(
                id,
                &TransitionRequest {
                    next_status: AlertStatus::Escalated,
                    action: AuditAction::Escalated,
                    actor: "ops".to_string(),
                    outcome: None,
                    decision: None,
                    note: None,
                },
                now(),
            )
            .expect_err("terminal alerts are immutable");
        assert_eq!(err.code(), "FGM-2203");

        let alert = repo.get(id).unwrap();
        assert_eq!(alert.status, AlertStatus::Completed);
        assert_eq!(repo.audit_trail(id).unwrap().len(), 2, "no audit written");
    }

    #[test]
    fn escalated_can_still_complete() {
        let repo = MemoryAlertRepository::new();
        let id = repo
            .create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap()
            .alert()
            .id;
        repo.transition(
            id,
            &TransitionRequest {
                next_status: AlertStatus::Escalated,
                action: AuditAction::Escalated,
                actor: "system".to_string(),
                outcome: Some(VerificationOutcome::NeedsReview),
                decision: Some(FinalDecision::NeedsReview),
                note: None,
            },
            now(),
        )
        .unwrap();
        let done = repo
            .transition(
                id,
                &TransitionRequest {
                    next_status: AlertStatus::Completed,
                    action: AuditAction::Certified,
                    actor: "ops".to_string(),
                    outcome: Some(VerificationOutcome::Valid),
                    decision: Some(FinalDecision::Accepted),
                    note: None,
                },
                now(),
            )
            .unwrap();
        assert_eq!(done.status, AlertStatus::Completed);
        assert_eq!(repo.audit_trail(id).unwrap().len(), 3);
    }

    #[test]
    fn unknown_alert_errors() {
        let repo = MemoryAlertRepository::new();
        assert_eq!(repo.get(99).unwrap_err().code(), "FGM-2201");
        assert_eq!(repo.audit_trail(99).unwrap_err().code(), "FGM-2201");
    }

    #[test]
    fn list_filters_by_vehicle_and_status() {
        let repo = MemoryAlertRepository::new();
        repo.create_if_absent("veh-1", &draft(AlertType::LowConfidence), now())
            .unwrap();
        let id = repo
            .create_if_absent("veh-2", &draft(AlertType::LowConfidence), now())
            .unwrap()
            .alert()
            .id;
        repo.transition(
            id,
            &TransitionRequest {
                next_status: AlertStatus::Completed,
                action: AuditAction::Certified,
                actor: "system".to_string(),
                outcome: Some(VerificationOutcome::Valid),
                decision: Some(FinalDecision::Accepted),
                note: None,
            },
            now(),
        )
        .unwrap();

        let open_only = repo
            .list(&AlertFilter {
                vehicle_id: None,
                status: Some(AlertStatus::Open),
            })
            .unwrap();
        assert_eq!(open_only.len(), 1);
        assert_eq!(open_only[0].vehicle_id, "veh-1");

        let veh2 = repo
            .list(&AlertFilter {
                vehicle_id: Some("veh-2".to_string()),
                status: None,
            })
            .unwrap();
        assert_eq!(veh2.len(), 1);
    }
}
