//! Alert domain model: types, severities, lifecycle states, audit records.
//!
//! Every enum stores as a stable snake_case string so SQLite rows and JSONL
//! events stay readable and greppable. `from_str`/`as_str` are the single
//! source of truth for those encodings.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{FgmError, Result};

// ──────────────────── classification ────────────────────

/// The five threshold rules an alert can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowConfidence,
    ConsecutiveGaps,
    HighGapPercentage,
    ProfiledAnomaly,
    MonthlyThreshold,
}

impl AlertType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowConfidence => "low_confidence",
            Self::ConsecutiveGaps => "consecutive_gaps",
            Self::HighGapPercentage => "high_gap_percentage",
            Self::ProfiledAnomaly => "profiled_anomaly",
            Self::MonthlyThreshold => "monthly_threshold",
        }
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "low_confidence" => Ok(Self::LowConfidence),
            "consecutive_gaps" => Ok(Self::ConsecutiveGaps),
            "high_gap_percentage" => Ok(Self::HighGapPercentage),
            "profiled_anomaly" => Ok(Self::ProfiledAnomaly),
            "monthly_threshold" => Ok(Self::MonthlyThreshold),
            other => Err(FgmError::Runtime {
                details: format!("unknown alert type {other:?}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(FgmError::Runtime {
                details: format!("unknown severity {other:?}"),
            }),
        }
    }
}

// ──────────────────── lifecycle ────────────────────

/// Alert lifecycle state.
///
/// Legal transitions: `Open -> {Completed, Escalated, ContractBreach}`,
/// `Escalated -> {Completed, ContractBreach}`. `Completed` and
/// `ContractBreach` are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Escalated,
    Completed,
    ContractBreach,
}

impl AlertStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Escalated => "escalated",
            Self::Completed => "completed",
            Self::ContractBreach => "contract_breach",
        }
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "open" => Ok(Self::Open),
            "escalated" => Ok(Self::Escalated),
            "completed" => Ok(Self::Completed),
            "contract_breach" => Ok(Self::ContractBreach),
            other => Err(FgmError::Runtime {
                details: format!("unknown alert status {other:?}"),
            }),
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Open,
                Self::Completed | Self::Escalated | Self::ContractBreach
            ) | (Self::Escalated, Self::Completed | Self::ContractBreach)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::ContractBreach)
    }
}

// ──────────────────── audit trail ────────────────────

/// Action recorded in one audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AutoDetected,
    Certified,
    Escalated,
    ContractBreach,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AutoDetected => "auto_detected",
            Self::Certified => "certified",
            Self::Escalated => "escalated",
            Self::ContractBreach => "contract_breach",
        }
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "auto_detected" => Ok(Self::AutoDetected),
            "certified" => Ok(Self::Certified),
            "escalated" => Ok(Self::Escalated),
            "contract_breach" => Ok(Self::ContractBreach),
            other => Err(FgmError::Runtime {
                details: format!("unknown audit action {other:?}"),
            }),
        }
    }
}

/// What the verification step concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Valid,
    NeedsReview,
    Invalid,
}

impl VerificationOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::NeedsReview => "needs_review",
            Self::Invalid => "invalid",
        }
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "valid" => Ok(Self::Valid),
            "needs_review" => Ok(Self::NeedsReview),
            "invalid" => Ok(Self::Invalid),
            other => Err(FgmError::Runtime {
                details: format!("unknown verification outcome {other:?}"),
            }),
        }
    }
}

/// The decision the transition committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalDecision {
    Accepted,
    NeedsReview,
    Rejected,
}

impl FinalDecision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::NeedsReview => "needs_review",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "accepted" => Ok(Self::Accepted),
            "needs_review" => Ok(Self::NeedsReview),
            "rejected" => Ok(Self::Rejected),
            other => Err(FgmError::Runtime {
                details: format!("unknown final decision {other:?}"),
            }),
        }
    }
}

// ──────────────────── records ────────────────────

/// A persisted gap alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapAlert {
    pub id: i64,
    pub vehicle_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    pub description: String,
    /// Metrics snapshot from the analysis that raised the alert.
    pub metrics: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly once, when the alert enters a terminal state.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One append-only audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub alert_id: i64,
    pub action: AuditAction,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VerificationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<FinalDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use AlertStatus::{Completed, ContractBreach, Escalated, Open};
        let all = [Open, Escalated, Completed, ContractBreach];

        assert!(Open.can_transition_to(Completed));
        assert!(Open.can_transition_to(Escalated));
        assert!(Open.can_transition_to(ContractBreach));
        assert!(Escalated.can_transition_to(Completed));
        assert!(Escalated.can_transition_to(ContractBreach));

        assert!(!Escalated.can_transition_to(Open));
        assert!(!Open.can_transition_to(Open));
        for target in all {
            assert!(!Completed.can_transition_to(target), "completed is terminal");
            assert!(
                !ContractBreach.can_transition_to(target),
                "breach is terminal"
            );
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!AlertStatus::Open.is_terminal());
        assert!(!AlertStatus::Escalated.is_terminal());
        assert!(AlertStatus::Completed.is_terminal());
        assert!(AlertStatus::ContractBreach.is_terminal());
    }

    #[test]
    fn string_encodings_round_trip() {
        for at in [
            AlertType::LowConfidence,
            AlertType::ConsecutiveGaps,
            AlertType::HighGapPercentage,
            AlertType::ProfiledAnomaly,
            AlertType::MonthlyThreshold,
        ] {
            assert_eq!(AlertType::from_str(at.as_str()).unwrap(), at);
        }
        for sev in [Severity::Info, Severity::Warning, Severity::Critical] {
            assert_eq!(Severity::from_str(sev.as_str()).unwrap(), sev);
        }
        for st in [
            AlertStatus::Open,
            AlertStatus::Escalated,
            AlertStatus::Completed,
            AlertStatus::ContractBreach,
        ] {
            assert_eq!(AlertStatus::from_str(st.as_str()).unwrap(), st);
        }
        for action in [
            AuditAction::AutoDetected,
            AuditAction::Certified,
            AuditAction::Escalated,
            AuditAction::ContractBreach,
        ] {
            assert_eq!(AuditAction::from_str(action.as_str()).unwrap(), action);
        }
    }

    #[test]
    fn unknown_strings_rejected() {
        assert!(AlertType::from_str("bogus").is_err());
        assert!(AlertStatus::from_str("").is_err());
        assert!(Severity::from_str("CRITICAL").is_err(), "case sensitive");
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AlertStatus::ContractBreach).unwrap();
        assert_eq!(json, "\"contract_breach\"");
        let json = serde_json::to_string(&AlertType::HighGapPercentage).unwrap();
        assert_eq!(json, "\"high_gap_percentage\"");
    }
}
