//! Collaborator contracts consumed by the engine.
//!
//! The core owns no storage for telemetry, failure logs, profiled sessions,
//! or reports. Each of those subsystems is reached through a narrow trait so
//! the engine can be driven by production adapters, in-memory fixtures, or
//! anything in between.

#![allow(missing_docs)]

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

pub mod memory;

// ──────────────────── value types ────────────────────

/// Classified reason a telemetry fetch attempt failed.
///
/// Technical reasons (timeout, auth, outage) are evidence the *pipeline*
/// broke, not the vehicle; intentional deactivation and revoked consent are
/// not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    AuthError,
    ApiOutage,
    VehicleDeactivated,
    ConsentRevoked,
}

impl FailureReason {
    /// Whether the failure is technical rather than intentional.
    #[must_use]
    pub const fn is_technical(self) -> bool {
        matches!(self, Self::Timeout | Self::AuthError | Self::ApiOutage)
    }
}

/// A documented telemetry fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub attempted_at: DateTime<Utc>,
    pub reason: FailureReason,
}

/// An externally managed interval during which a consent-verified person was
/// authorized to use the vehicle. `expires_at = None` means open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfiledSession {
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub subject: String,
}

impl ProfiledSession {
    /// Whether `[started_at, expires_at or +inf)` contains `ts`.
    #[must_use]
    pub fn covers(&self, ts: DateTime<Utc>) -> bool {
        self.started_at <= ts && self.expires_at.is_none_or(|end| ts < end)
    }
}

/// Report correlation result: the vehicle and period a report covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPeriod {
    pub vehicle_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

// ──────────────────── consumed contracts ────────────────────

/// Telemetry snapshot storage, read-only.
///
/// `list_timestamps` never materializes payloads; `load_payloads` takes an
/// explicit timestamp set so callers can restrict payload loading to the few
/// records adjacent to gaps.
pub trait TelemetrySource: Send + Sync {
    fn list_timestamps(
        &self,
        vehicle_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>>;

    fn load_payloads(
        &self,
        vehicle_id: &str,
        timestamps: &BTreeSet<DateTime<Utc>>,
    ) -> Result<Vec<(DateTime<Utc>, serde_json::Value)>>;

    fn first_record_timestamp(&self, vehicle_id: &str) -> Result<Option<DateTime<Utc>>>;
}

/// Documented fetch failures, read-only.
pub trait FailureLogSource: Send + Sync {
    fn list_failures(
        &self,
        vehicle_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FailureEvent>>;
}

/// Profiled usage sessions, read-only.
pub trait ProfiledSessionSource: Send + Sync {
    /// Sessions overlapping `[from, to]` for the vehicle.
    fn list_active_sessions(
        &self,
        vehicle_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ProfiledSession>>;
}

/// The set of vehicles the scheduler sweeps.
pub trait VehicleRegistry: Send + Sync {
    fn list_active_vehicles(&self) -> Result<Vec<String>>;
}

/// Maps a report identifier to the vehicle and period it covers.
pub trait ReportCorrelator: Send + Sync {
    fn report_period(&self, report_id: &str) -> Result<Option<ReportPeriod>>;
}

/// Downstream document store queried before certification.
///
/// Certification is only legal once a completed analysis document exists for
/// the vehicle; the returned reference is recorded in the audit trail.
pub trait ArtifactRegistry: Send + Sync {
    fn completed_artifact(&self, vehicle_id: &str) -> Result<Option<String>>;
}
