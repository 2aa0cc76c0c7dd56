//! Fleet snapshot files for offline analysis.
//!
//! Production deployments feed the engine through source adapters; the CLI
//! instead loads a JSON snapshot of the fleet (records, failures, sessions,
//! reports) into the in-memory sources. One format serves operator
//! spot-checks, incident replays, and integration tests alike.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{FgmError, Result};
use crate::sources::memory::MemoryFleet;
use crate::sources::{FailureEvent, ProfiledSession, ReportPeriod};

/// Top-level snapshot document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub vehicles: Vec<VehicleSnapshot>,
    /// report id -> covered vehicle and period.
    #[serde(default)]
    pub reports: BTreeMap<String, ReportSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: String,
    #[serde(default)]
    pub records: Vec<RecordSnapshot>,
    #[serde(default)]
    pub failures: Vec<FailureEvent>,
    #[serde(default)]
    pub sessions: Vec<ProfiledSession>,
    /// Completed analysis artifact reference, when one exists downstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub vehicle_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl FleetSnapshot {
    /// Parse a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| FgmError::io(path, source))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Materialize the snapshot as in-memory sources.
    #[must_use]
    pub fn into_fleet(self) -> MemoryFleet {
        let fleet = MemoryFleet::new();
        for vehicle in self.vehicles {
            fleet.add_vehicle(&vehicle.id);
            for record in vehicle.records {
                fleet.add_record(&vehicle.id, record.ts, record.payload);
            }
            for failure in vehicle.failures {
                fleet.add_failure(&vehicle.id, failure);
            }
            for session in vehicle.sessions {
                fleet.add_session(&vehicle.id, session);
            }
            if let Some(artifact) = vehicle.artifact {
                fleet.set_artifact(&vehicle.id, &artifact);
            }
        }
        for (report_id, report) in self.reports {
            fleet.set_report(
                &report_id,
                ReportPeriod {
                    vehicle_id: report.vehicle_id,
                    period_start: report.period_start,
                    period_end: report.period_end,
                },
            );
        }
        fleet
    }
}

/// Load a snapshot file straight into in-memory sources.
pub fn load_fleet(path: &Path) -> Result<MemoryFleet> {
    Ok(FleetSnapshot::load(path)?.into_fleet())
}
