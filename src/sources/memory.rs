//! In-memory source implementations for tests and CLI fixtures.
//!
//! A single `MemoryFleet` implements every consumed contract, holding all
//! state behind one `parking_lot::RwLock`.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::core::errors::Result;
use crate::sources::{
    ArtifactRegistry, FailureEvent, FailureLogSource, ProfiledSession, ProfiledSessionSource,
    ReportCorrelator, ReportPeriod, TelemetrySource, VehicleRegistry,
};

#[derive(Default)]
struct FleetState {
    /// vehicle id -> timestamp -> payload
    records: HashMap<String, BTreeMap<DateTime<Utc>, Value>>,
    failures: HashMap<String, Vec<FailureEvent>>,
    sessions: HashMap<String, Vec<ProfiledSession>>,
    artifacts: HashMap<String, String>,
    reports: HashMap<String, ReportPeriod>,
    vehicles: Vec<String>,
}

/// In-memory fleet backing every source trait.
#[derive(Default)]
pub struct MemoryFleet {
    state: RwLock<FleetState>,
}

impl MemoryFleet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vehicle for scheduler sweeps.
    pub fn add_vehicle(&self, vehicle_id: &str) {
        let mut state = self.state.write();
        if !state.vehicles.iter().any(|v| v == vehicle_id) {
            state.vehicles.push(vehicle_id.to_string());
        }
    }

    /// Insert one telemetry snapshot. Also registers the vehicle.
    pub fn add_record(&self, vehicle_id: &str, ts: DateTime<Utc>, payload: Value) {
        self.add_vehicle(vehicle_id);
        self.state
            .write()
            .records
            .entry(vehicle_id.to_string())
            .or_default()
            .insert(ts, payload);
    }

    pub fn add_failure(&self, vehicle_id: &str, event: FailureEvent) {
        self.state
            .write()
            .failures
            .entry(vehicle_id.to_string())
            .or_default()
            .push(event);
    }

    pub fn add_session(&self, vehicle_id: &str, session: ProfiledSession) {
        self.state
            .write()
            .sessions
            .entry(vehicle_id.to_string())
            .or_default()
            .push(session);
    }

    pub fn set_artifact(&self, vehicle_id: &str, reference: &str) {
        self.state
            .write()
            .artifacts
            .insert(vehicle_id.to_string(), reference.to_string());
    }

    pub fn set_report(&self, report_id: &str, period: ReportPeriod) {
        self.state
            .write()
            .reports
            .insert(report_id.to_string(), period);
    }
}

impl TelemetrySource for MemoryFleet {
    fn list_timestamps(
        &self,
        vehicle_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let state = self.state.read();
        Ok(state.records.get(vehicle_id).map_or_else(Vec::new, |recs| {
            recs.range(from..=to).map(|(ts, _)| *ts).collect()
        }))
    }

    fn load_payloads(
        &self,
        vehicle_id: &str,
        timestamps: &BTreeSet<DateTime<Utc>>,
    ) -> Result<Vec<(DateTime<Utc>, Value)>> {
        let state = self.state.read();
        Ok(state.records.get(vehicle_id).map_or_else(Vec::new, |recs| {
            timestamps
                .iter()
                .filter_map(|ts| recs.get(ts).map(|payload| (*ts, payload.clone())))
                .collect()
        }))
    }

    fn first_record_timestamp(&self, vehicle_id: &str) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.read();
        Ok(state
            .records
            .get(vehicle_id)
            .and_then(|recs| recs.keys().next().copied()))
    }
}

impl FailureLogSource for MemoryFleet {
    fn list_failures(
        &self,
        vehicle_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FailureEvent>> {
        let state = self.state.read();
        Ok(state.failures.get(vehicle_id).map_or_else(Vec::new, |all| {
            all.iter()
                .filter(|f| f.attempted_at >= from && f.attempted_at <= to)
                .cloned()
                .collect()
        }))
    }
}

impl ProfiledSessionSource for MemoryFleet {
    fn list_active_sessions(
        &self,
        vehicle_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ProfiledSession>> {
        let state = self.state.read();
        Ok(state.sessions.get(vehicle_id).map_or_else(Vec::new, |all| {
            all.iter()
                .filter(|s| s.started_at <= to && s.expires_at.is_none_or(|end| end > from))
                .cloned()
                .collect()
        }))
    }
}

impl VehicleRegistry for MemoryFleet {
    fn list_active_vehicles(&self) -> Result<Vec<String>> {
        Ok(self.state.read().vehicles.clone())
    }
}

impl ReportCorrelator for MemoryFleet {
    fn report_period(&self, report_id: &str) -> Result<Option<ReportPeriod>> {
        Ok(self.state.read().reports.get(report_id).cloned())
    }
}

impl ArtifactRegistry for MemoryFleet {
    fn completed_artifact(&self, vehicle_id: &str) -> Result<Option<String>> {
        Ok(self.state.read().artifacts.get(vehicle_id).cloned())
    }
}
