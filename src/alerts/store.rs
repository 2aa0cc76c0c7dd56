//! SQLite-backed alert repository.
//!
//! Layout: `gap_alerts` plus an append-only `alert_audit` table. A partial
//! unique index enforces at-most-one-open per `(vehicle_id, alert_type)` at
//! the storage layer, so the invariant survives process restarts and
//! concurrent writers. Every create and transition runs in one transaction
//! with its single audit row.

#![allow(missing_docs)]

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::alerts::model::{
    AlertStatus, AlertType, AuditAction, AuditEntry, FinalDecision, GapAlert, Severity,
    VerificationOutcome,
};
use crate::alerts::repo::{AlertFilter, AlertRepository, CreateOutcome, TransitionRequest};
use crate::core::errors::{FgmError, Result};
use crate::core::time::{format_rfc3339, parse_rfc3339};
use crate::engine::thresholds::AlertDraft;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS gap_alerts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    vehicle_id  TEXT NOT NULL,
    alert_type  TEXT NOT NULL,
    severity    TEXT NOT NULL,
    status      TEXT NOT NULL,
    description TEXT NOT NULL,
    metrics     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    resolved_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_gap_alerts_one_open
    ON gap_alerts (vehicle_id, alert_type) WHERE status = 'open';

CREATE INDEX IF NOT EXISTS idx_gap_alerts_vehicle
    ON gap_alerts (vehicle_id, status);

CREATE TABLE IF NOT EXISTS alert_audit (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_id    INTEGER NOT NULL REFERENCES gap_alerts (id),
    action      TEXT NOT NULL,
    actor       TEXT NOT NULL,
    outcome     TEXT,
    decision    TEXT,
    note        TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_alert_audit_alert
    ON alert_audit (alert_id, id);
";

/// SQLite alert store. The connection sits behind one mutex; alert traffic
/// is a handful of rows per sweep, not a throughput concern.
pub struct SqliteAlertStore {
    conn: Mutex<Connection>,
}

impl SqliteAlertStore {
    /// Open (and migrate) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| FgmError::io(parent, source))?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_stored_ts(raw: &str) -> Result<DateTime<Utc>> {
    parse_rfc3339(raw).ok_or_else(|| FgmError::Sql {
        context: "timestamp",
        details: format!("unparseable stored timestamp {raw:?}"),
    })
}

/// Raw column values; enum and timestamp parsing happens in `into_alert`,
/// outside rusqlite's error type.
struct RawAlertRow {
    id: i64,
    vehicle_id: String,
    alert_type: String,
    severity: String,
    status: String,
    description: String,
    metrics: String,
    created_at: String,
    updated_at: String,
    resolved_at: Option<String>,
}

impl RawAlertRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            vehicle_id: row.get(1)?,
            alert_type: row.get(2)?,
            severity: row.get(3)?,
            status: row.get(4)?,
            description: row.get(5)?,
            metrics: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            resolved_at: row.get(9)?,
        })
    }

    fn into_alert(self) -> Result<GapAlert> {
        Ok(GapAlert {
            id: self.id,
            vehicle_id: self.vehicle_id,
            alert_type: AlertType::from_str(&self.alert_type)?,
            severity: Severity::from_str(&self.severity)?,
            status: AlertStatus::from_str(&self.status)?,
            description: self.description,
            metrics: serde_json::from_str(&self.metrics)?,
            created_at: parse_stored_ts(&self.created_at)?,
            updated_at: parse_stored_ts(&self.updated_at)?,
            resolved_at: self
                .resolved_at
                .as_deref()
                .map(parse_stored_ts)
                .transpose()?,
        })
    }
}

const ALERT_COLUMNS: &str = "id, vehicle_id, alert_type, severity, status, description, metrics, \
                             created_at, updated_at, resolved_at";

impl SqliteAlertStore {
    fn load_alert(conn: &Connection, alert_id: i64) -> Result<GapAlert> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ALERT_COLUMNS} FROM gap_alerts WHERE id = ?1"
        ))?;
        let raw = stmt
            .query_row(params![alert_id], RawAlertRow::from_row)
            .optional()?
            .ok_or(FgmError::UnknownAlert { alert_id })?;
        raw.into_alert()
    }
}

impl AlertRepository for SqliteAlertStore {
    fn create_if_absent(
        &self,
        vehicle_id: &str,
        draft: &AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing: Option<i64> = {
            let mut stmt = tx.prepare_cached(
                "SELECT id FROM gap_alerts
                 WHERE vehicle_id = ?1 AND alert_type = ?2 AND status = 'open'",
            )?;
            stmt.query_row(params![vehicle_id, draft.alert_type.as_str()], |row| {
                row.get(0)
            })
            .optional()?
        };
        if let Some(id) = existing {
            let alert = Self::load_alert(&tx, id)?;
            tx.commit()?;
            return Ok(CreateOutcome::AlreadyOpen(alert));
        }

        let ts = format_rfc3339(now);
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO gap_alerts
                 (vehicle_id, alert_type, severity, status, description, metrics,
                  created_at, updated_at, resolved_at)
                 VALUES (?1, ?2, ?3, 'open', ?4, ?5, ?6, ?6, NULL)",
            )?;
            stmt.execute(params![
                vehicle_id,
                draft.alert_type.as_str(),
                draft.severity.as_str(),
                draft.description,
                draft.metrics.to_string(),
                ts,
            ])?;
        }
        let alert_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO alert_audit (alert_id, action, actor, outcome, decision, note, recorded_at)
                 VALUES (?1, ?2, 'system', NULL, NULL, ?3, ?4)",
            )?;
            stmt.execute(params![
                alert_id,
                AuditAction::AutoDetected.as_str(),
                draft.description,
                ts,
            ])?;
        }

        let alert = Self::load_alert(&tx, alert_id)?;
        tx.commit()?;
        Ok(CreateOutcome::Created(alert))
    }

    fn get(&self, alert_id: i64) -> Result<GapAlert> {
        let conn = self.conn.lock();
        Self::load_alert(&conn, alert_id)
    }

    fn list(&self, filter: &AlertFilter) -> Result<Vec<GapAlert>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ALERT_COLUMNS} FROM gap_alerts
             WHERE (?1 IS NULL OR vehicle_id = ?1)
               AND (?2 IS NULL OR status = ?2)
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.vehicle_id,
                filter.status.map(AlertStatus::as_str),
            ],
            RawAlertRow::from_row,
        )?;
        let mut alerts = Vec::new();
        for raw in rows {
            alerts.push(raw?.into_alert()?);
        }
        Ok(alerts)
    }

    fn transition(
        &self,
        alert_id: i64,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<GapAlert> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let current = Self::load_alert(&tx, alert_id)?;
        if !current.status.can_transition_to(request.next_status) {
            // Rolls back on drop; the row and trail stay untouched.
            return Err(FgmError::InvalidStateTransition {
                alert_id,
                current: current.status.as_str().to_string(),
                requested: request.next_status.as_str().to_string(),
            });
        }

        let ts = format_rfc3339(now);
        let resolved_at = request.next_status.is_terminal().then(|| ts.clone());
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE gap_alerts
                 SET status = ?2, updated_at = ?3,
                     resolved_at = COALESCE(resolved_at, ?4)
                 WHERE id = ?1",
            )?;
            stmt.execute(params![
                alert_id,
                request.next_status.as_str(),
                ts,
                resolved_at,
            ])?;
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO alert_audit (alert_id, action, actor, outcome, decision, note, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            stmt.execute(params![
                alert_id,
                request.action.as_str(),
                request.actor,
                request.outcome.map(VerificationOutcome::as_str),
                request.decision.map(FinalDecision::as_str),
                request.note,
                ts,
            ])?;
        }

        let alert = Self::load_alert(&tx, alert_id)?;
        tx.commit()?;
        Ok(alert)
    }

    fn audit_trail(&self, alert_id: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.conn.lock();
        // Validates the id first so a missing alert reads as FGM-2201, not
        // an empty trail.
        Self::load_alert(&conn, alert_id)?;

        let mut stmt = conn.prepare_cached(
            "SELECT id, alert_id, action, actor, outcome, decision, note, recorded_at
             FROM alert_audit WHERE alert_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![alert_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, alert_id, action, actor, outcome, decision, note, recorded_at) = row?;
            entries.push(AuditEntry {
                id,
                alert_id,
                action: AuditAction::from_str(&action)?,
                actor,
                outcome: outcome
                    .as_deref()
                    .map(VerificationOutcome::from_str)
                    .transpose()?,
                decision: decision
                    .as_deref()
                    .map(FinalDecision::from_str)
                    .transpose()?,
                note,
                recorded_at: parse_stored_ts(&recorded_at)?,
            });
        }
        Ok(entries)
    }
}
