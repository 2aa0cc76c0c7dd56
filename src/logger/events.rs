//! Activity logger thread and its non-blocking handle.
//!
//! A dedicated thread owns the `JsonlWriter`; every other thread sends
//! `ActivityEvent`s through a bounded crossbeam channel. Sends use
//! `try_send()` so the sweep loop is never blocked by logging back-pressure;
//! full-channel drops are counted, not retried.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::logger::jsonl::{EventKind, JsonlConfig, JsonlWriter, LogLine};

const CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the engine, lifecycle, and scheduler.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DaemonStarted {
        version: String,
        config_hash: String,
    },
    DaemonStopped {
        reason: String,
        uptime_secs: u64,
    },
    SweepStarted {
        vehicle_count: usize,
    },
    SweepCompleted {
        vehicles_swept: usize,
        alerts_raised: usize,
        duration_ms: u64,
    },
    VehicleAnalyzed {
        vehicle_id: String,
        gap_hours: u32,
        avg_confidence: f64,
        drafts: usize,
    },
    VehicleSkipped {
        vehicle_id: String,
        reason: String,
    },
    AlertRaised {
        vehicle_id: String,
        alert_id: i64,
        alert_type: String,
        severity: String,
    },
    AlertTransitioned {
        alert_id: i64,
        status: String,
        actor: String,
    },
    GapCertified {
        alert_id: i64,
        vehicle_id: String,
        content_hash: String,
    },
    ConfigReloaded {
        old_hash: String,
        new_hash: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel requesting graceful shutdown of the logger thread.
    Shutdown,
}

/// Cheaply cloneable sender for activity events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
    /// Keeps the channel connected when no logger thread is attached, so
    /// overflow still lands on the dropped-event counter.
    _idle_rx: Option<Receiver<ActivityEvent>>,
}

impl ActivityLoggerHandle {
    /// Send an event. Never blocks; a full channel drops the event and
    /// increments the counter. Disconnected is fine during shutdown.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// Handle writing nowhere, for tests and library embedding.
    #[must_use]
    pub fn disconnected() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
            _idle_rx: Some(rx),
        }
    }
}

/// Spawn the logger thread; returns the handle and the join handle.
#[must_use]
pub fn spawn_logger(config: JsonlConfig) -> (ActivityLoggerHandle, thread::JoinHandle<()>) {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::new(AtomicU64::new(0)),
        _idle_rx: None,
    };
    let join = thread::Builder::new()
        .name("fgm-logger".to_string())
        .spawn(move || logger_loop(&rx, JsonlWriter::open(config)))
        .unwrap_or_else(|e| {
            // Thread spawn failing this early means the process is done for.
            panic!("failed to spawn logger thread: {e}")
        });
    (handle, join)
}

fn logger_loop(rx: &Receiver<ActivityEvent>, mut writer: JsonlWriter) {
    while let Ok(event) = rx.recv() {
        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        writer.write_line(&render(event));
    }
    writer.flush();
}

fn render(event: ActivityEvent) -> LogLine {
    match event {
        ActivityEvent::DaemonStarted {
            version,
            config_hash,
        } => {
            let mut line = LogLine::new(EventKind::DaemonStart, "info");
            line.details = Some(format!("v{version} config {config_hash}"));
            line
        }
        ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
        } => {
            let mut line = LogLine::new(EventKind::DaemonStop, "info");
            line.details = Some(format!("{reason} after {uptime_secs}s"));
            line
        }
        ActivityEvent::SweepStarted { vehicle_count } => {
            let mut line = LogLine::new(EventKind::SweepStart, "info");
            line.vehicles_swept = Some(vehicle_count);
            line
        }
        ActivityEvent::SweepCompleted {
            vehicles_swept,
            alerts_raised,
            duration_ms,
        } => {
            let mut line = LogLine::new(EventKind::SweepComplete, "info");
            line.vehicles_swept = Some(vehicles_swept);
            line.alerts_raised = Some(alerts_raised);
            line.duration_ms = Some(duration_ms);
            line
        }
        ActivityEvent::VehicleAnalyzed {
            vehicle_id,
            gap_hours,
            avg_confidence,
            drafts,
        } => {
            let mut line = LogLine::new(EventKind::VehicleAnalyzed, "info");
            line.vehicle_id = Some(vehicle_id);
            line.gap_hours = Some(gap_hours);
            line.avg_confidence = Some(avg_confidence);
            line.alerts_raised = Some(drafts);
            line
        }
        ActivityEvent::VehicleSkipped { vehicle_id, reason } => {
            let mut line = LogLine::new(EventKind::VehicleSkipped, "warning");
            line.vehicle_id = Some(vehicle_id);
            line.details = Some(reason);
            line
        }
        ActivityEvent::AlertRaised {
            vehicle_id,
            alert_id,
            alert_type,
            severity,
        } => {
            let mut line = LogLine::new(EventKind::AlertRaised, &severity);
            line.vehicle_id = Some(vehicle_id);
            line.alert_id = Some(alert_id);
            line.alert_type = Some(alert_type);
            line
        }
        ActivityEvent::AlertTransitioned {
            alert_id,
            status,
            actor,
        } => {
            let mut line = LogLine::new(EventKind::AlertTransitioned, "info");
            line.alert_id = Some(alert_id);
            line.status = Some(status);
            line.details = Some(format!("by {actor}"));
            line
        }
        ActivityEvent::GapCertified {
            alert_id,
            vehicle_id,
            content_hash,
        } => {
            let mut line = LogLine::new(EventKind::GapCertified, "info");
            line.alert_id = Some(alert_id);
            line.vehicle_id = Some(vehicle_id);
            line.details = Some(format!("content hash {content_hash}"));
            line
        }
        ActivityEvent::ConfigReloaded { old_hash, new_hash } => {
            let mut line = LogLine::new(EventKind::ConfigReload, "info");
            line.details = Some(format!("{old_hash} -> {new_hash}"));
            line
        }
        ActivityEvent::Error { code, message } => {
            let mut line = LogLine::new(EventKind::Error, "warning");
            line.error_code = Some(code);
            line.details = Some(message);
            line
        }
        ActivityEvent::Shutdown => LogLine::new(EventKind::DaemonStop, "info"),
    }
}
