//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use fleet_gap_monitor::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{FgmError, Result};

// Engine
pub use crate::engine::analyzer::{AnalyzerSources, GapAnalyzer, VehicleAnalysis};
pub use crate::engine::detector::{AnalysisWindow, GapDetector};
pub use crate::engine::profile::UsageProfile;
pub use crate::engine::scorer::{ConfidenceScorer, GapAnalysis, GapFactors};
pub use crate::engine::thresholds::{AlertDraft, ThresholdEvaluator, VehicleGapMetrics};

// Alerts
pub use crate::alerts::certification::GapCertification;
pub use crate::alerts::lifecycle::AlertLifecycle;
pub use crate::alerts::model::{AlertStatus, AlertType, AuditEntry, GapAlert, Severity};
pub use crate::alerts::repo::{AlertFilter, AlertRepository, CreateOutcome, MemoryAlertRepository};
#[cfg(feature = "sqlite")]
pub use crate::alerts::store::SqliteAlertStore;

// Sources
pub use crate::sources::memory::MemoryFleet;
pub use crate::sources::{
    ArtifactRegistry, FailureEvent, FailureLogSource, FailureReason, ProfiledSession,
    ProfiledSessionSource, ReportCorrelator, ReportPeriod, TelemetrySource, VehicleRegistry,
};

// Daemon
#[cfg(feature = "daemon")]
pub use crate::daemon::loop_main::{DaemonDeps, MonitoringDaemon, SweepStats};
#[cfg(feature = "daemon")]
pub use crate::daemon::signals::SignalHandler;

// Logging
pub use crate::logger::events::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
