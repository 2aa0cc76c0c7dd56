//! The monitoring daemon: periodic fleet sweeps with graceful shutdown and
//! hot config reload.
//!
//! One sweep walks every registered vehicle sequentially, analyzes it, and
//! reconciles the resulting drafts into the alert repository. A failure on
//! one vehicle is logged and skipped; it never aborts the sweep. Shutdown is
//! checked between vehicles and between sweeps, so SIGTERM lands within one
//! vehicle's worth of work.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::alerts::lifecycle::AlertLifecycle;
use crate::alerts::model::Severity;
use crate::alerts::repo::{AlertRepository, CreateOutcome};
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::daemon::signals::SignalHandler;
use crate::engine::analyzer::{AnalyzerSources, GapAnalyzer};
use crate::logger::events::{ActivityEvent, ActivityLoggerHandle};
use crate::logger::jsonl::{self, JsonlConfig};
use crate::sources::VehicleRegistry;

/// Poll granularity for the inter-sweep wait.
const WAIT_STEP: Duration = Duration::from_millis(250);

/// Everything a sweep touches, borrowed for the daemon's lifetime.
pub struct DaemonDeps<'a> {
    pub sources: AnalyzerSources<'a>,
    pub registry: &'a dyn VehicleRegistry,
    pub repo: &'a dyn AlertRepository,
}

/// Outcome counters for one fleet sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub vehicles_swept: usize,
    pub vehicles_skipped: usize,
    pub alerts_raised: usize,
}

pub struct MonitoringDaemon {
    config: Config,
    config_hash: String,
    analyzer: GapAnalyzer,
    signals: SignalHandler,
    logger: ActivityLoggerHandle,
}

impl MonitoringDaemon {
    pub fn new(
        config: Config,
        signals: SignalHandler,
        logger: ActivityLoggerHandle,
    ) -> Result<Self> {
        let config_hash = config.stable_hash()?;
        let analyzer = GapAnalyzer::from_config(&config);
        Ok(Self {
            config,
            config_hash,
            analyzer,
            signals,
            logger,
        })
    }

    /// Run until shutdown is requested.
    ///
    /// Startup delay first, then a sweep every `sweep_interval_secs`.
    /// SIGHUP reloads config between sweeps; SIGUSR1 forces a sweep now.
    pub fn run(&mut self, deps: &DaemonDeps<'_>) -> Result<()> {
        let started = Instant::now();
        self.logger.send(ActivityEvent::DaemonStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: self.config_hash.clone(),
        });

        self.wait(Duration::from_secs(self.config.scheduler.startup_delay_secs));

        while !self.signals.should_shutdown() {
            if self.signals.should_reload() {
                self.reload_config();
            }

            self.run_sweep(deps);
            jsonl::prune_rotated(
                &self.jsonl_config(),
                self.config.scheduler.log_retention_days,
            );

            self.wait(Duration::from_secs(self.config.scheduler.sweep_interval_secs));
        }

        self.logger.send(ActivityEvent::DaemonStopped {
            reason: "signal".to_string(),
            uptime_secs: started.elapsed().as_secs(),
        });
        self.logger.shutdown();
        Ok(())
    }

    /// One full fleet sweep. Public so the CLI can trigger it directly.
    pub fn run_sweep(&self, deps: &DaemonDeps<'_>) -> SweepStats {
        let sweep_started = Instant::now();
        let lifecycle = AlertLifecycle::new(deps.repo);
        let mut stats = SweepStats::default();

        let vehicles = match deps.registry.list_active_vehicles() {
            Ok(vehicles) => vehicles,
            Err(e) => {
                self.logger.send(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: format!("vehicle registry unavailable: {e}"),
                });
                return stats;
            }
        };
        self.logger.send(ActivityEvent::SweepStarted {
            vehicle_count: vehicles.len(),
        });

        for vehicle_id in &vehicles {
            if self.signals.should_shutdown() {
                break;
            }
            match self.sweep_vehicle(deps, &lifecycle, vehicle_id) {
                Ok(Some(raised)) => {
                    stats.vehicles_swept += 1;
                    stats.alerts_raised += raised;
                }
                Ok(None) => {
                    stats.vehicles_skipped += 1;
                    self.logger.send(ActivityEvent::VehicleSkipped {
                        vehicle_id: vehicle_id.clone(),
                        reason: "no telemetry in window".to_string(),
                    });
                }
                Err(e) => {
                    stats.vehicles_skipped += 1;
                    self.logger.send(ActivityEvent::Error {
                        code: e.code().to_string(),
                        message: format!("analysis failed for {vehicle_id}: {e}"),
                    });
                }
            }
            if self.config.scheduler.per_vehicle_pause_ms > 0 {
                std::thread::sleep(Duration::from_millis(
                    self.config.scheduler.per_vehicle_pause_ms,
                ));
            }
        }

        self.logger.send(ActivityEvent::SweepCompleted {
            vehicles_swept: stats.vehicles_swept,
            alerts_raised: stats.alerts_raised,
            duration_ms: u64::try_from(sweep_started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        stats
    }

    /// Analyze one vehicle and reconcile its drafts. Returns the number of
    /// alerts newly raised, or `None` for a no-data vehicle.
    fn sweep_vehicle(
        &self,
        deps: &DaemonDeps<'_>,
        lifecycle: &AlertLifecycle<'_>,
        vehicle_id: &str,
    ) -> Result<Option<usize>> {
        let now = Utc::now();
        let Some(analysis) = self
            .analyzer
            .analyze_vehicle(&deps.sources, vehicle_id, now)?
        else {
            return Ok(None);
        };

        self.logger.send(ActivityEvent::VehicleAnalyzed {
            vehicle_id: vehicle_id.to_string(),
            gap_hours: analysis.metrics.gap_hours,
            avg_confidence: analysis.metrics.avg_confidence,
            drafts: analysis.drafts.len(),
        });

        let mut raised = 0;
        let outcomes = lifecycle.raise_from_analysis(&analysis, now)?;
        for (outcome, draft) in outcomes.iter().zip(&analysis.drafts) {
            let CreateOutcome::Created(alert) = outcome else {
                continue;
            };
            raised += 1;
            self.logger.send(ActivityEvent::AlertRaised {
                vehicle_id: vehicle_id.to_string(),
                alert_id: alert.id,
                alert_type: alert.alert_type.as_str().to_string(),
                severity: alert.severity.as_str().to_string(),
            });
            // Critical alerts go straight to human review.
            if draft.severity == Severity::Critical {
                let escalated = lifecycle.auto_escalate(alert.id, now)?;
                self.logger.send(ActivityEvent::AlertTransitioned {
                    alert_id: escalated.id,
                    status: escalated.status.as_str().to_string(),
                    actor: "system".to_string(),
                });
            }
        }
        Ok(Some(raised))
    }

    fn reload_config(&mut self) {
        let path = self.config.paths.config_file.clone();
        match Config::load(Some(&path)) {
            Ok(fresh) => match fresh.stable_hash() {
                Ok(hash) if hash != self.config_hash => {
                    let old_hash = std::mem::replace(&mut self.config_hash, hash.clone());
                    self.analyzer = GapAnalyzer::from_config(&fresh);
                    self.config = fresh;
                    self.logger.send(ActivityEvent::ConfigReloaded {
                        old_hash,
                        new_hash: hash,
                    });
                }
                Ok(_) => {} // unchanged
                Err(e) => self.logger.send(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: format!("config hash failed: {e}"),
                }),
            },
            Err(e) => {
                // Invalid new config: keep running on the old one.
                self.logger.send(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: format!("config reload rejected: {e}"),
                });
            }
        }
    }

    /// Sleep in short steps so shutdown and forced-sweep signals land fast.
    fn wait(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while Instant::now() < deadline {
            if self.signals.should_shutdown() || self.signals.should_sweep() {
                return;
            }
            std::thread::sleep(WAIT_STEP.min(deadline - Instant::now()));
        }
    }

    fn jsonl_config(&self) -> JsonlConfig {
        JsonlConfig {
            path: self.config.paths.jsonl_log.clone(),
            ..JsonlConfig::default()
        }
    }
}
