//! Configuration system: TOML file + env var overrides + smart defaults.
//!
//! Every weight, bonus, threshold, and window length the engine uses lives
//! here. The numeric defaults encode contractual judgment calls, so operators
//! are expected to override them per fleet; nothing in the engine hard-codes
//! them.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FgmError, Result};

/// Full fleet-gap-monitor configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub window: WindowConfig,
    pub confidence: ConfidenceConfig,
    pub thresholds: ThresholdConfig,
    pub scheduler: SchedulerConfig,
    pub paths: PathsConfig,
}

/// Analysis window lengths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WindowConfig {
    /// Billing/reporting period length in hours. The default analysis window
    /// is `max(first record, now - monthly_hours)` floored to the hour.
    pub monthly_hours: i64,
    /// Trailing lookback for the usage-profile learner, in hours.
    pub lookback_hours: i64,
}

/// Signal weights and bonus/malus magnitudes for the confidence scorer.
///
/// The five weights apply to normalized [0,1] signal scores and must sum to
/// 1.0. The bonus/malus terms are flat additions to the final 0–100
/// confidence, applied outside the weighted sum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub continuity_weight: f64,
    pub progression_weight: f64,
    pub pattern_weight: f64,
    pub run_length_weight: f64,
    pub reliability_weight: f64,
    /// Added when a documented technical fetch failure covers the gap hour.
    pub technical_bonus: f64,
    /// Added when the odometer advanced at least `km_threshold` across the gap.
    pub km_bonus: f64,
    /// Minimum odometer delta (km) for the distance bonus.
    pub km_threshold: f64,
    /// Subtracted when a profiled usage session covers the gap (floor 0).
    pub profiled_malus: f64,
    /// Added when no profiled session covers the gap (ceiling 100).
    pub clear_session_bonus: f64,
}

/// Fleet alerting thresholds evaluated per vehicle after each analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Average gap confidence below this raises a LOW_CONFIDENCE warning.
    pub min_avg_confidence: f64,
    /// Longest hour-adjacent gap run above this raises CONSECUTIVE_GAPS.
    pub max_consecutive_gap_hours: u32,
    /// Gap percentage of the window above this raises HIGH_GAP_PERCENTAGE.
    pub max_gap_percent: f64,
    /// Monthly downtime percentage above this raises MONTHLY_THRESHOLD.
    pub max_monthly_downtime_percent: f64,
}

/// Scheduler loop timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay before the first fleet sweep after daemon start.
    pub startup_delay_secs: u64,
    /// Fixed interval between full fleet sweeps.
    pub sweep_interval_secs: u64,
    /// Pause between vehicles within one sweep, to pace upstream queries.
    pub per_vehicle_pause_ms: u64,
    /// Activity-log retention for pruning.
    pub log_retention_days: u32,
}

/// Filesystem paths used by fgm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub sqlite_db: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            monthly_hours: 720,
            lookback_hours: 720,
        }
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            continuity_weight: 0.25,
            progression_weight: 0.15,
            pattern_weight: 0.20,
            run_length_weight: 0.25,
            reliability_weight: 0.15,
            technical_bonus: 15.0,
            km_bonus: 10.0,
            km_threshold: 5.0,
            profiled_malus: 30.0,
            clear_session_bonus: 5.0,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_avg_confidence: 60.0,
            max_consecutive_gap_hours: 6,
            max_gap_percent: 20.0,
            max_monthly_downtime_percent: 10.0,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            startup_delay_secs: 30,
            sweep_interval_secs: 3_600,
            per_vehicle_pause_ms: 0,
            log_retention_days: 90,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[FGM-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("fgm").join("config.toml");
        let data = home_dir.join(".local").join("share").join("fgm");
        Self {
            config_file: cfg,
            sqlite_db: data.join("alerts.sqlite3"),
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| FgmError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(FgmError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for reload-change detection.
    ///
    /// Uses FNV-1a for cross-process-stable hashing (no `DefaultHasher` whose
    /// seed may vary across Rust releases).
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // window
        set_env_i64("FGM_WINDOW_MONTHLY_HOURS", &mut self.window.monthly_hours)?;
        set_env_i64("FGM_WINDOW_LOOKBACK_HOURS", &mut self.window.lookback_hours)?;

        // confidence
        set_env_f64(
            "FGM_CONFIDENCE_CONTINUITY_WEIGHT",
            &mut self.confidence.continuity_weight,
        )?;
        set_env_f64(
            "FGM_CONFIDENCE_PROGRESSION_WEIGHT",
            &mut self.confidence.progression_weight,
        )?;
        set_env_f64(
            "FGM_CONFIDENCE_PATTERN_WEIGHT",
            &mut self.confidence.pattern_weight,
        )?;
        set_env_f64(
            "FGM_CONFIDENCE_RUN_LENGTH_WEIGHT",
            &mut self.confidence.run_length_weight,
        )?;
        set_env_f64(
            "FGM_CONFIDENCE_RELIABILITY_WEIGHT",
            &mut self.confidence.reliability_weight,
        )?;
        set_env_f64(
            "FGM_CONFIDENCE_TECHNICAL_BONUS",
            &mut self.confidence.technical_bonus,
        )?;
        set_env_f64("FGM_CONFIDENCE_KM_BONUS", &mut self.confidence.km_bonus)?;
        set_env_f64(
            "FGM_CONFIDENCE_KM_THRESHOLD",
            &mut self.confidence.km_threshold,
        )?;
        set_env_f64(
            "FGM_CONFIDENCE_PROFILED_MALUS",
            &mut self.confidence.profiled_malus,
        )?;
        set_env_f64(
            "FGM_CONFIDENCE_CLEAR_SESSION_BONUS",
            &mut self.confidence.clear_session_bonus,
        )?;

        // thresholds
        set_env_f64(
            "FGM_THRESHOLDS_MIN_AVG_CONFIDENCE",
            &mut self.thresholds.min_avg_confidence,
        )?;
        set_env_u32(
            "FGM_THRESHOLDS_MAX_CONSECUTIVE_GAP_HOURS",
            &mut self.thresholds.max_consecutive_gap_hours,
        )?;
        set_env_f64(
            "FGM_THRESHOLDS_MAX_GAP_PERCENT",
            &mut self.thresholds.max_gap_percent,
        )?;
        set_env_f64(
            "FGM_THRESHOLDS_MAX_MONTHLY_DOWNTIME_PERCENT",
            &mut self.thresholds.max_monthly_downtime_percent,
        )?;

        // scheduler
        set_env_u64(
            "FGM_SCHEDULER_STARTUP_DELAY_SECS",
            &mut self.scheduler.startup_delay_secs,
        )?;
        set_env_u64(
            "FGM_SCHEDULER_SWEEP_INTERVAL_SECS",
            &mut self.scheduler.sweep_interval_secs,
        )?;
        set_env_u64(
            "FGM_SCHEDULER_PER_VEHICLE_PAUSE_MS",
            &mut self.scheduler.per_vehicle_pause_ms,
        )?;
        set_env_u32(
            "FGM_SCHEDULER_LOG_RETENTION_DAYS",
            &mut self.scheduler.log_retention_days,
        )?;

        // paths
        if let Some(raw) = env_var("FGM_PATHS_SQLITE_DB") {
            self.paths.sqlite_db = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("FGM_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.monthly_hours <= 0 {
            return Err(FgmError::InvalidConfig {
                details: format!(
                    "window.monthly_hours must be > 0, got {}",
                    self.window.monthly_hours
                ),
            });
        }
        if self.window.lookback_hours <= 0 {
            return Err(FgmError::InvalidConfig {
                details: format!(
                    "window.lookback_hours must be > 0, got {}",
                    self.window.lookback_hours
                ),
            });
        }

        // Individual signal weights must be non-negative.
        for (name, val) in [
            ("continuity_weight", self.confidence.continuity_weight),
            ("progression_weight", self.confidence.progression_weight),
            ("pattern_weight", self.confidence.pattern_weight),
            ("run_length_weight", self.confidence.run_length_weight),
            ("reliability_weight", self.confidence.reliability_weight),
        ] {
            if val < 0.0 {
                return Err(FgmError::InvalidConfig {
                    details: format!("confidence.{name} must be >= 0.0, got {val}"),
                });
            }
        }

        let sum = self.confidence.continuity_weight
            + self.confidence.progression_weight
            + self.confidence.pattern_weight
            + self.confidence.run_length_weight
            + self.confidence.reliability_weight;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(FgmError::InvalidConfig {
                details: format!("confidence weights must sum to 1.0; got {sum:.6}"),
            });
        }

        for (name, val) in [
            ("technical_bonus", self.confidence.technical_bonus),
            ("km_bonus", self.confidence.km_bonus),
            ("km_threshold", self.confidence.km_threshold),
            ("profiled_malus", self.confidence.profiled_malus),
            ("clear_session_bonus", self.confidence.clear_session_bonus),
        ] {
            if val < 0.0 {
                return Err(FgmError::InvalidConfig {
                    details: format!("confidence.{name} must be >= 0.0, got {val}"),
                });
            }
        }

        if !(0.0..=100.0).contains(&self.thresholds.min_avg_confidence) {
            return Err(FgmError::InvalidConfig {
                details: format!(
                    "thresholds.min_avg_confidence must be in [0, 100], got {}",
                    self.thresholds.min_avg_confidence
                ),
            });
        }
        for (name, val) in [
            ("max_gap_percent", self.thresholds.max_gap_percent),
            (
                "max_monthly_downtime_percent",
                self.thresholds.max_monthly_downtime_percent,
            ),
        ] {
            if !(0.0..=100.0).contains(&val) {
                return Err(FgmError::InvalidConfig {
                    details: format!("thresholds.{name} must be in [0, 100], got {val}"),
                });
            }
        }

        if self.scheduler.sweep_interval_secs == 0 {
            return Err(FgmError::InvalidConfig {
                details: "scheduler.sweep_interval_secs must be > 0".to_string(),
            });
        }
        if self.scheduler.log_retention_days == 0 {
            return Err(FgmError::InvalidConfig {
                details: "scheduler.log_retention_days must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_f64(name: &str, slot: &mut f64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<f64>().map_err(|error| FgmError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_i64(name: &str, slot: &mut i64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<i64>().map_err(|error| FgmError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| FgmError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_u32(name: &str, slot: &mut u32) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u32>().map_err(|error| FgmError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, FgmError};
    use std::path::Path;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn confidence_weights_must_sum_to_one() {
        let mut cfg = Config::default();
        cfg.confidence.continuity_weight = 0.9;
        cfg.confidence.pattern_weight = 0.9;
        let err = cfg.validate().expect_err("expected invalid weights");
        match err {
            FgmError::InvalidConfig { details } => {
                assert!(details.contains("sum to 1.0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn negative_weight_rejected() {
        let mut cfg = Config::default();
        cfg.confidence.run_length_weight = -0.1;
        cfg.confidence.continuity_weight = 0.35;
        let err = cfg.validate().expect_err("expected negative weight error");
        assert!(err.to_string().contains("run_length_weight"));
    }

    #[test]
    fn negative_malus_rejected() {
        let mut cfg = Config::default();
        cfg.confidence.profiled_malus = -5.0;
        let err = cfg.validate().expect_err("expected malus error");
        assert!(err.to_string().contains("profiled_malus"));
    }

    #[test]
    fn min_avg_confidence_out_of_range_rejected() {
        let mut cfg = Config::default();
        cfg.thresholds.min_avg_confidence = 130.0;
        let err = cfg.validate().expect_err("expected range error");
        assert!(err.to_string().contains("min_avg_confidence"));
    }

    #[test]
    fn zero_monthly_hours_rejected() {
        let mut cfg = Config::default();
        cfg.window.monthly_hours = 0;
        let err = cfg.validate().expect_err("expected window error");
        assert!(err.to_string().contains("monthly_hours"));
    }

    #[test]
    fn zero_sweep_interval_rejected() {
        let mut cfg = Config::default();
        cfg.scheduler.sweep_interval_secs = 0;
        let err = cfg.validate().expect_err("expected scheduler error");
        assert!(err.to_string().contains("sweep_interval_secs"));
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let hash_before = cfg.stable_hash().expect("hash should compute");
        let mut modified = Config::default();
        modified.thresholds.max_consecutive_gap_hours += 1;
        let hash_after = modified.stable_hash().expect("hash should compute");
        assert_ne!(hash_before, hash_after);
    }

    #[test]
    fn stable_hash_deterministic() {
        let cfg = Config::default();
        let h1 = cfg.stable_hash().expect("hash");
        let h2 = cfg.stable_hash().expect("hash");
        assert_eq!(h1, h2);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/fgm/config.toml")));
        let err = result.expect_err("explicit missing path must fail");
        assert!(matches!(err, FgmError::MissingConfig { .. }));
    }

    #[test]
    fn toml_round_trip_preserves_defaults() {
        let cfg = Config::default();
        let raw = toml::to_string(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&raw).expect("parse");
        assert_eq!(cfg, parsed);
    }
}
