//! JSONL activity log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written with a single `write_all` so another process tailing the file
//! never sees an interleaved partial line.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. stderr with `[FGM-JSONL]` prefix
//! 3. Silent discard (the daemon must never crash over logging failures)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FgmError, Result};
use crate::core::time::format_rfc3339;

/// Log event kinds in the monitoring activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DaemonStart,
    DaemonStop,
    SweepStart,
    SweepComplete,
    VehicleAnalyzed,
    VehicleSkipped,
    AlertRaised,
    AlertTransitioned,
    GapCertified,
    ConfigReload,
    Error,
}

/// One JSONL line. Only `ts`, `event`, and `level` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub event: EventKind,
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicles_swept: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts_raised: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogLine {
    /// New line stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventKind, level: &str) -> Self {
        Self {
            ts: format_rfc3339(chrono::Utc::now()),
            event,
            level: level.to_string(),
            vehicle_id: None,
            alert_id: None,
            alert_type: None,
            status: None,
            gap_hours: None,
            avg_confidence: None,
            vehicles_swept: None,
            alerts_raised: None,
            duration_ms: None,
            error_code: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Writer options.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Maximum file size before rotation (bytes).
    pub max_size_bytes: u64,
    /// Number of rotated files kept.
    pub max_rotated_files: u32,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("activity.jsonl"),
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 5,
        }
    }
}

/// Append-only JSONL writer with rotation and graceful degradation.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log file, degrading to stderr if the path is unusable.
    #[must_use]
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        w.try_open_primary();
        w
    }

    /// Write one entry as one atomic JSONL line.
    pub fn write_line(&mut self, line: &LogLine) {
        let raw = match serde_json::to_string(line) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[FGM-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_raw(&raw);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    // ──────────────────── internals ────────────────────

    fn write_raw(&mut self, raw: &str) {
        if self.state == WriterState::Normal
            && self.bytes_written + raw.len() as u64 > self.config.max_size_bytes
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(raw.as_bytes()).is_err() {
                        self.degrade();
                        self.write_raw(raw);
                        return;
                    }
                    self.bytes_written += raw.len() as u64;
                } else {
                    self.degrade();
                    self.write_raw(raw);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[FGM-JSONL] {raw}");
            }
            WriterState::Discard => {}
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.state = WriterState::Normal;
                self.bytes_written = size;
            }
            Err(_) => {
                self.state = WriterState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[FGM-JSONL] log path {} unusable, using stderr",
                    self.config.path.display()
                );
            }
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Normal => WriterState::Stderr,
            _ => WriterState::Discard,
        };
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        // Shift rotations: .4 -> .5, ..., current -> .1; drop the oldest.
        let base = self.config.path.clone();
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        let _ = rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

/// Drop rotated files older than the retention window. The live file is
/// never touched; the scheduler calls this once per sweep.
pub fn prune_rotated(config: &JsonlConfig, retention_days: u32) -> usize {
    let cutoff = std::time::SystemTime::now()
        - std::time::Duration::from_secs(u64::from(retention_days) * 86_400);
    let mut pruned = 0;
    for i in 1..=config.max_rotated_files {
        let path = rotated_name(&config.path, i);
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        if meta.modified().is_ok_and(|m| m < cutoff) && fs::remove_file(&path).is_ok() {
            pruned += 1;
        }
    }
    pruned
}

fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| FgmError::io(parent, source))?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| FgmError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `activity.jsonl` -> `activity.jsonl.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}
