#![forbid(unsafe_code)]

//! Fleet Gap Monitor (fgm) — gap certification and monitoring engine for
//! connected-vehicle fleets.
//!
//! Three concerns, layered:
//! 1. **Gap engine** — hour-bucketed gap detection, five-signal confidence
//!    scoring, profiled-session overlay, and threshold evaluation
//! 2. **Alert lifecycle** — deduplicated alerts with a strict state machine
//!    and an append-only audit trail, backed by SQLite
//! 3. **Monitoring daemon** — periodic fleet sweeps with graceful shutdown,
//!    hot config reload, and JSONL activity logging
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use fleet_gap_monitor::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use fleet_gap_monitor::core::config::Config;
//! use fleet_gap_monitor::engine::analyzer::GapAnalyzer;
//! ```

pub mod prelude;

pub mod alerts;
#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
#[cfg(feature = "daemon")]
pub mod daemon;
pub mod engine;
pub mod logger;
pub mod sources;
