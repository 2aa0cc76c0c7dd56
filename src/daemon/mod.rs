//! Long-running monitoring daemon: sweep scheduler and signal handling.

pub mod loop_main;
pub mod signals;

pub use loop_main::{DaemonDeps, MonitoringDaemon, SweepStats};
pub use signals::SignalHandler;
