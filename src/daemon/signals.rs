//! Signal handling: SIGTERM/SIGINT graceful shutdown, SIGHUP config reload,
//! SIGUSR1 immediate fleet sweep.
//!
//! Uses `signal-hook` flag registration; the monitoring loop polls the flags
//! between sweeps and between vehicles rather than blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Signal state shared between OS signal hooks and the monitoring loop.
///
/// All flags use `Ordering::Relaxed`; the loop polls them and needs no
/// ordering with other atomics.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    reload_flag: Arc<AtomicBool>,
    sweep_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create the handler and register OS hooks. Registration is
    /// best-effort; a failure is reported on stderr but not fatal.
    #[must_use]
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    /// Handler without OS hooks, for tests driving the flags directly.
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            reload_flag: Arc::new(AtomicBool::new(false)),
            sweep_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check and clear the reload request.
    pub fn should_reload(&self) -> bool {
        self.reload_flag.swap(false, Ordering::Relaxed)
    }

    /// Check and clear the forced-sweep request.
    pub fn should_sweep(&self) -> bool {
        self.sweep_flag.swap(false, Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_reload(&self) {
        self.reload_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_sweep(&self) {
        self.sweep_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[FGM-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[FGM-SIGNAL] failed to register SIGINT: {e}");
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGHUP, SIGUSR1};
            if let Err(e) = signal_hook::flag::register(SIGHUP, Arc::clone(&self.reload_flag)) {
                eprintln!("[FGM-SIGNAL] failed to register SIGHUP: {e}");
            }
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.sweep_flag)) {
                eprintln!("[FGM-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_start_clear() {
        let handler = SignalHandler::unregistered();
        assert!(!handler.should_shutdown());
        assert!(!handler.should_reload());
        assert!(!handler.should_sweep());
    }

    #[test]
    fn reload_and_sweep_are_one_shot() {
        let handler = SignalHandler::unregistered();
        handler.request_reload();
        handler.request_sweep();
        assert!(handler.should_reload());
        assert!(!handler.should_reload(), "reading clears the flag");
        assert!(handler.should_sweep());
        assert!(!handler.should_sweep());
    }

    #[test]
    fn shutdown_is_sticky() {
        let handler = SignalHandler::unregistered();
        handler.request_shutdown();
        assert!(handler.should_shutdown());
        assert!(handler.should_shutdown(), "shutdown never clears");
    }

    #[test]
    fn clones_share_state() {
        let handler = SignalHandler::unregistered();
        let clone = handler.clone();
        clone.request_shutdown();
        assert!(handler.should_shutdown());
    }
}
