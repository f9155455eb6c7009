//! Synchronous shutdown-signal handling
//!
//! Shutdown signals are blocked process-wide and consumed by one watcher thread,
//! so teardown runs as ordinary code rather than inside an async signal handler.

use log::{debug, error, info};
use nix::sys::signal::{self, SigSet, SigmaskHow, Signal};
use std::thread::{self, JoinHandle};

use crate::config::types::{ParamountError, Result};

/// Signals that trigger teardown
pub const SHUTDOWN_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

pub fn shutdown_mask() -> SigSet {
    let mut mask = SigSet::empty();
    for sig in SHUTDOWN_SIGNALS {
        mask.add(sig);
    }
    mask
}

/// Exit status conventionally used after termination by `sig`
pub fn exit_status_for(sig: Signal) -> i32 {
    128 + sig as i32
}

/// Blocks the shutdown signals on the calling thread; threads spawned while the
/// guard lives inherit the mask. Unblocks on drop.
pub struct SignalBlockGuard {
    _marker: (),
}

impl SignalBlockGuard {
    pub fn block() -> Result<Self> {
        signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&shutdown_mask()), None)
            .map_err(|e| ParamountError::Signal(format!("Failed to block signals: {}", e)))?;

        Ok(Self { _marker: () })
    }
}

impl Drop for SignalBlockGuard {
    fn drop(&mut self) {
        let _ = signal::pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&shutdown_mask()), None);
    }
}

/// Spawn the watcher thread. `on_signal` runs once, on the watcher thread, for the
/// first shutdown signal delivered to the process.
///
/// Must be called while a [`SignalBlockGuard`] is held, before any worker threads exist.
pub fn spawn_watcher<F>(on_signal: F) -> Result<JoinHandle<()>>
where
    F: FnOnce(Signal) + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || match shutdown_mask().wait() {
            Ok(sig) => {
                debug!("Watcher got {}", sig);
                on_signal(sig);
            }
            Err(e) => error!("Waiting for shutdown signals failed: {}", e),
        })
        .map_err(|e| ParamountError::Signal(format!("Failed to spawn signal watcher: {}", e)))?;

    info!("Signal watcher installed (SIGINT, SIGTERM, SIGHUP)");
    Ok(handle)
}
