//! Shutdown gate between provisioning and teardown
//!
//! Every provisioning step and every mount call holds a [`GatePass`] while it
//! touches the host. Teardown closes the gate and drains the outstanding passes
//! before its first step, so nothing is created behind it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct GateState {
    closed: bool,
    in_flight: usize,
}

#[derive(Debug, Default)]
pub struct ProvisionGate {
    state: Mutex<GateState>,
    drained: Condvar,
}

impl ProvisionGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit one unit of provisioning work; `None` once teardown has begun
    pub fn enter(&self) -> Option<GatePass<'_>> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.in_flight += 1;
        Some(GatePass { gate: self })
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Refuse new work, then wait up to `timeout` for admitted work to finish.
    /// Returns the number of passes still outstanding.
    pub fn close_and_drain(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        state.closed = true;

        while state.in_flight > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self
                .drained
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.in_flight
    }

    fn leave(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.drained.notify_all();
        }
    }
}

/// Admission held for the duration of one provisioning operation
#[must_use = "work is only covered while the pass is held"]
pub struct GatePass<'a> {
    gate: &'a ProvisionGate,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}
