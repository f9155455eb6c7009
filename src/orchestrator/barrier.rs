//! Single-use start barrier.
//!
//! Unlike `std::sync::Barrier` a party can give up: a timeout or an explicit
//! [`StartBarrier::abandon`] breaks the barrier and wakes everyone with an error,
//! so a mounter that never arrives cannot hang the coordinator.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierError {
    #[error("barrier broken before quorum was reached")]
    Broken,
    #[error("timed out waiting for quorum")]
    TimedOut,
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    released_at: Option<Instant>,
    broken: bool,
}

#[derive(Debug)]
pub struct StartBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl StartBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arrive and block until all parties have arrived, the barrier breaks, or
    /// `timeout` passes. A timeout breaks the barrier for everyone.
    pub fn wait(&self, timeout: Duration) -> Result<(), BarrierError> {
        let mut state = self.lock();
        if state.broken {
            return Err(BarrierError::Broken);
        }
        if state.released_at.is_some() {
            return Ok(());
        }

        state.arrived += 1;
        if state.arrived >= self.parties {
            state.released_at = Some(Instant::now());
            self.cvar.notify_all();
            return Ok(());
        }

        let deadline = Instant::now() + timeout;
        loop {
            if state.released_at.is_some() {
                return Ok(());
            }
            if state.broken {
                return Err(BarrierError::Broken);
            }

            let now = Instant::now();
            if now >= deadline {
                state.broken = true;
                self.cvar.notify_all();
                return Err(BarrierError::TimedOut);
            }

            state = self
                .cvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Break the barrier unless it already released
    pub fn abandon(&self) {
        let mut state = self.lock();
        if state.released_at.is_none() {
            state.broken = true;
            self.cvar.notify_all();
        }
    }

    /// Instant the last party arrived
    pub fn released_at(&self) -> Option<Instant> {
        self.lock().released_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_releases_all_parties_together() {
        let barrier = Arc::new(StartBarrier::new(5));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait(Duration::from_secs(10)).unwrap();
                    Instant::now()
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert!(barrier.released_at().is_none());
        barrier.wait(Duration::from_secs(10)).unwrap();

        let released = barrier.released_at().unwrap();
        for handle in handles {
            assert!(handle.join().unwrap() >= released);
        }
    }

    #[test]
    fn test_timeout_breaks_barrier() {
        let barrier = Arc::new(StartBarrier::new(3));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait(Duration::from_secs(10)))
        };

        let result = barrier.wait(Duration::from_millis(50));
        assert_eq!(result, Err(BarrierError::TimedOut));
        assert_eq!(waiter.join().unwrap(), Err(BarrierError::Broken));
        assert_eq!(barrier.wait(Duration::from_secs(1)), Err(BarrierError::Broken));
    }

    #[test]
    fn test_abandon_wakes_waiters() {
        let barrier = Arc::new(StartBarrier::new(3));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait(Duration::from_secs(10)))
        };

        thread::sleep(Duration::from_millis(20));
        barrier.abandon();
        assert_eq!(waiter.join().unwrap(), Err(BarrierError::Broken));
        assert!(barrier.released_at().is_none());
    }

    #[test]
    fn test_abandon_after_release_is_noop() {
        let barrier = StartBarrier::new(1);
        barrier.wait(Duration::from_secs(1)).unwrap();
        barrier.abandon();
        assert!(barrier.released_at().is_some());
        assert!(barrier.wait(Duration::from_secs(1)).is_ok());
    }
}
