/// Mounter pool: one thread per slot, released together by the start barrier
use crate::config::types::{ParamountError, Result, SETTLE_SLACK};
use crate::exec::{MountAttempt, MountOps, MountOutcome, MountRequest};
use crate::orchestrator::barrier::StartBarrier;
use crate::safety::gate::ProvisionGate;
use crossbeam_channel::RecvTimeoutError;
use log::{debug, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Timeouts for the concurrent mount phase
#[derive(Debug, Clone, Copy)]
pub struct MountPhase {
    pub mount_timeout: Duration,
    pub barrier_timeout: Duration,
}

/// Aggregated results of the mount phase, indexed by slot
#[derive(Debug, Clone)]
pub struct MountReport {
    pub attempted: usize,
    pub failed: usize,
    pub attempts: Vec<MountAttempt>,
    /// When the start barrier released everyone
    pub released_at: Option<Instant>,
}

impl MountPhase {
    /// Longest a released mounter can take to report back
    pub fn settle_timeout(&self) -> Duration {
        self.mount_timeout + SETTLE_SLACK
    }
}

impl MountReport {
    fn from_attempts(attempts: Vec<MountAttempt>, released_at: Option<Instant>) -> Self {
        let failed = attempts.iter().filter(|a| !a.outcome.is_success()).count();
        Self {
            attempted: attempts.len(),
            failed,
            attempts,
            released_at,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed
    }
}

fn mount_one(
    ops: &dyn MountOps,
    request: &MountRequest,
    barrier: &StartBarrier,
    gate: &ProvisionGate,
    phase: MountPhase,
) -> MountAttempt {
    if let Err(e) = barrier.wait(phase.barrier_timeout) {
        warn!("mounter {} never started: {}", request.index, e);
        return MountAttempt {
            index: request.index,
            outcome: MountOutcome::BarrierFailed(e.to_string()),
            started_at: None,
        };
    }

    let _pass = match gate.enter() {
        Some(pass) => pass,
        None => {
            debug!("mounter {} released after teardown started", request.index);
            return MountAttempt {
                index: request.index,
                outcome: MountOutcome::Cancelled,
                started_at: None,
            };
        }
    };

    debug!(
        "mounter {} mdir {} mount on cdir {}",
        request.index,
        request.export_dir.display(),
        request.client_dir.display()
    );
    let started_at = Instant::now();
    let outcome = ops.mount(request, phase.mount_timeout);

    MountAttempt {
        index: request.index,
        outcome,
        started_at: Some(started_at),
    }
}

/// Launch one mounter per request, join the start barrier as the extra party, then
/// gather every outcome. Requests must be indexed `0..len` in order.
///
/// Individual mount failures are reported in the result, not returned as errors.
/// Errors mean the burst never happened: a mounter could not be launched, the
/// barrier did not reach quorum, or teardown started before release. Each mount
/// call holds a pass from `gate` so teardown can wait for it.
pub fn run_mounters(
    ops: Arc<dyn MountOps>,
    requests: Vec<MountRequest>,
    phase: MountPhase,
    gate: Arc<ProvisionGate>,
) -> Result<MountReport> {
    let count = requests.len();
    let barrier = Arc::new(StartBarrier::new(count + 1));
    let (tx, rx) = crossbeam_channel::unbounded::<MountAttempt>();

    for request in requests {
        let index = request.index;
        debug!("Start mounter {}", index);

        let ops = Arc::clone(&ops);
        let barrier_ref = Arc::clone(&barrier);
        let gate = Arc::clone(&gate);
        let tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("mounter-{:04}", index))
            .spawn(move || {
                let attempt = mount_one(ops.as_ref(), &request, &barrier_ref, &gate, phase);
                let _ = tx.send(attempt);
            });

        if let Err(e) = spawned {
            barrier.abandon();
            return Err(ParamountError::Barrier(format!(
                "Failed to launch mounter {}: {}",
                index, e
            )));
        }
    }
    drop(tx);

    if gate.is_closed() {
        barrier.abandon();
        return Err(ParamountError::Interrupted("mount burst".to_string()));
    }

    barrier
        .wait(phase.barrier_timeout)
        .map_err(|e| ParamountError::Barrier(format!("Mounters not released: {}", e)))?;

    let mut attempts: Vec<MountAttempt> = (0..count)
        .map(|index| MountAttempt {
            index,
            outcome: MountOutcome::Lost,
            started_at: None,
        })
        .collect();

    let deadline = Instant::now() + phase.settle_timeout();
    let mut received = 0;
    while received < count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(attempt) => {
                if let Some(slot) = attempts.get_mut(attempt.index) {
                    *slot = attempt;
                    received += 1;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("{} mounters did not report in time", count - received);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("{} mounters exited without reporting", count - received);
                break;
            }
        }
    }

    Ok(MountReport::from_attempts(attempts, barrier.released_at()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOps;
    use std::path::PathBuf;

    fn requests(n: usize) -> Vec<MountRequest> {
        (0..n)
            .map(|index| MountRequest {
                index,
                server: "127.0.0.1".to_string(),
                export_dir: PathBuf::from(format!("/ws/mount/d{:04}", index)),
                client_dir: PathBuf::from(format!("/ws/client/d{:04}", index)),
                nfs_version: 3,
                options: "rw".to_string(),
            })
            .collect()
    }

    fn open_gate() -> Arc<ProvisionGate> {
        Arc::new(ProvisionGate::new())
    }

    fn phase() -> MountPhase {
        MountPhase {
            mount_timeout: Duration::from_secs(10),
            barrier_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_every_request_attempted_once() {
        let fake = Arc::new(FakeOps::new());
        let ops: Arc<dyn MountOps> = fake.clone();
        let report = run_mounters(ops, requests(16), phase(), open_gate()).unwrap();

        assert_eq!(report.attempted, 16);
        assert_eq!(report.failed, 0);
        assert_eq!(fake.mount_calls().len(), 16);
        for (i, attempt) in report.attempts.iter().enumerate() {
            assert_eq!(attempt.index, i);
            assert!(attempt.outcome.is_success());
        }
    }

    #[test]
    fn test_failures_counted_not_fatal() {
        let fake = Arc::new(FakeOps::new().failing([2, 5, 7]));
        let ops: Arc<dyn MountOps> = fake.clone();
        let report = run_mounters(ops, requests(8), phase(), open_gate()).unwrap();

        assert_eq!(report.attempted, 8);
        assert_eq!(report.failed, 3);
        assert_eq!(report.succeeded(), 5);
        assert!(!report.attempts[5].outcome.is_success());
    }

    #[test]
    fn test_no_mount_before_release() {
        let fake = Arc::new(FakeOps::new().with_mount_delay(Duration::from_millis(20)));
        let ops: Arc<dyn MountOps> = fake.clone();
        let report = run_mounters(ops, requests(12), phase(), open_gate()).unwrap();

        let released = report.released_at.unwrap();
        let calls = fake.mount_calls();
        assert_eq!(calls.len(), 12);
        for (_, started) in &calls {
            assert!(*started >= released);
        }

        let first = calls.iter().map(|(_, t)| *t).min().unwrap();
        let last = calls.iter().map(|(_, t)| *t).max().unwrap();
        assert!(last.duration_since(first) < Duration::from_secs(2));
    }

    #[test]
    fn test_slow_mount_times_out() {
        let fake = Arc::new(FakeOps::new().with_mount_delay(Duration::from_secs(30)));
        let ops: Arc<dyn MountOps> = fake.clone();
        let phase = MountPhase {
            mount_timeout: Duration::from_millis(50),
            barrier_timeout: Duration::from_secs(10),
        };

        let start = Instant::now();
        let report = run_mounters(ops, requests(3), phase, open_gate()).unwrap();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(report.failed, 3);
        assert!(report
            .attempts
            .iter()
            .all(|a| a.outcome == MountOutcome::TimedOut));
    }

    #[test]
    fn test_closed_gate_stops_burst() {
        let fake = Arc::new(FakeOps::new());
        let ops: Arc<dyn MountOps> = fake.clone();
        let gate = open_gate();
        gate.close_and_drain(Duration::ZERO);

        let err = run_mounters(ops, requests(4), phase(), gate).unwrap_err();
        assert!(matches!(err, ParamountError::Interrupted(_)));
        assert!(fake.mount_calls().is_empty());
    }
}
