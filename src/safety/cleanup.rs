/// Teardown controller shared by the normal exit path and the signal watcher
/// Steps run in a fixed order and every step is attempted even if an earlier one fails:
/// unmount all NFS mounts, remove the export table, re-export, remove the workspace.
/// Provisioning is stopped first: the gate is closed and admitted work drained.
use crate::config::types::{Result, DEFAULT_MOUNT_TIMEOUT, SETTLE_SLACK, TRACKED_FSTYPES};
use crate::exec::MountOps;
use crate::exports::ExportTableWriter;
use crate::safety::gate::ProvisionGate;
use crate::safety::workspace::ScopedWorkspace;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const ARMED: u8 = 0;
const EXECUTING: u8 = 1;
const DISARMED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupState {
    Armed,
    Executing,
    Disarmed,
}

/// What a cleanup call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// False when cleanup had already run
    pub executed: bool,
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn log(&self) {
        if !self.executed {
            debug!("Cleanup already performed");
        } else if self.errors.is_empty() {
            info!("Cleanup complete");
        } else {
            for e in &self.errors {
                warn!("Cleanup step failed: {}", e);
            }
        }
    }
}

pub struct CleanupController {
    ops: Arc<dyn MountOps>,
    exports: ExportTableWriter,
    workspace: ScopedWorkspace,
    gate: Arc<ProvisionGate>,
    drain_timeout: Duration,
    state: AtomicU8,
    // Serializes callers: a signal during normal cleanup waits, then no-ops.
    serial: Mutex<()>,
}

impl CleanupController {
    /// Armed from construction; create it as soon as the workspace and export
    /// path exist so even layout failures are torn down
    pub fn new(ops: Arc<dyn MountOps>, exports: ExportTableWriter, workspace: ScopedWorkspace) -> Self {
        Self {
            ops,
            exports,
            workspace,
            gate: Arc::new(ProvisionGate::new()),
            drain_timeout: DEFAULT_MOUNT_TIMEOUT + SETTLE_SLACK,
            state: AtomicU8::new(ARMED),
            serial: Mutex::new(()),
        }
    }

    /// How long teardown waits for admitted provisioning work (in-flight mounts)
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn state(&self) -> CleanupState {
        match self.state.load(Ordering::SeqCst) {
            ARMED => CleanupState::Armed,
            EXECUTING => CleanupState::Executing,
            _ => CleanupState::Disarmed,
        }
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn exports(&self) -> &ExportTableWriter {
        &self.exports
    }

    /// Admission gate provisioning must pass through
    pub fn gate(&self) -> &Arc<ProvisionGate> {
        &self.gate
    }

    /// Run the teardown once. Later calls, from any thread, return without
    /// touching the host.
    pub fn run(&self) -> CleanupReport {
        let _serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);

        if self
            .state
            .compare_exchange(ARMED, EXECUTING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return CleanupReport::default();
        }

        info!("cleanup");
        let mut errors = Vec::new();
        let outstanding = self.gate.close_and_drain(self.drain_timeout);
        if outstanding > 0 {
            warn!("{} provisioning operations still running at teardown", outstanding);
            errors.push(format!(
                "drain: {} provisioning operations still running after {:?}",
                outstanding, self.drain_timeout
            ));
        }
        errors.extend(self.teardown());
        self.state.store(DISARMED, Ordering::SeqCst);

        CleanupReport {
            executed: true,
            errors,
        }
    }

    // Each step is idempotent on its own, so repeating the sequence is harmless.
    fn teardown(&self) -> Vec<String> {
        let mut errors = Vec::new();

        info!("unmount all NFS mounts");
        record(&mut errors, "unmount", self.ops.unmount_all(TRACKED_FSTYPES, true));

        info!("remove export file {}", self.exports.path().display());
        record(&mut errors, "remove export file", self.exports.remove());

        info!("run exportfs");
        record(&mut errors, "exportfs", self.ops.export_reload());

        info!("remove temp dir {}", self.workspace.path().display());
        record(&mut errors, "remove temp dir", self.workspace.delete_now());

        errors
    }
}

fn record(errors: &mut Vec<String>, step: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("{} failed: {}", step, e);
        errors.push(format!("{}: {}", step, e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::RUN_TAG;
    use crate::kernel::mount::LiveMountRecord;
    use crate::testing::FakeOps;
    use std::fs;
    use std::thread;

    fn controller(fake: Arc<FakeOps>, preserve: bool) -> CleanupController {
        let workspace = ScopedWorkspace::new("paramount_test", preserve).unwrap();
        let exports = ExportTableWriter::new(workspace.path().join("paramount.exports"), RUN_TAG);
        let ops: Arc<dyn MountOps> = fake;
        CleanupController::new(ops, exports, workspace)
    }

    #[test]
    fn test_runs_all_steps_once() {
        let fake = Arc::new(FakeOps::new());
        let controller = controller(Arc::clone(&fake), false);
        fs::write(controller.exports().path(), "### BEGIN paramount\n").unwrap();
        assert_eq!(controller.state(), CleanupState::Armed);

        let first = controller.run();
        assert!(first.executed);
        assert!(first.is_clean());
        assert_eq!(controller.state(), CleanupState::Disarmed);
        assert!(!controller.workspace_path().exists());
        assert_eq!(fake.unmount_count(), 1);
        assert_eq!(fake.reload_count(), 1);

        let second = controller.run();
        assert!(!second.executed);
        assert_eq!(fake.unmount_count(), 1);
        assert_eq!(fake.reload_count(), 1);
    }

    #[test]
    fn test_teardown_sequence_is_idempotent() {
        let fake = Arc::new(FakeOps::new());
        let controller = controller(Arc::clone(&fake), false);

        assert!(controller.teardown().is_empty());
        assert!(controller.teardown().is_empty());
        assert!(!controller.workspace_path().exists());
    }

    #[test]
    fn test_later_steps_run_after_failure() {
        let fake = Arc::new(FakeOps::new().failing_reload());
        let controller = controller(Arc::clone(&fake), false);

        let report = controller.run();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("exportfs"));
        assert!(!controller.workspace_path().exists());
    }

    #[test]
    fn test_preserve_keeps_workspace() {
        let fake = Arc::new(FakeOps::new());
        let controller = controller(fake, true);
        let root = controller.workspace_path().to_path_buf();

        assert!(controller.run().is_clean());
        assert!(root.exists());
        crate::safety::safe_cleanup::remove_tree_secure(&root).unwrap();
    }

    #[test]
    fn test_teardown_waits_for_admitted_mount() {
        let fake = Arc::new(FakeOps::new());
        let controller = controller(Arc::clone(&fake), false);
        let (tx, rx) = crossbeam_channel::bounded(0);

        let straggler = {
            let gate = Arc::clone(controller.gate());
            let fake = Arc::clone(&fake);
            thread::spawn(move || {
                let _pass = gate.enter().unwrap();
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(100));
                fake.inject_live_record(LiveMountRecord {
                    source: "127.0.0.1:/ws/mount/d0000".to_string(),
                    target: "/ws/client/d0000".to_string(),
                    fstype: "nfs".to_string(),
                    options: "rw".to_string(),
                });
            })
        };
        rx.recv().unwrap();

        let report = controller.run();
        straggler.join().unwrap();
        assert!(report.is_clean());
        assert!(fake.live_records().is_empty());
        assert!(controller.gate().enter().is_none());
    }

    #[test]
    fn test_drain_timeout_is_reported() {
        let fake = Arc::new(FakeOps::new());
        let controller = controller(Arc::clone(&fake), false)
            .with_drain_timeout(Duration::from_millis(50));

        let pass = controller.gate().enter();
        let report = controller.run();
        drop(pass);

        assert!(report.executed);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("drain"));
        assert!(!controller.workspace_path().exists());
    }

    #[test]
    fn test_concurrent_callers_execute_once() {
        let fake = Arc::new(FakeOps::new());
        let controller = Arc::new(controller(Arc::clone(&fake), false));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let controller = Arc::clone(&controller);
                thread::spawn(move || controller.run().executed)
            })
            .collect();
        let executed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ran| *ran)
            .count();

        assert_eq!(executed, 1);
        assert_eq!(fake.unmount_count(), 1);
    }
}
