/// In-memory operations backend for exercising the orchestrator without root or an NFS server
use crate::config::types::{ParamountError, Result};
use crate::exec::{MountOps, MountOutcome, MountRequest};
use crate::kernel::mount::{parse_mount_table, LiveMountRecord};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Host mounts every fake table starts with
const BASE_TABLE: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda1 / ext4 rw,relatime 0 0
tmpfs /tmp tmpfs rw,nosuid,nodev 0 0
";

/// Exit status real `mount` uses for a failed mount
const MOUNT_FAILURE: i32 = 32;

#[derive(Debug, Default)]
struct FakeState {
    live: Vec<LiveMountRecord>,
    mount_calls: Vec<(usize, Instant)>,
    reloads: usize,
    unmounts: usize,
}

/// Records every call; successful mounts appear in the fake live table until
/// `unmount_all` clears them
#[derive(Debug, Default)]
pub struct FakeOps {
    state: Mutex<FakeState>,
    failing: HashSet<usize>,
    mount_delay: Duration,
    fail_reload: bool,
}

impl FakeOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount calls for these slot indices exit non-zero
    pub fn failing(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(indices);
        self
    }

    /// Each mount takes this long (bounded by the caller's timeout)
    pub fn with_mount_delay(mut self, delay: Duration) -> Self {
        self.mount_delay = delay;
        self
    }

    /// Every export reload fails
    pub fn failing_reload(mut self) -> Self {
        self.fail_reload = true;
        self
    }

    /// Pre-existing live mount (e.g. a stale mount from an earlier run)
    pub fn with_live_record(self, record: LiveMountRecord) -> Self {
        self.inject_live_record(record);
        self
    }

    /// Add a live mount after construction
    pub fn inject_live_record(&self, record: LiveMountRecord) {
        self.lock().live.push(record);
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `(slot index, start instant)` of every mount call, in call order
    pub fn mount_calls(&self) -> Vec<(usize, Instant)> {
        self.lock().mount_calls.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.lock().reloads
    }

    pub fn unmount_count(&self) -> usize {
        self.lock().unmounts
    }

    /// Mounts currently in the fake table, excluding the base host mounts
    pub fn live_records(&self) -> Vec<LiveMountRecord> {
        self.lock().live.clone()
    }
}

impl MountOps for FakeOps {
    fn backend_name(&self) -> &str {
        "fake"
    }

    fn export_reload(&self) -> Result<()> {
        self.lock().reloads += 1;
        if self.fail_reload {
            return Err(ParamountError::ExportReload("injected failure".to_string()));
        }
        Ok(())
    }

    fn mount(&self, request: &MountRequest, timeout: Duration) -> MountOutcome {
        self.lock().mount_calls.push((request.index, Instant::now()));

        if !self.mount_delay.is_zero() {
            thread::sleep(self.mount_delay.min(timeout));
            if self.mount_delay > timeout {
                return MountOutcome::TimedOut;
            }
        }

        if self.failing.contains(&request.index) {
            return MountOutcome::ExitStatus(Some(MOUNT_FAILURE));
        }

        self.lock().live.push(LiveMountRecord {
            source: request.source(),
            target: request.client_dir.display().to_string(),
            fstype: "nfs".to_string(),
            options: request.option_string(),
        });
        MountOutcome::Mounted
    }

    fn unmount_all(&self, fstypes: &[&str], _lazy: bool) -> Result<()> {
        let mut state = self.lock();
        state.unmounts += 1;
        state.live.retain(|r| !fstypes.contains(&r.fstype.as_str()));
        Ok(())
    }

    fn read_live_mounts(&self) -> Result<Vec<LiveMountRecord>> {
        let mut records = parse_mount_table(BASE_TABLE);
        records.extend(self.lock().live.iter().cloned());
        Ok(records)
    }
}
