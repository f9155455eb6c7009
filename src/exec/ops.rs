//! Operations backend abstraction: the external commands the orchestrator drives.

use crate::config::types::Result;
use crate::kernel::mount::LiveMountRecord;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One mount to perform: `server:export_dir` onto `client_dir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub index: usize,
    pub server: String,
    pub export_dir: PathBuf,
    pub client_dir: PathBuf,
    pub nfs_version: u32,
    pub options: String,
}

impl MountRequest {
    /// Remote source as written on the mount command line
    pub fn source(&self) -> String {
        format!("{}:{}", self.server, self.export_dir.display())
    }

    /// Full `-o` option string including the pinned protocol version
    pub fn option_string(&self) -> String {
        format!("{},nfsvers={}", self.options, self.nfs_version)
    }
}

/// Result of a single mount attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    /// Mount command exited non-zero (None when killed by a signal)
    ExitStatus(Option<i32>),
    SpawnFailed(String),
    TimedOut,
    /// Mounter never reached its mount call
    BarrierFailed(String),
    /// Teardown had started by the time the mounter was released
    Cancelled,
    /// Coordinator never heard back from the mounter
    Lost,
}

impl MountOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MountOutcome::Mounted)
    }
}

/// Outcome of one mounter plus the instant its mount call started
#[derive(Debug, Clone)]
pub struct MountAttempt {
    pub index: usize,
    pub outcome: MountOutcome,
    pub started_at: Option<Instant>,
}

pub trait MountOps: Send + Sync {
    fn backend_name(&self) -> &str;
    /// Re-read the export table and (de)activate entries (`exportfs -ra`)
    fn export_reload(&self) -> Result<()>;
    /// Perform one mount, bounded by `timeout`
    fn mount(&self, request: &MountRequest, timeout: Duration) -> MountOutcome;
    /// Unmount every mount of the given filesystem types
    fn unmount_all(&self, fstypes: &[&str], lazy: bool) -> Result<()>;
    /// Fresh snapshot of the live mount table
    fn read_live_mounts(&self) -> Result<Vec<LiveMountRecord>>;
}
