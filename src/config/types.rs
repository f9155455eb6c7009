/// Core types and error taxonomy for paramount
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Loopback address every mounter targets
pub const SERVER_ADDRESS: &str = "127.0.0.1";

/// NFS protocol version pinned for every mount
pub const NFS_VERSION: u32 = 3;

/// Fixed client mount options (the protocol version is appended per request)
pub const MOUNT_OPTIONS: &str = "rw";

/// Filesystem types owned by this tool in the live mount table
pub const TRACKED_FSTYPES: &[&str] = &["nfs", "nfs4"];

/// Tag used for the export-table block markers and the workspace prefix
pub const RUN_TAG: &str = "paramount";

/// Well-known export table location read by `exportfs -ra`
pub const DEFAULT_EXPORTS_FILE: &str = "/etc/exports.d/paramount.exports";

pub const DEFAULT_THREADS: usize = 128;
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_BARRIER_TIMEOUT: Duration = Duration::from_secs(30);

/// Reporting overhead allowed on top of the per-mount bound
pub const SETTLE_SLACK: Duration = Duration::from_secs(5);

/// Immutable configuration for a single run
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Number of export/mount pairs (one mounter thread each)
    pub threads: usize,
    /// Step-by-step progress output
    pub verbose: bool,
    /// Keep the workspace tree after the run
    pub preserve_temp: bool,
    /// Export table written for this run
    pub exports_file: PathBuf,
    /// Upper bound on a single mount command
    pub mount_timeout: Duration,
    /// Upper bound on waiting at the start barrier
    pub barrier_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            verbose: false,
            preserve_temp: false,
            exports_file: PathBuf::from(DEFAULT_EXPORTS_FILE),
            mount_timeout: DEFAULT_MOUNT_TIMEOUT,
            barrier_timeout: DEFAULT_BARRIER_TIMEOUT,
        }
    }
}

impl RunConfig {
    /// Longest a launched mounter can keep running after release
    pub fn settle_timeout(&self) -> Duration {
        self.mount_timeout + SETTLE_SLACK
    }

    /// Reject configurations the orchestrator cannot run
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(ParamountError::Config(
                "thread count must be greater than zero".to_string(),
            ));
        }
        if self.mount_timeout.is_zero() {
            return Err(ParamountError::Config(
                "mount timeout must be greater than zero".to_string(),
            ));
        }
        if self.barrier_timeout.is_zero() {
            return Err(ParamountError::Config(
                "barrier timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Custom error types for paramount
#[derive(Error, Debug)]
pub enum ParamountError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Export table error: {0}")]
    ExportTable(String),

    #[error("exportfs failed: {0}")]
    ExportReload(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Start barrier error: {0}")]
    Barrier(String),

    #[error("Mount '{mount}' not found in map")]
    UntrackedMount { mount: String },

    #[error("Mount '{mount}' expected mountpoint {expected} found {found}")]
    MountMismatch {
        mount: String,
        expected: String,
        found: String,
    },

    #[error("Mount table error: {0}")]
    MountTable(String),

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Interrupted: teardown started before {0}")]
    Interrupted(String),
}

impl From<nix::errno::Errno> for ParamountError {
    fn from(err: nix::errno::Errno) -> Self {
        ParamountError::Signal(err.to_string())
    }
}

/// Result type alias for paramount operations
pub type Result<T> = std::result::Result<T, ParamountError>;
