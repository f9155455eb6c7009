/// Operations backend that shells out to the host's NFS tooling
use crate::config::types::{ParamountError, Result};
use crate::exec::command::{self, Bounded};
use crate::exec::ops::{MountOps, MountOutcome, MountRequest};
use crate::kernel::mount::{self, LiveMountRecord};
use log::{debug, warn};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

/// Host tools resolved once at startup
#[derive(Debug, Clone)]
pub struct SystemOps {
    exportfs: PathBuf,
    mount: PathBuf,
    umount: PathBuf,
    mount_table: PathBuf,
}

impl SystemOps {
    /// Resolve `exportfs`, `mount` and `umount`; missing tools are fatal
    pub fn discover() -> Result<Self> {
        let ops = Self {
            exportfs: command::require_tool("exportfs")?,
            mount: command::require_tool("mount")?,
            umount: command::require_tool("umount")?,
            mount_table: PathBuf::from(mount::PROC_MOUNTS),
        };
        debug!(
            "Using exportfs={} mount={} umount={}",
            ops.exportfs.display(),
            ops.mount.display(),
            ops.umount.display()
        );
        Ok(ops)
    }

    fn mount_command(&self, request: &MountRequest) -> Command {
        let mut cmd = Command::new(&self.mount);
        cmd.arg("-t")
            .arg("nfs")
            .arg("-o")
            .arg(request.option_string())
            .arg(request.source())
            .arg(&request.client_dir);
        cmd
    }
}

impl MountOps for SystemOps {
    fn backend_name(&self) -> &str {
        "system"
    }

    fn export_reload(&self) -> Result<()> {
        let mut cmd = Command::new(&self.exportfs);
        cmd.arg("-ra");
        debug!("run {}", command::describe(&cmd));

        let done = command::run(&mut cmd)?;
        if !done.status.success() {
            return Err(ParamountError::ExportReload(format!(
                "{} ({})",
                done.status, done.stderr
            )));
        }
        Ok(())
    }

    fn mount(&self, request: &MountRequest, timeout: Duration) -> MountOutcome {
        let mut cmd = self.mount_command(request);
        debug!("mounter {} cmd '{}'", request.index, command::describe(&cmd));

        match command::run_bounded(&mut cmd, timeout) {
            Ok(Bounded::Completed(done)) if done.status.success() => MountOutcome::Mounted,
            Ok(Bounded::Completed(done)) => {
                debug!(
                    "mounter {} failed with {}: {}",
                    request.index, done.status, done.stderr
                );
                MountOutcome::ExitStatus(done.status.code())
            }
            Ok(Bounded::TimedOut) => {
                warn!("mounter {} timed out after {:?}", request.index, timeout);
                MountOutcome::TimedOut
            }
            Err(e) => MountOutcome::SpawnFailed(e.to_string()),
        }
    }

    fn unmount_all(&self, fstypes: &[&str], lazy: bool) -> Result<()> {
        let mut cmd = Command::new(&self.umount);
        cmd.arg("-a");
        if lazy {
            cmd.arg("-l");
        }
        cmd.arg("-t").arg(fstypes.join(","));
        debug!("run {}", command::describe(&cmd));

        let done = command::run(&mut cmd)?;
        if !done.status.success() {
            return Err(ParamountError::Command(format!(
                "umount exited with {} ({})",
                done.status, done.stderr
            )));
        }
        Ok(())
    }

    fn read_live_mounts(&self) -> Result<Vec<LiveMountRecord>> {
        mount::read_mount_table(&self.mount_table)
    }
}
