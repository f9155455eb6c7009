//! Provisioning orchestrator
//!
//! Lays out the workspace, publishes and activates the export table, bursts all
//! mounts at once behind the start barrier, then verifies the live mount table.

pub mod barrier;
pub mod layout;
pub mod mounter;

use crate::config::types::{
    ParamountError, Result, RunConfig, MOUNT_OPTIONS, NFS_VERSION, SERVER_ADDRESS,
};
use crate::exec::{MountOps, MountRequest};
use crate::exports::{ExportSlot, MountIntentMap};
use crate::safety::gate::{GatePass, ProvisionGate};
use crate::safety::{CleanupController, CleanupReport};
use crate::verify::{self, VerifyReport};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

pub use mounter::{MountPhase, MountReport};

/// Everything a completed run established
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub threads: usize,
    pub mounts: MountReport,
    pub verified: VerifyReport,
    pub workspace: PathBuf,
}

/// Result of a dispatched run: provisioning outcome plus the teardown that followed
#[derive(Debug)]
pub struct RunOutcome {
    pub result: Result<RunSummary>,
    pub cleanup: CleanupReport,
}

impl From<&RunConfig> for MountPhase {
    fn from(config: &RunConfig) -> Self {
        Self {
            mount_timeout: config.mount_timeout,
            barrier_timeout: config.barrier_timeout,
        }
    }
}

/// Loopback mount request for a slot
pub fn mount_request(slot: &ExportSlot) -> MountRequest {
    MountRequest {
        index: slot.index,
        server: SERVER_ADDRESS.to_string(),
        export_dir: slot.export_dir.clone(),
        client_dir: slot.client_dir.clone(),
        nfs_version: NFS_VERSION,
        options: MOUNT_OPTIONS.to_string(),
    }
}

/// Tell the export subsystem to re-read the table; mounts must never run against
/// stale exports, so failure is fatal
pub fn activate_exports(ops: &dyn MountOps) -> Result<()> {
    info!("run exportfs");
    ops.export_reload()
}

fn admit<'a>(gate: &'a ProvisionGate, step: &str) -> Result<GatePass<'a>> {
    gate.enter().ok_or_else(|| {
        warn!("Teardown started, skipping {}", step);
        ParamountError::Interrupted(step.to_string())
    })
}

/// Provision, mount and verify inside the controller's workspace. Does not clean
/// up; see [`dispatch`]. Each step runs under a gate pass so a concurrent
/// teardown stops the run between steps instead of racing it.
pub fn provision(
    config: &RunConfig,
    ops: &Arc<dyn MountOps>,
    cleanup: &CleanupController,
) -> Result<RunSummary> {
    config.validate()?;
    let gate = cleanup.gate();
    let workspace = cleanup.workspace_path();

    let layout = {
        let _pass = admit(gate, "layout")?;
        layout::create_layout(workspace, config.threads)?
    };
    {
        let _pass = admit(gate, "export table write")?;
        cleanup.exports().write(&layout.slots)?;
    }
    {
        let _pass = admit(gate, "export activation")?;
        activate_exports(ops.as_ref())?;
    }

    let intents = MountIntentMap::from_slots(&layout.slots);
    let requests: Vec<MountRequest> = layout.slots.iter().map(mount_request).collect();

    info!(
        "Launching {} mounters via {} backend",
        requests.len(),
        ops.backend_name()
    );
    let mounts = mounter::run_mounters(
        Arc::clone(ops),
        requests,
        MountPhase::from(config),
        Arc::clone(gate),
    )?;
    info!(
        "Mount phase done: {} mounted, {} failed",
        mounts.succeeded(),
        mounts.failed
    );

    let verified = {
        let _pass = admit(gate, "verification")?;
        info!("Scan mounts");
        verify::verify_live_mounts(ops.as_ref(), &intents)?
    };
    info!("Mounts check out ({} verified)", verified.checked);

    Ok(RunSummary {
        threads: config.threads,
        mounts,
        verified,
        workspace: workspace.to_path_buf(),
    })
}

/// Run provisioning and always tear down afterwards, whatever the outcome
pub fn dispatch(config: &RunConfig, ops: &Arc<dyn MountOps>, cleanup: &CleanupController) -> RunOutcome {
    let result = provision(config, ops, cleanup);
    let cleanup = cleanup.run();
    cleanup.log();
    RunOutcome { result, cleanup }
}
