/// Workspace directory layout for a run
use crate::config::types::{ParamountError, Result};
use crate::exports::{slot_dir_name, ExportSlot};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Server-side export root under the workspace
pub const EXPORT_ROOT: &str = "mount";

/// Client-side mount target root under the workspace
pub const CLIENT_ROOT: &str = "client";

#[derive(Debug, Clone)]
pub struct Layout {
    pub export_root: PathBuf,
    pub client_root: PathBuf,
    pub slots: Vec<ExportSlot>,
}

fn create_dir(path: &Path, what: &str) -> Result<()> {
    fs::create_dir(path).map_err(|e| {
        ParamountError::Layout(format!("Failed to create {} {}: {}", what, path.display(), e))
    })
}

/// Create `mount/dNNNN` and `client/dNNNN` for `threads` slots.
/// Any failure aborts immediately; the caller's cleanup removes what was created.
pub fn create_layout(workspace: &Path, threads: usize) -> Result<Layout> {
    let export_root = workspace.join(EXPORT_ROOT);
    let client_root = workspace.join(CLIENT_ROOT);

    create_dir(&export_root, "mount root directory")?;
    create_dir(&client_root, "client root directory")?;

    let mut slots = Vec::with_capacity(threads);
    for index in 0..threads {
        let export_dir = export_root.join(slot_dir_name(index));
        create_dir(&export_dir, "mount directory")?;
        debug!("Created mount {}", export_dir.display());

        let client_dir = client_root.join(slot_dir_name(index));
        create_dir(&client_dir, "client directory")?;
        debug!("Created client mountpoint {}", client_dir.display());

        slots.push(ExportSlot::new(index, export_dir, client_dir));
    }

    Ok(Layout {
        export_root,
        client_root,
        slots,
    })
}
