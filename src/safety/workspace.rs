/// Scoped temporary workspace owning every server- and client-side directory of a run
use crate::config::types::{ParamountError, Result};
use crate::safety::safe_cleanup;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const CREATE_ATTEMPTS: usize = 16;

/// Uniquely named directory under the temp root, removed on request or on drop
#[derive(Debug)]
pub struct ScopedWorkspace {
    root: PathBuf,
    preserve: bool,
}

impl ScopedWorkspace {
    /// Create `<temp_dir>/<prefix>.<random>`
    pub fn new(prefix: &str, preserve: bool) -> Result<Self> {
        Self::new_in(&std::env::temp_dir(), prefix, preserve)
    }

    /// Create `<base>/<prefix>.<random>`
    pub fn new_in(base: &Path, prefix: &str, preserve: bool) -> Result<Self> {
        for _ in 0..CREATE_ATTEMPTS {
            let suffix = Uuid::new_v4().simple().to_string();
            let candidate = base.join(format!("{}.{}", prefix, &suffix[..12]));

            match fs::create_dir(&candidate) {
                Ok(()) => {
                    // The kernel reports resolved paths in the mount table.
                    let root = fs::canonicalize(&candidate).map_err(|e| {
                        ParamountError::Workspace(format!(
                            "Failed to resolve workspace {}: {}",
                            candidate.display(),
                            e
                        ))
                    })?;
                    log::debug!("Created workspace {}", root.display());
                    return Ok(Self { root, preserve });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(ParamountError::Workspace(format!(
                        "Failed to create workspace directory {}: {}",
                        candidate.display(),
                        e
                    )))
                }
            }
        }

        Err(ParamountError::Workspace(format!(
            "No unique workspace name under {} after {} attempts",
            base.display(),
            CREATE_ATTEMPTS
        )))
    }

    /// Workspace root directory
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Remove the whole tree unless preserved (idempotent)
    pub fn delete_now(&self) -> Result<()> {
        if self.preserve {
            log::debug!("Preserving workspace {}", self.root.display());
            return Ok(());
        }
        safe_cleanup::remove_tree_secure(&self.root)
    }
}

impl Drop for ScopedWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.delete_now() {
            log::warn!("Failed to remove workspace {}: {}", self.root.display(), e);
        }
    }
}
