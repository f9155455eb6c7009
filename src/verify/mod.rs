//! Mount verification
//!
//! Cross-checks the kernel's live mount table against the intended mapping. Every
//! live NFS mount must be one this run asked for, on the client directory it asked
//! for. Intended mounts missing from the table are tolerated since mount failures
//! are counted rather than fatal.

use crate::config::types::{ParamountError, Result, SERVER_ADDRESS};
use crate::exec::MountOps;
use crate::exports::MountIntentMap;
use crate::kernel::mount::LiveMountRecord;
use std::path::Path;

/// Counts from a passing verification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Tracked mounts that matched their intended client directory
    pub checked: usize,
    /// Records of unrelated filesystem types
    pub ignored: usize,
}

/// Check parsed records, in table order, stopping at the first inconsistency
pub fn verify_mounts(records: &[LiveMountRecord], intents: &MountIntentMap) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for record in records {
        if !record.is_tracked() {
            report.ignored += 1;
            continue;
        }

        // Same export path served by another host is still someone else's mount.
        let expected = intents
            .expected_client(Path::new(record.export_path()))
            .filter(|_| record.server() == Some(SERVER_ADDRESS))
            .ok_or_else(|| ParamountError::UntrackedMount {
                mount: record.source.clone(),
            })?;

        if Path::new(&record.target) != expected {
            return Err(ParamountError::MountMismatch {
                mount: record.source.clone(),
                expected: expected.display().to_string(),
                found: record.target.clone(),
            });
        }

        log::debug!("Mount {} on {} checks out", record.source, record.target);
        report.checked += 1;
    }

    Ok(report)
}

/// Read a fresh mount table snapshot and verify it
pub fn verify_live_mounts(ops: &dyn MountOps, intents: &MountIntentMap) -> Result<VerifyReport> {
    let records = ops.read_live_mounts()?;
    verify_mounts(&records, intents)
}
