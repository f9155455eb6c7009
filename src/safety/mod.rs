//! Safety and cleanup
//!
//! Scoped workspace, the provisioning gate, and the single-execution teardown
//! that leaves the host clean.

pub mod cleanup;
pub mod gate;
pub mod safe_cleanup;
pub mod workspace;

pub use cleanup::{CleanupController, CleanupReport, CleanupState};
pub use gate::{GatePass, ProvisionGate};
pub use workspace::ScopedWorkspace;
