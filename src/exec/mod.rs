//! External operations
//!
//! Export reload, mount and unmount run as opaque subprocesses behind [`MountOps`].

pub mod command;
pub mod ops;
pub mod system;

pub use ops::{MountAttempt, MountOps, MountOutcome, MountRequest};
pub use system::SystemOps;
