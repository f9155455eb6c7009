//! Live mount table access
//!
//! Parses the kernel's view of active mounts for verification.

pub mod table;

pub use table::*;
