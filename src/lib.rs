//! paramount: concurrent NFS mount provisioning for server stress testing
//!
//! Creates N export directories and N client directories in a scoped workspace,
//! publishes them through an export table, mounts every export over loopback in a
//! single barrier-synchronized burst, verifies the live mount table against the
//! intended mapping, and tears everything down again, including on SIGINT.
//!
//! # Architecture
//!
//! - [`config`]: run configuration, constants, error taxonomy
//! - [`kernel`]: signal masking and the live mount table
//! - [`exec`]: external operations (`exportfs`, `mount`, `umount`) behind [`exec::MountOps`]
//! - [`exports`]: export slots, intended mapping, export table writer
//! - [`orchestrator`]: layout, activation, start barrier, mounter pool, run flow
//! - [`verify`]: live mount table verification
//! - [`safety`]: scoped workspace, boundary-respecting removal, cleanup controller
//! - [`testing`]: fake operations backend
//! - [`cli`]: argument parsing and the top-level dispatcher

pub mod cli;
pub mod config;
pub mod exec;
pub mod exports;
pub mod kernel;
pub mod orchestrator;
pub mod safety;
pub mod testing;
pub mod verify;

pub use config::types::{ParamountError, Result, RunConfig};
