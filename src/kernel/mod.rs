//! Thin wrappers around Linux kernel interfaces.
//!
//! Signal masking for teardown and the live mount table.

pub mod mount;
pub mod signal;
