//! Testing infrastructure
//!
//! Fake operations backend so provisioning runs can be driven without root.

pub mod fake_ops;

pub use fake_ops::FakeOps;
