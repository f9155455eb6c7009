//! Configuration and error types
//!
//! Run configuration, fixed protocol constants, and the crate error taxonomy.

pub mod types;

pub use types::*;
