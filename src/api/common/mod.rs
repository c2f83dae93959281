//! Shared HTTP plumbing.

pub mod tracing;
