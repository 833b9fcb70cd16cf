//! Ambient plumbing shared by portal binaries: configuration loading,
//! tracing initialisation and serde helpers.

pub mod config;
pub mod serde;
pub mod tracing;
