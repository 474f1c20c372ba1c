//! Core library for env_helper
//!
//! Environment descriptors and their persistence, translation of descriptor
//! text fields into container parameters, naming and routing labels, the
//! container runtime adapter, and the lifecycle controller that keeps
//! descriptors and containers in step.

pub mod descriptor;
pub mod docker;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod naming;
pub mod ports;
pub mod runtime;
pub mod settings;
pub mod store;
pub mod translate;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
