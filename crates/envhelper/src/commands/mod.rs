//! Command implementations
//!
//! This module contains implementations for all CLI subcommands.

pub mod check_port;
pub mod environments;
pub mod lifecycle;
pub mod session;
