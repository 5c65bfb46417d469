//! itest: Docker-backed integration test environments for Icinga.
//!
//! # Modules
//!
//! - [`it`]: the [`It`] harness, lazy service creators and cleanup
//! - [`scope`]: per-test cleanup through [`Scope`]
//! - [`logging`]: stderr and JSON debug log setup
//! - [`error`]: Error types and Result alias
//!
//! The member crates are re-exported under their own names.

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod it;
pub mod logging;
pub mod scope;

pub use itest_core;
pub use itest_docker;
pub use itest_services;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use it::It;
pub use itest_core::{Settings, Variants, eventually};
pub use itest_services::{RelationalDatabase, SharedDatabase};
pub use scope::Scope;
