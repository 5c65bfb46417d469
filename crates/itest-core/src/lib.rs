//! itest core: shared types and helpers for the integration test harness.
//!
//! This crate has no internal itest dependencies.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`settings`]: Environment-driven configuration
//! - [`cleanup`]: Reverse-order teardown stack
//! - [`ready`]: Fixed-interval readiness polling
//! - [`eventually`]: Poll-until-true test assertions
//! - [`variants`]: Table-driven test case generation
//! - [`pki`]: Throwaway CA and certificates for Icinga 2 clusters
//! - [`line_writer`], [`random`], [`unique_name`]: Small utilities

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cleanup;
pub mod error;
pub mod eventually;
pub mod line_writer;
pub mod pki;
pub mod random;
pub mod ready;
pub mod settings;
pub mod unique_name;
pub mod variants;

// Re-export key types at crate root for convenience
pub use cleanup::CleanupStack;
pub use error::{Error, Result};
pub use line_writer::LineWriter;
pub use pki::{Ca, CertificateWithKey};
pub use random::random_string;
pub use ready::{ReadinessPolicy, wait_until_ready};
pub use settings::Settings;
pub use unique_name::unique_name;
pub use variants::{HasVariantInfo, VariantInfo, Variants};
