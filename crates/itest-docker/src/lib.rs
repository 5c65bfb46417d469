//! itest docker: the container runtime seam and its Docker backend.
//!
//! # Modules
//!
//! - [`runtime`]: `ContainerRuntime` trait, container and exec descriptions
//! - [`docker`]: bollard-backed implementation
//! - [`demux`]: stdout/stderr frame demultiplexing
//! - [`port`]: local vs. remote daemon port strategy
//! - [`mock`]: recording in-memory runtime for tests
//! - [`error`]: Error types and Result alias

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod demux;
pub mod docker;
pub mod error;
pub mod mock;
pub mod port;
pub mod runtime;

// Re-export key types at crate root for convenience
pub use docker::DockerRuntime;
pub use error::{Error, Result};
pub use port::{DaemonEndpoint, Endpoint, PortDecision, free_tcp_port};
pub use runtime::{
    BindMount, ContainerRuntime, ContainerSpec, ExecRequest, NetworkAttachment, OutputSink,
    PublishedPort, log_sink,
};
