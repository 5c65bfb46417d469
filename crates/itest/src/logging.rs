//! Process-wide log setup.
//!
//! Human-readable events at INFO and above go to stderr; `RUST_LOG`
//! overrides that filter. When a debug log file is configured, every event
//! at DEBUG and above is also written to it as JSON lines.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{Error, Result};

/// Installs the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, in which
/// case nothing changes.
pub fn init(debug_log: Option<&Path>) -> Result<bool> {
    let stderr = fmt::layer().with_writer(std::io::stderr).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );

    let file = match debug_log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| Error::DebugLog {
                    path: path.display().to_string(),
                    source,
                })?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .try_init()
        .is_ok())
}
