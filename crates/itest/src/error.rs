//! Error types for itest.

/// Errors raised while setting up or using the harness.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Settings or shared helpers.
    #[error(transparent)]
    Core(#[from] itest_core::Error),

    /// Talking to the container runtime.
    #[error(transparent)]
    Docker(#[from] itest_docker::Error),

    /// Starting or using a service.
    #[error(transparent)]
    Services(#[from] itest_services::Error),

    /// Opening the debug log file.
    #[error("cannot open debug log {path}: {source}")]
    DebugLog {
        /// File that was requested
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Convenience `Result` type alias for itest operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Core(itest_core::Error::config(message))
    }
}
