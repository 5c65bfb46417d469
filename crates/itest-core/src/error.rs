//! Error types for itest-core.

/// Errors raised by the shared harness helpers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// A service never answered its readiness probe.
    #[error("{what} not ready after {attempts} attempts: {last_error}")]
    NotReady {
        /// The service being waited for
        what: String,
        /// Number of probes made
        attempts: usize,
        /// Error returned by the final probe
        last_error: String,
    },

    /// An operation exceeded its deadline.
    #[error("Timed out after {millis}ms: {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Deadline in milliseconds
        millis: u128,
    },

    /// I/O error (files, sockets).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Certificate or key generation failed.
    #[error("PKI error: {0}")]
    Pki(#[from] rcgen::Error),
}

/// Convenience `Result` type alias for itest-core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether retrying the failed operation could help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NotReady { .. } => true,
            Error::Timeout { .. } => true,
            Error::Io(_) => true,
            Error::Config { .. } => false,
            Error::Pki(_) => false,
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates an error for a required environment variable that is unset.
    pub fn missing_env(key: &str) -> Self {
        Error::config(format!("environment variable {key} must be set"))
    }

    /// Creates a new timeout error.
    pub fn timeout<S: Into<String>>(what: S, after: std::time::Duration) -> Self {
        Error::Timeout {
            what: what.into(),
            millis: after.as_millis(),
        }
    }
}
