//! Error types for itest-services.

/// Errors raised while provisioning or talking to services.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error from the container runtime.
    #[error(transparent)]
    Docker(#[from] itest_docker::Error),

    /// Error from the shared harness helpers.
    #[error(transparent)]
    Core(#[from] itest_core::Error),

    /// SQL error.
    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Redis client error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error (schema files, config files, sockets).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The Icinga 2 API answered with an unexpected status.
    #[error("{method} {path} returned status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP method
        method: String,
        /// Request path
        path: String,
        /// Status code received
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// The Icinga 2 API answered with a body that lacks expected data.
    #[error("malformed response from {path}: {message}")]
    MalformedResponse {
        /// Request path
        path: String,
        /// What was missing
        message: String,
    },

    /// Icinga 2 was signalled to reload but the old process still runs.
    #[error("icinga2 in {container} has not restarted yet")]
    NotReloaded {
        /// Node container name
        container: String,
    },

    /// A schema file could not be read.
    #[error("failed to read schema file {path}: {source}")]
    Schema {
        /// Schema file path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// A handle was used after its cleanup ran.
    #[error("{0} was already cleaned up")]
    CleanedUp(String),
}

/// Convenience `Result` type alias for itest-services operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Core(itest_core::Error::config(message))
    }

    /// Returns the MySQL error number carried by a SQL error, if any.
    pub fn mysql_error_number(&self) -> Option<u16> {
        match self {
            Error::Sql(e) => mysql_error_number(e),
            _ => None,
        }
    }
}

/// Extracts the server error number from a MySQL error.
pub(crate) fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    err.as_database_error()
        .and_then(|db| db.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>())
        .map(|e| e.number())
}
