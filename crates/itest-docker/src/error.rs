//! Error types for itest-docker.

/// Errors from container runtime operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Docker API error.
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Error from the shared harness helpers.
    #[error(transparent)]
    Core(#[from] itest_core::Error),

    /// I/O error while relaying container output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A multiplexed frame named a stream other than stdout or stderr.
    #[error("received fragment for unknown stream {0}")]
    UnknownStream(u8),

    /// The multiplexed stream ended in the middle of a frame.
    #[error("stream ended inside a frame: expected {expected} bytes, got {got}")]
    TruncatedFrame {
        /// Bytes the header announced (including the header itself)
        expected: usize,
        /// Bytes actually received
        got: usize,
    },

    /// A command run via exec exited unsuccessfully.
    #[error("command exited with code {code}")]
    ExitCode {
        /// Exit status reported by the daemon
        code: i64,
    },

    /// The daemon still reports an exec as running after its output closed.
    #[error("exec {exec_id} is still running after its output closed")]
    StillRunning {
        /// Exec instance ID
        exec_id: String,
    },

    /// The daemon reported no exit status for a finished exec.
    #[error("exec {exec_id} finished without an exit code")]
    NoExitCode {
        /// Exec instance ID
        exec_id: String,
    },

    /// A container has no IP address on any network.
    #[error("no address found for container {container}")]
    NoAddress {
        /// Container ID or name
        container: String,
    },

    /// A container port is not published on the host.
    #[error("port {port}/tcp of container {container} is not published")]
    PortNotPublished {
        /// Container ID or name
        container: String,
        /// Container-side port
        port: u16,
    },

    /// A network has no IPAM gateway.
    #[error("network {network} has no gateway")]
    NoGateway {
        /// Network ID
        network: String,
    },

    /// `DOCKER_HOST` could not be interpreted.
    #[error("invalid docker host {value:?}: {message}")]
    InvalidDockerHost {
        /// The offending value
        value: String,
        /// Why it was rejected
        message: String,
    },

    /// Lookup of an object the runtime does not know.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Object kind (container, network, exec)
        kind: &'static str,
        /// Object ID
        id: String,
    },
}

/// Convenience `Result` type alias for itest-docker operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates an error for a missing object.
    pub fn not_found<S: Into<String>>(kind: &'static str, id: S) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns whether the Docker daemon reported a 404 for the request.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Docker(bollard::errors::Error::DockerResponseServerError {
                status_code, ..
            }) => *status_code == 404,
            _ => false,
        }
    }
}
