//! Deciding how a test process reaches a service port.
//!
//! With a local daemon the test process shares the host with the Docker
//! bridge and can connect to container IPs directly. A remote daemon's
//! bridge is unreachable, so the port is published on a free host port and
//! the daemon's hostname is used instead.

use std::fmt;
use std::net::TcpListener;

use url::Url;

use crate::error::{Error, Result};
use crate::runtime::{ContainerRuntime, PublishedPort};

/// Where the Docker daemon lives relative to the test process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DaemonEndpoint {
    /// Reached through a local socket.
    #[default]
    Local,
    /// Reached over the network at `host`.
    Remote {
        /// Daemon hostname or IP.
        host: String,
    },
}

impl DaemonEndpoint {
    /// Interprets a `DOCKER_HOST` value; `None` means the default local socket.
    pub fn from_docker_host(value: Option<&str>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(DaemonEndpoint::Local);
        };
        let url = Url::parse(value).map_err(|e| Error::InvalidDockerHost {
            value: value.to_string(),
            message: e.to_string(),
        })?;
        match url.scheme() {
            "unix" | "npipe" => Ok(DaemonEndpoint::Local),
            _ => {
                let host = url.host_str().ok_or_else(|| Error::InvalidDockerHost {
                    value: value.to_string(),
                    message: "missing host".to_string(),
                })?;
                Ok(DaemonEndpoint::Remote {
                    host: host.to_string(),
                })
            }
        }
    }

    /// Returns `true` for a daemon on another machine.
    pub fn is_remote(&self) -> bool {
        matches!(self, DaemonEndpoint::Remote { .. })
    }
}

/// A host and port a test connects to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Port strategy for one service container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDecision {
    daemon: DaemonEndpoint,
    container_port: u16,
    exposed: u16,
}

impl PortDecision {
    /// Decides how `container_port` is reached. Picks a free host port when
    /// the daemon is remote.
    pub fn new(daemon: &DaemonEndpoint, container_port: u16) -> Result<Self> {
        let exposed = if daemon.is_remote() {
            free_tcp_port()?
        } else {
            container_port
        };
        Ok(Self {
            daemon: daemon.clone(),
            container_port,
            exposed,
        })
    }

    /// Port bindings to put on the container spec; empty for a local daemon.
    pub fn bindings(&self) -> Vec<PublishedPort> {
        if self.daemon.is_remote() {
            vec![PublishedPort {
                container_port: self.container_port,
                host_ip: "0.0.0.0".to_string(),
                host_port: self.exposed,
            }]
        } else {
            Vec::new()
        }
    }

    /// Port the service is expected on from the test's point of view.
    pub fn exposed_port(&self) -> u16 {
        self.exposed
    }

    /// Returns `true` when the port is published on a remote daemon.
    pub fn is_remote(&self) -> bool {
        self.daemon.is_remote()
    }

    /// Resolves the endpoint of a started container.
    ///
    /// Remote: the daemon host and the port Docker actually published.
    /// Local: the container IP and the native port.
    pub async fn endpoint(&self, runtime: &dyn ContainerRuntime, container_id: &str) -> Result<Endpoint> {
        match &self.daemon {
            DaemonEndpoint::Remote { host } => Ok(Endpoint {
                host: host.clone(),
                port: runtime.published_port(container_id, self.container_port).await?,
            }),
            DaemonEndpoint::Local => Ok(Endpoint {
                host: runtime.container_address(container_id).await?,
                port: self.container_port,
            }),
        }
    }
}

/// Asks the OS for a currently unused TCP port.
pub fn free_tcp_port() -> Result<u16> {
    let listener = TcpListener::bind(("0.0.0.0", 0))?;
    Ok(listener.local_addr()?.port())
}
