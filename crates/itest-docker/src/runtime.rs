//! The container runtime seam.
//!
//! Service creators only talk to containers through [`ContainerRuntime`], so
//! their orchestration logic can be tested against
//! [`MockRuntime`](crate::mock::MockRuntime) without a Docker daemon.

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use itest_core::LineWriter;
use tracing::Level;

use crate::error::Result;
use crate::port::DaemonEndpoint;

/// Destination for container output.
pub type OutputSink = Box<dyn Write + Send>;

/// A network a container joins at creation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// Network ID.
    pub id: String,
    /// Network name, used as the endpoint key.
    pub name: String,
    /// DNS aliases of the container on this network.
    pub aliases: Vec<String>,
}

/// A host path mounted into a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindMount {
    /// Absolute host path.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    /// Mount read-only.
    pub read_only: bool,
}

/// A container TCP port published on the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedPort {
    /// Container-side port.
    pub container_port: u16,
    /// Host interface, e.g. `0.0.0.0`.
    pub host_ip: String,
    /// Host-side port.
    pub host_port: u16,
}

/// Everything needed to create a container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment as `KEY=value` entries.
    pub env: Vec<String>,
    /// Command override.
    pub cmd: Option<Vec<String>>,
    /// Hostname inside the container.
    pub hostname: Option<String>,
    /// Network to join.
    pub network: Option<NetworkAttachment>,
    /// Bind mounts.
    pub mounts: Vec<BindMount>,
    /// Published ports.
    pub ports: Vec<PublishedPort>,
    /// Container labels.
    pub labels: HashMap<String, String>,
}

impl ContainerSpec {
    /// Starts a spec for `image` named `name`.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    /// Adds a `KEY=value` environment entry.
    pub fn env(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.env.push(format!("{key}={}", value.as_ref()));
        self
    }

    /// Sets the command.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the hostname.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Joins a network.
    pub fn network(mut self, network: NetworkAttachment) -> Self {
        self.network = Some(network);
        self
    }

    /// Adds a bind mount.
    pub fn mount(mut self, source: impl Into<String>, target: impl Into<String>, read_only: bool) -> Self {
        self.mounts.push(BindMount {
            source: source.into(),
            target: target.into(),
            read_only,
        });
        self
    }

    /// Adds published ports.
    pub fn publish(mut self, ports: impl IntoIterator<Item = PublishedPort>) -> Self {
        self.ports.extend(ports);
        self
    }

    /// Adds a label.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A command to run inside a running container.
#[derive(Default)]
pub struct ExecRequest {
    /// Command and arguments.
    pub cmd: Vec<String>,
    /// Data written to the command's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,
    /// Receives stdout; discarded when `None`.
    pub stdout: Option<OutputSink>,
    /// Receives stderr; discarded when `None`.
    pub stderr: Option<OutputSink>,
}

impl ExecRequest {
    /// Creates a request for `cmd` with no input and discarded output.
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Feeds `data` to stdin.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Sends stdout to `sink`.
    pub fn stdout(mut self, sink: OutputSink) -> Self {
        self.stdout = Some(sink);
        self
    }

    /// Sends stderr to `sink`.
    pub fn stderr(mut self, sink: OutputSink) -> Self {
        self.stderr = Some(sink);
        self
    }
}

impl std::fmt::Debug for ExecRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecRequest")
            .field("cmd", &self.cmd)
            .field("stdin_len", &self.stdin.as_ref().map(Vec::len))
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

/// Operations the harness needs from a container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// How the daemon is reached.
    fn daemon(&self) -> &DaemonEndpoint;

    /// Creates a bridge network and returns its ID.
    async fn create_network(&self, name: &str, labels: &HashMap<String, String>) -> Result<String>;

    /// Removes a network.
    async fn remove_network(&self, id: &str) -> Result<()>;

    /// Resolves a network ID to its name.
    async fn network_name(&self, id: &str) -> Result<String>;

    /// Returns the gateway address of a network.
    async fn network_gateway(&self, id: &str) -> Result<String>;

    /// Pulls `image`, skipping the pull when it is present and `force` is off.
    async fn pull_image(&self, image: &str, force: bool) -> Result<()>;

    /// Creates a container and returns its ID.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Starts a created container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Force-removes a container together with its anonymous volumes.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Sends `signal` (e.g. `"HUP"`) to the container's main process.
    async fn kill_container(&self, id: &str, signal: &str) -> Result<()>;

    /// First non-empty IP address of the container on any network.
    async fn container_address(&self, id: &str) -> Result<String>;

    /// Host port that `container_port/tcp` is published on.
    async fn published_port(&self, id: &str, container_port: u16) -> Result<u16>;

    /// Attaches to the container and copies its output to `sink` in a
    /// background task. With `logs`, output produced before attaching is
    /// replayed first.
    async fn forward_output(&self, id: &str, logs: bool, sink: OutputSink) -> Result<()>;

    /// Runs a command to completion, failing on a non-zero exit status.
    async fn exec(&self, id: &str, request: ExecRequest) -> Result<()>;
}

/// A sink that logs each output line through `tracing` at `level`.
pub fn log_sink(context: impl Into<String>, level: Level) -> OutputSink {
    let context = context.into();
    Box::new(LineWriter::new(move |line: &str| {
        if level == Level::ERROR {
            tracing::error!(container_name = %context, line, "container output");
        } else if level == Level::WARN {
            tracing::warn!(container_name = %context, line, "container output");
        } else if level == Level::INFO {
            tracing::info!(container_name = %context, line, "container output");
        } else if level == Level::DEBUG {
            tracing::debug!(container_name = %context, line, "container output");
        } else {
            tracing::trace!(container_name = %context, line, "container output");
        }
    }))
}
