//! In-memory [`ContainerRuntime`] for tests.
//!
//! Records every call so tests can assert on orchestration order, hands out
//! predictable IDs and addresses, and lets tests script exec results.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::port::DaemonEndpoint;
use crate::runtime::{ContainerRuntime, ContainerSpec, ExecRequest, OutputSink};

/// A recorded runtime call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// `create_network(name)`
    CreateNetwork(String),
    /// `remove_network(id)`
    RemoveNetwork(String),
    /// `pull_image(image)` that actually pulled
    PullImage(String),
    /// `create_container(name)`
    CreateContainer(String),
    /// `start_container(id)`
    StartContainer(String),
    /// `remove_container(id)`
    RemoveContainer(String),
    /// `kill_container(id, signal)`
    KillContainer(String, String),
    /// `forward_output(id)`
    ForwardOutput(String),
    /// `exec(id, cmd)`
    Exec(String, Vec<String>),
}

/// Scripted result of an exec.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Written to the stdout sink.
    pub stdout: Vec<u8>,
    /// Written to the stderr sink.
    pub stderr: Vec<u8>,
    /// Exit status.
    pub exit_code: i64,
}

/// An exec as the mock saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecRecord {
    /// Container ID.
    pub container: String,
    /// Command and arguments.
    pub cmd: Vec<String>,
    /// Bytes given on stdin.
    pub stdin: Option<Vec<u8>>,
}

/// A container known to the mock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockContainer {
    /// Spec it was created from.
    pub spec: ContainerSpec,
    /// Assigned IP address.
    pub address: String,
    /// Whether `start_container` was called.
    pub started: bool,
}

type ExecHandler = Arc<dyn Fn(&ExecRecord) -> ExecOutcome + Send + Sync>;

#[derive(Default)]
struct State {
    ops: Vec<Op>,
    networks: HashMap<String, String>,
    containers: HashMap<String, MockContainer>,
    images: HashSet<String>,
    execs: Vec<ExecRecord>,
    next_id: u32,
    next_host: u32,
    removal_failures: u32,
}

/// Recording runtime.
pub struct MockRuntime {
    daemon: DaemonEndpoint,
    state: Mutex<State>,
    exec_handler: Mutex<Option<ExecHandler>>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    /// Creates a mock talking to a local daemon.
    pub fn new() -> Self {
        Self::with_daemon(DaemonEndpoint::Local)
    }

    /// Creates a mock that pretends to be reached via `daemon`.
    pub fn with_daemon(daemon: DaemonEndpoint) -> Self {
        Self {
            daemon,
            state: Mutex::new(State::default()),
            exec_handler: Mutex::new(None),
        }
    }

    /// Marks `image` as already present, so pulls are skipped.
    pub fn add_image(&self, image: &str) {
        self.lock().images.insert(image.to_string());
    }

    /// Scripts every subsequent exec.
    pub fn on_exec<F>(&self, handler: F)
    where
        F: Fn(&ExecRecord) -> ExecOutcome + Send + Sync + 'static,
    {
        *self
            .exec_handler
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(handler));
    }

    /// Makes the next `count` container removals fail without removing.
    pub fn fail_removals(&self, count: u32) {
        self.lock().removal_failures = count;
    }

    /// All calls so far, in order.
    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    /// All execs so far, in order.
    pub fn execs(&self) -> Vec<ExecRecord> {
        self.lock().execs.clone()
    }

    /// Containers that exist (created and not removed).
    pub fn containers(&self) -> HashMap<String, MockContainer> {
        self.lock().containers.clone()
    }

    /// Looks up a live container by name.
    pub fn container_by_name(&self, name: &str) -> Option<(String, MockContainer)> {
        self.lock()
            .containers
            .iter()
            .find(|(_, c)| c.spec.name == name)
            .map(|(id, c)| (id.clone(), c.clone()))
    }

    /// IDs of networks that exist.
    pub fn networks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().networks.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(state: &mut State, kind: &str) -> String {
        state.next_id += 1;
        format!("{kind}-{}", state.next_id)
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    fn daemon(&self) -> &DaemonEndpoint {
        &self.daemon
    }

    async fn create_network(&self, name: &str, _labels: &HashMap<String, String>) -> Result<String> {
        let mut state = self.lock();
        let id = Self::next_id(&mut state, "network");
        state.networks.insert(id.clone(), name.to_string());
        state.ops.push(Op::CreateNetwork(name.to_string()));
        Ok(id)
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(Op::RemoveNetwork(id.to_string()));
        state
            .networks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("network", id))
    }

    async fn network_name(&self, id: &str) -> Result<String> {
        self.lock()
            .networks
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("network", id))
    }

    async fn network_gateway(&self, id: &str) -> Result<String> {
        if self.lock().networks.contains_key(id) {
            Ok("127.0.0.1".to_string())
        } else {
            Err(Error::not_found("network", id))
        }
    }

    async fn pull_image(&self, image: &str, force: bool) -> Result<()> {
        let mut state = self.lock();
        if force || !state.images.contains(image) {
            state.images.insert(image.to_string());
            state.ops.push(Op::PullImage(image.to_string()));
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.lock();
        let id = Self::next_id(&mut state, "container");
        state.next_host += 1;
        let address = format!("172.18.{}.{}", state.next_host / 254, state.next_host % 254 + 1);
        state.containers.insert(
            id.clone(),
            MockContainer {
                spec: spec.clone(),
                address,
                started: false,
            },
        );
        state.ops.push(Op::CreateContainer(spec.name.clone()));
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(Op::StartContainer(id.to_string()));
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::not_found("container", id))?;
        container.started = true;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(Op::RemoveContainer(id.to_string()));
        if state.removal_failures > 0 {
            state.removal_failures -= 1;
            return Err(Error::Docker(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message: format!("removal of container {id} is already in progress"),
                },
            ));
        }
        state
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("container", id))
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .ops
            .push(Op::KillContainer(id.to_string(), signal.to_string()));
        if state.containers.contains_key(id) {
            Ok(())
        } else {
            Err(Error::not_found("container", id))
        }
    }

    async fn container_address(&self, id: &str) -> Result<String> {
        self.lock()
            .containers
            .get(id)
            .map(|c| c.address.clone())
            .ok_or_else(|| Error::not_found("container", id))
    }

    async fn published_port(&self, id: &str, container_port: u16) -> Result<u16> {
        let state = self.lock();
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| Error::not_found("container", id))?;
        container
            .spec
            .ports
            .iter()
            .find(|p| p.container_port == container_port)
            .map(|p| p.host_port)
            .ok_or_else(|| Error::PortNotPublished {
                container: id.to_string(),
                port: container_port,
            })
    }

    async fn forward_output(&self, id: &str, _logs: bool, _sink: OutputSink) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(Op::ForwardOutput(id.to_string()));
        if state.containers.contains_key(id) {
            Ok(())
        } else {
            Err(Error::not_found("container", id))
        }
    }

    async fn exec(&self, id: &str, request: ExecRequest) -> Result<()> {
        let ExecRequest {
            cmd,
            stdin,
            stdout,
            stderr,
        } = request;

        let record = ExecRecord {
            container: id.to_string(),
            cmd: cmd.clone(),
            stdin,
        };
        {
            let mut state = self.lock();
            if !state.containers.contains_key(id) {
                return Err(Error::not_found("container", id));
            }
            state.ops.push(Op::Exec(id.to_string(), cmd));
            state.execs.push(record.clone());
        }

        let handler = self
            .exec_handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let outcome = handler.map(|h| h(&record)).unwrap_or_default();

        if let Some(mut sink) = stdout {
            sink.write_all(&outcome.stdout)?;
            sink.flush()?;
        }
        if let Some(mut sink) = stderr {
            sink.write_all(&outcome.stderr)?;
            sink.flush()?;
        }

        match outcome.exit_code {
            0 => Ok(()),
            code => Err(Error::ExitCode { code }),
        }
    }
}
