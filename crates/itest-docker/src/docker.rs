//! [`ContainerRuntime`] backed by the Docker Engine API via bollard.

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    AttachContainerOptions, Config, CreateContainerOptions, KillContainerOptions, LogOutput,
    NetworkingConfig, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, EndpointSettings, HostConfig, Mount, MountTypeEnum, PortBinding};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::demux::route_output;
use crate::error::{Error, Result};
use crate::port::DaemonEndpoint;
use crate::runtime::{ContainerRuntime, ContainerSpec, ExecRequest, OutputSink};

/// Docker Engine client.
#[derive(Clone, Debug)]
pub struct DockerRuntime {
    docker: Docker,
    daemon: DaemonEndpoint,
}

impl DockerRuntime {
    /// Connects using the standard Docker environment (`DOCKER_HOST` and
    /// friends) and verifies the daemon answers.
    pub async fn connect(docker_host: Option<&str>) -> Result<Self> {
        let daemon = DaemonEndpoint::from_docker_host(docker_host)?;
        let docker = Docker::connect_with_defaults()?;
        docker.ping().await?;
        info!(remote = daemon.is_remote(), "connected to docker daemon");
        Ok(Self { docker, daemon })
    }

    /// Wraps an existing bollard client.
    pub fn from_client(docker: Docker, daemon: DaemonEndpoint) -> Self {
        Self { docker, daemon }
    }

    /// The underlying bollard client.
    pub fn client(&self) -> &Docker {
        &self.docker
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInspectResponse> {
        Ok(self.docker.inspect_container(id, None).await?)
    }
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    let mut endpoints = HashMap::new();
    if let Some(network) = &spec.network {
        endpoints.insert(
            network.name.clone(),
            EndpointSettings {
                network_id: Some(network.id.clone()),
                aliases: (!network.aliases.is_empty()).then(|| network.aliases.clone()),
                ..Default::default()
            },
        );
    }

    let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
        .ports
        .iter()
        .map(|p| (format!("{}/tcp", p.container_port), HashMap::new()))
        .collect();

    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
        .ports
        .iter()
        .map(|p| {
            let binding = PortBinding {
                host_ip: Some(p.host_ip.clone()),
                host_port: Some(p.host_port.to_string()),
            };
            (format!("{}/tcp", p.container_port), Some(vec![binding]))
        })
        .collect();

    let mounts: Vec<Mount> = spec
        .mounts
        .iter()
        .map(|m| Mount {
            target: Some(m.target.clone()),
            source: Some(m.source.clone()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect();

    Config {
        image: Some(spec.image.clone()),
        env: Some(spec.env.clone()),
        cmd: spec.cmd.clone(),
        hostname: spec.hostname.clone(),
        labels: Some(spec.labels.clone()),
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            mounts: Some(mounts),
            port_bindings: Some(port_bindings),
            ..Default::default()
        }),
        networking_config: Some(NetworkingConfig {
            endpoints_config: endpoints,
        }),
        ..Default::default()
    }
}

fn first_address(inspect: &ContainerInspectResponse) -> Option<String> {
    inspect
        .network_settings
        .as_ref()?
        .networks
        .as_ref()?
        .values()
        .filter_map(|n| n.ip_address.clone())
        .find(|ip| !ip.is_empty())
}

fn host_port(inspect: &ContainerInspectResponse, container_port: u16) -> Option<u16> {
    inspect
        .network_settings
        .as_ref()?
        .ports
        .as_ref()?
        .get(&format!("{container_port}/tcp"))?
        .as_ref()?
        .iter()
        .filter_map(|b| b.host_port.as_deref())
        .find_map(|p| p.parse().ok())
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn daemon(&self) -> &DaemonEndpoint {
        &self.daemon
    }

    async fn create_network(&self, name: &str, labels: &HashMap<String, String>) -> Result<String> {
        let response = self
            .docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                labels: labels.clone(),
                ..Default::default()
            })
            .await?;
        debug!(network_name = name, network_id = %response.id, "created network");
        Ok(response.id)
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.docker.remove_network(id).await?;
        debug!(network_id = id, "removed network");
        Ok(())
    }

    async fn network_name(&self, id: &str) -> Result<String> {
        let network = self
            .docker
            .inspect_network(id, None::<InspectNetworkOptions<String>>)
            .await?;
        network.name.ok_or_else(|| Error::not_found("network", id))
    }

    async fn network_gateway(&self, id: &str) -> Result<String> {
        let network = self
            .docker
            .inspect_network(id, None::<InspectNetworkOptions<String>>)
            .await?;
        network
            .ipam
            .and_then(|ipam| ipam.config)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.gateway)
            .find(|g| !g.is_empty())
            .ok_or_else(|| Error::NoGateway {
                network: id.to_string(),
            })
    }

    async fn pull_image(&self, image: &str, force: bool) -> Result<()> {
        if !force {
            match self.docker.inspect_image(image).await {
                Ok(_) => {
                    debug!(image, "image already present");
                    return Ok(());
                }
                Err(e) => {
                    let e = Error::from(e);
                    if !e.is_not_found() {
                        return Err(e);
                    }
                }
            }
        }

        info!(image, "pulling image");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            if let Some(status) = progress?.status {
                debug!(image, status = %status, "pull progress");
            }
        }
        debug!(image, "pulled image");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };
        let response = self
            .docker
            .create_container(Some(options), container_config(spec))
            .await?;
        for warning in &response.warnings {
            warn!(container_name = %spec.name, warning = %warning, "docker warning");
        }
        debug!(container_name = %spec.name, container_id = %response.id, "created container");
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        debug!(container_id = id, "started container");
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await?;
        debug!(container_id = id, "removed container");
        Ok(())
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()> {
        self.docker
            .kill_container(id, Some(KillContainerOptions { signal }))
            .await?;
        debug!(container_id = id, signal, "sent signal to container");
        Ok(())
    }

    async fn container_address(&self, id: &str) -> Result<String> {
        let inspect = self.inspect(id).await?;
        first_address(&inspect).ok_or_else(|| Error::NoAddress {
            container: id.to_string(),
        })
    }

    async fn published_port(&self, id: &str, container_port: u16) -> Result<u16> {
        let inspect = self.inspect(id).await?;
        host_port(&inspect, container_port).ok_or_else(|| Error::PortNotPublished {
            container: id.to_string(),
            port: container_port,
        })
    }

    async fn forward_output(&self, id: &str, logs: bool, mut sink: OutputSink) -> Result<()> {
        let attached = self
            .docker
            .attach_container(
                id,
                Some(AttachContainerOptions::<String> {
                    stdout: Some(true),
                    stderr: Some(true),
                    stream: Some(true),
                    logs: Some(logs),
                    ..Default::default()
                }),
            )
            .await?;

        let container_id = id.to_string();
        let mut output = attached.output;
        tokio::spawn(async move {
            while let Some(item) = output.next().await {
                let written = match item {
                    Ok(LogOutput::StdOut { message })
                    | Ok(LogOutput::StdErr { message })
                    | Ok(LogOutput::Console { message }) => sink.write_all(&message),
                    Ok(LogOutput::StdIn { .. }) => Ok(()),
                    Err(e) => {
                        warn!(container_id = %container_id, error = %e, "container output stream failed");
                        break;
                    }
                };
                if let Err(e) = written {
                    warn!(container_id = %container_id, error = %e, "failed to forward container output");
                    break;
                }
            }
            let _ = sink.flush();
        });
        Ok(())
    }

    async fn exec(&self, id: &str, request: ExecRequest) -> Result<()> {
        let ExecRequest {
            cmd,
            stdin,
            stdout,
            stderr,
        } = request;

        debug!(container_id = id, cmd = ?cmd, "executing command in container");

        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(cmd),
                    attach_stdin: Some(stdin.is_some()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        debug!(container_id = id, exec_id = %exec.id, "created exec");

        // Output is always drained, since its end is how completion is detected.
        let mut stdout = stdout.unwrap_or_else(|| Box::new(std::io::sink()));
        let mut stderr = stderr.unwrap_or_else(|| Box::new(std::io::sink()));

        match self.docker.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { output, mut input } => {
                let feed = async {
                    if let Some(data) = stdin {
                        input.write_all(&data).await?;
                        input.shutdown().await?;
                    }
                    Ok::<(), Error>(())
                };
                let drain = route_output(output, &mut *stdout, &mut *stderr);
                tokio::try_join!(feed, drain)?;
            }
            StartExecResults::Detached => {}
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        exec_status(exec.id, inspect.running, inspect.exit_code)
    }
}

/// Judges a finished exec from what `inspect_exec` reported.
///
/// Only an explicit exit status of `0` counts as success.
fn exec_status(exec_id: String, running: Option<bool>, exit_code: Option<i64>) -> Result<()> {
    if running == Some(true) {
        return Err(Error::StillRunning { exec_id });
    }
    match exit_code {
        Some(0) => Ok(()),
        Some(code) => Err(Error::ExitCode { code }),
        None => Err(Error::NoExitCode { exec_id }),
    }
}
