//! Icinga 2 node containers.
//!
//! Every node runs as a standalone master. Right after start the stock
//! `conf.d` objects are replaced by a single API user, so tests start from a
//! known, empty configuration.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use itest_core::{LineWriter, ReadinessPolicy, Settings, wait_until_ready};
use itest_docker::{ContainerRuntime, ContainerSpec, Endpoint, ExecRequest, NetworkAttachment, PortDecision, log_sink};
use tracing::{Level, debug, error, info};

use crate::container;
use crate::error::{Error, Result};
use crate::icinga2_client::{DEFAULT_PASSWORD, DEFAULT_USERNAME, Icinga2Client};
use crate::redis::RedisServer;
use crate::registry::Running;

/// Icinga 2 API port.
pub const ICINGA2_PORT: u16 = 5665;

/// Config file holding the API user.
pub const API_USER_CONFIG: &str = "etc/icinga2/conf.d/icinga-testing-api-user.conf";
/// Config file of the Icinga DB feature.
pub const ICINGADB_FEATURE_CONFIG: &str = "etc/icinga2/features-available/icingadb.conf";

/// Builds a node container description.
pub fn container_spec(
    settings: &Settings,
    container_name: &str,
    node_name: &str,
    network: NetworkAttachment,
    ports: &PortDecision,
) -> ContainerSpec {
    ContainerSpec::new(container_name, &settings.icinga2_image)
        .hostname(node_name)
        .env("ICINGA_MASTER", "1")
        .network(network)
        .publish(ports.bindings())
        .label("icinga", "testing")
}

/// The `ApiUser` object granting `username` every permission.
pub fn api_user_config(username: &str, password: &str) -> String {
    format!(
        "object ApiUser {username:?} {{\n\tpassword = {password:?}\n\tpermissions = [\"*\"]\n}}\n"
    )
}

/// The `IcingaDB` feature object pointing at a Redis server.
pub fn icingadb_feature_config(redis: &Endpoint) -> String {
    format!(
        "object IcingaDB \"icingadb\" {{\n\thost = {:?}\n\tport = {}\n}}\n",
        redis.host, redis.port
    )
}

struct Shared {
    runtime: Arc<dyn ContainerRuntime>,
    settings: Arc<Settings>,
    prefix: String,
    network_id: String,
    counter: AtomicU32,
    running: Running<Icinga2Node>,
}

/// Starts Icinga 2 nodes on demand.
#[derive(Clone)]
pub struct Icinga2Creator {
    shared: Arc<Shared>,
}

impl Icinga2Creator {
    /// Creates a creator naming its containers `<prefix>-<n>-<node>`.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        settings: Arc<Settings>,
        prefix: &str,
        network_id: &str,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                runtime,
                settings,
                prefix: prefix.to_string(),
                network_id: network_id.to_string(),
                counter: AtomicU32::new(0),
                running: Running::default(),
            }),
        }
    }

    /// Starts node `name`, waits for its API and installs the initial config.
    pub async fn create_node(&self, name: &str) -> Result<Arc<Icinga2Node>> {
        let shared = &self.shared;
        let runtime = &shared.runtime;
        let n = shared.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let container_name = format!("{}-{n}-{name}", shared.prefix);

        let network = container::attach_to(runtime.as_ref(), &shared.network_id, &[]).await?;
        let ports = PortDecision::new(runtime.daemon(), ICINGA2_PORT)?;
        let spec = container_spec(&shared.settings, &container_name, name, network, &ports);

        let container_id = container::launch(runtime.as_ref(), &spec).await?;

        let setup = async {
            let endpoint = ports.endpoint(runtime.as_ref(), &container_id).await?;
            let node = Icinga2Node::new(
                Arc::clone(runtime),
                name,
                &container_id,
                &container_name,
                endpoint,
                None,
            )?;
            node.wait_for_api().await?;
            node.write_initial_config().await?;
            node.reload().await?;
            Ok::<_, crate::Error>(node)
        }
        .await;

        let mut node = match setup {
            Ok(node) => node,
            Err(e) => {
                container::discard(runtime.as_ref(), &container_name, &container_id).await;
                return Err(e);
            }
        };
        node.running = Some(shared.running.clone());
        info!(container_name = %container_name, endpoint = %node.endpoint, "icinga2 node ready");

        let node = Arc::new(node);
        shared.running.insert(container_id, Arc::clone(&node));
        Ok(node)
    }

    /// Number of nodes not yet cleaned up.
    pub fn running(&self) -> usize {
        self.shared.running.len()
    }

    /// Removes every node still running. Failures are logged.
    pub async fn cleanup(&self) -> Result<()> {
        for node in self.shared.running.snapshot() {
            if let Err(e) = node.cleanup().await {
                error!(container_name = %node.container_name, error = %e, "failed to clean up icinga2 node");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Icinga2Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Icinga2Creator")
            .field("prefix", &self.shared.prefix)
            .field("running", &self.shared.running.len())
            .finish()
    }
}

/// One running Icinga 2 node.
pub struct Icinga2Node {
    name: String,
    container_id: String,
    container_name: String,
    endpoint: Endpoint,
    runtime: Arc<dyn ContainerRuntime>,
    client: Icinga2Client,
    running: Option<Running<Icinga2Node>>,
    cleaned: AtomicBool,
}

impl Icinga2Node {
    /// Wraps an already started container. `api_base_url` overrides the
    /// HTTPS URL derived from `endpoint`.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        name: &str,
        container_id: &str,
        container_name: &str,
        endpoint: Endpoint,
        api_base_url: Option<String>,
    ) -> Result<Self> {
        let client = match api_base_url {
            Some(base) => Icinga2Client::with_base_url(base, DEFAULT_USERNAME, DEFAULT_PASSWORD)?,
            None => Icinga2Client::new(&endpoint.to_string(), DEFAULT_USERNAME, DEFAULT_PASSWORD)?,
        };
        Ok(Self {
            name: name.to_string(),
            container_id: container_id.to_string(),
            container_name: container_name.to_string(),
            endpoint,
            runtime,
            client,
            running: None,
            cleaned: AtomicBool::new(false),
        })
    }

    /// Node name, also its hostname.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// API host.
    pub fn host(&self) -> &str {
        &self.endpoint.host
    }

    /// API port.
    pub fn port(&self) -> u16 {
        self.endpoint.port
    }

    /// Name of the node container.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// API client authenticated as the default API user.
    pub fn api_client(&self) -> Icinga2Client {
        self.client.clone()
    }

    /// Sends `SIGHUP`, which makes Icinga 2 reload its configuration.
    pub async fn trigger_reload(&self) -> Result<()> {
        self.runtime.kill_container(&self.container_id, "HUP").await?;
        debug!(container_name = %self.container_name, "sent reload signal to icinga2");
        Ok(())
    }

    /// Triggers a reload and waits until the new process answers the API.
    ///
    /// If the start time of the old process cannot be read, any answer from
    /// the API counts as reloaded.
    pub async fn reload(&self) -> Result<()> {
        let before = self.client.program_start().await.ok();
        self.trigger_reload().await?;
        match before {
            Some(before) => self.wait_for_restart(before).await,
            None => self.wait_for_api().await,
        }
    }

    async fn wait_for_restart(&self, before: f64) -> Result<()> {
        let client = &self.client;
        let container = self.container_name.as_str();
        wait_until_ready("icinga2 reload", ReadinessPolicy::ICINGA2, move || async move {
            let started = client.program_start().await?;
            if started > before {
                Ok::<_, Error>(started)
            } else {
                Err(Error::NotReloaded {
                    container: container.to_string(),
                })
            }
        })
        .await?;
        debug!(container_name = %self.container_name, "icinga2 reloaded");
        Ok(())
    }

    async fn wait_for_api(&self) -> Result<()> {
        let client = &self.client;
        wait_until_ready("icinga2", ReadinessPolicy::ICINGA2, move || client.ping()).await?;
        Ok(())
    }

    /// Writes `data` to `file`, relative to the container root.
    pub async fn write_config(&self, file: &str, data: &[u8]) -> Result<()> {
        let container_name = self.container_name.clone();
        let target = file.to_string();
        let stderr = LineWriter::new(move |line: &str| {
            error!(container_name = %container_name, file = %target, line, "error from container while writing file");
        });
        let request = ExecRequest::new(["tee".to_string(), format!("/{file}")])
            .stdin(data.to_vec())
            .stderr(Box::new(stderr));
        self.runtime.exec(&self.container_id, request).await?;
        debug!(container_name = %self.container_name, file, "wrote config file");
        Ok(())
    }

    /// Deletes every file matching `glob`, relative to the container root.
    pub async fn delete_config_glob(&self, glob: &str) -> Result<()> {
        let request = ExecRequest::new(["sh".to_string(), "-c".to_string(), format!("rm -f /{glob}")])
            .stderr(log_sink(self.container_name.clone(), Level::ERROR));
        self.runtime.exec(&self.container_id, request).await?;
        Ok(())
    }

    async fn write_initial_config(&self) -> Result<()> {
        self.delete_config_glob("etc/icinga2/conf.d/*.conf").await?;
        self.write_config(
            API_USER_CONFIG,
            api_user_config(DEFAULT_USERNAME, DEFAULT_PASSWORD).as_bytes(),
        )
        .await
    }

    /// Points the Icinga DB feature at `redis` and enables it. Takes effect
    /// on the next reload.
    pub async fn enable_icingadb(&self, redis: &RedisServer) -> Result<()> {
        self.enable_icingadb_at(redis.endpoint()).await
    }

    /// Like [`enable_icingadb`](Self::enable_icingadb) for an explicit Redis
    /// endpoint.
    pub async fn enable_icingadb_at(&self, redis: &Endpoint) -> Result<()> {
        self.write_config(ICINGADB_FEATURE_CONFIG, icingadb_feature_config(redis).as_bytes())
            .await?;
        let request = ExecRequest::new(["icinga2", "feature", "enable", "icingadb"])
            .stdout(log_sink(self.container_name.clone(), Level::DEBUG))
            .stderr(log_sink(self.container_name.clone(), Level::ERROR));
        self.runtime.exec(&self.container_id, request).await?;
        Ok(())
    }

    /// Removes the node container. Safe to call more than once.
    pub async fn cleanup(&self) -> Result<()> {
        if self.cleaned.load(Ordering::SeqCst) {
            return Ok(());
        }
        container::remove(&self.runtime, &self.container_name, &self.container_id).await?;
        if let Some(running) = &self.running {
            running.remove(&self.container_id);
        }
        self.cleaned.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl fmt::Debug for Icinga2Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Icinga2Node")
            .field("name", &self.name)
            .field("container_name", &self.container_name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
