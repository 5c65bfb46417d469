//! Redis server containers.
//!
//! Unlike the SQL servers, every test gets a whole Redis server: Icinga DB
//! and Icinga 2 assume they own the keyspace.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use itest_core::{LineWriter, ReadinessPolicy, Settings, wait_until_ready};
use itest_docker::{ContainerRuntime, ContainerSpec, Endpoint, ExecRequest, NetworkAttachment, PortDecision};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::container;
use crate::error::Result;
use crate::registry::Running;

/// Redis port inside the container.
pub const REDIS_PORT: u16 = 6379;

/// Builds a server container description.
pub fn container_spec(
    settings: &Settings,
    name: &str,
    network: NetworkAttachment,
    ports: &PortDecision,
) -> ContainerSpec {
    ContainerSpec::new(name, &settings.redis_image)
        .network(network)
        .publish(ports.bindings())
        .label("icinga", "testing")
}

/// `redis://host:port/`
pub fn redis_url(endpoint: &Endpoint) -> String {
    format!("redis://{endpoint}/")
}

struct Shared {
    runtime: Arc<dyn ContainerRuntime>,
    settings: Arc<Settings>,
    prefix: String,
    network_id: String,
    counter: AtomicU32,
    running: Running<RedisServer>,
}

/// Starts Redis servers on demand.
#[derive(Clone)]
pub struct RedisCreator {
    shared: Arc<Shared>,
}

impl RedisCreator {
    /// Creates a creator naming its containers `<prefix>-<n>`.
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

    /// Starts a new server and waits until it answers `PING`.
    pub async fn create_server(&self) -> Result<Arc<RedisServer>> {
        let shared = &self.shared;
        let runtime = &shared.runtime;
        let n = shared.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("{}-{n}", shared.prefix);

        let network = container::attach_to(runtime.as_ref(), &shared.network_id, &[]).await?;
        let ports = PortDecision::new(runtime.daemon(), REDIS_PORT)?;
        let spec = container_spec(&shared.settings, &name, network, &ports);

        let container_id = container::launch(runtime.as_ref(), &spec).await?;
        let endpoint = match ports.endpoint(runtime.as_ref(), &container_id).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                container::discard(runtime.as_ref(), &name, &container_id).await;
                return Err(e.into());
            }
        };

        let ready = async {
            let client = redis::Client::open(redis_url(&endpoint))?;
            wait_until_ready("redis", ReadinessPolicy::REDIS, || {
                let client = client.clone();
                async move {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
                    Ok::<_, redis::RedisError>(pong)
                }
            })
            .await?;
            Ok::<_, crate::Error>(())
        }
        .await;
        if let Err(e) = ready {
            container::discard(runtime.as_ref(), &name, &container_id).await;
            return Err(e);
        }
        info!(container_name = %name, endpoint = %endpoint, "redis server ready");

        let monitor = shared
            .settings
            .redis_monitor
            .then(|| spawn_monitor(Arc::clone(runtime), container_id.clone(), name.clone()));

        let server = Arc::new(RedisServer {
            container_id: container_id.clone(),
            container_name: name,
            endpoint,
            shared: Arc::clone(shared),
            monitor: Mutex::new(monitor),
            cleaned: AtomicBool::new(false),
        });
        shared.running.insert(container_id, Arc::clone(&server));
        Ok(server)
    }

    /// Number of servers not yet cleaned up.
    pub fn running(&self) -> usize {
        self.shared.running.len()
    }

    /// Removes every server still running. Failures are logged.
    pub async fn cleanup(&self) -> Result<()> {
        for server in self.shared.running.snapshot() {
            if let Err(e) = server.cleanup().await {
                error!(container_name = %server.container_name, error = %e, "failed to clean up redis server");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RedisCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCreator")
            .field("prefix", &self.shared.prefix)
            .field("running", &self.shared.running.len())
            .finish()
    }
}

/// Streams `redis-cli monitor` into the debug log until the container goes.
fn spawn_monitor(runtime: Arc<dyn ContainerRuntime>, container_id: String, container_name: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = container_name.clone();
        let stdout = LineWriter::new(move |line: &str| {
            debug!(container_name = %name, command = line, "redis-cli monitor");
        });
        let request = ExecRequest::new(["redis-cli", "monitor"]).stdout(Box::new(stdout));
        if let Err(e) = runtime.exec(&container_id, request).await {
            debug!(container_name = %container_name, error = %e, "redis-cli monitor exited");
        }
    })
}

/// One running Redis server.
pub struct RedisServer {
    container_id: String,
    container_name: String,
    endpoint: Endpoint,
    shared: Arc<Shared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    cleaned: AtomicBool,
}

impl RedisServer {
    /// Server host.
    pub fn host(&self) -> &str {
        &self.endpoint.host
    }

    /// Server port.
    pub fn port(&self) -> u16 {
        self.endpoint.port
    }

    /// Host and port.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// `host:port`
    pub fn address(&self) -> String {
        self.endpoint.to_string()
    }

    /// Name of the server container.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// A client for this server.
    pub fn open(&self) -> Result<redis::Client> {
        Ok(redis::Client::open(redis_url(&self.endpoint))?)
    }

    /// Unregisters the server and removes its container. Safe to call more
    /// than once.
    pub async fn cleanup(&self) -> Result<()> {
        if self.cleaned.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(monitor) = self
            .monitor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            monitor.abort();
        }
        container::remove(&self.shared.runtime, &self.container_name, &self.container_id).await?;
        self.shared.running.remove(&self.container_id);
        self.cleaned.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl fmt::Debug for RedisServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisServer")
            .field("container_name", &self.container_name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
