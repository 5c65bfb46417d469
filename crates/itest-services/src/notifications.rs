//! Icinga Notifications daemon containers.
//!
//! The daemon is configured entirely through `ICINGA_NOTIFICATIONS_*`
//! environment variables derived from the database it uses.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use itest_core::Settings;
use itest_docker::{ContainerRuntime, ContainerSpec, NetworkAttachment};
use serde::Serialize;
use tracing::{error, info};

use crate::container;
use crate::error::Result;
use crate::registry::Running;
use crate::relational::{RelationalDatabase, SharedDatabase};

/// Port of the web listener.
pub const NOTIFICATIONS_PORT: u16 = 5680;

/// Environment variable prefix understood by the daemon.
pub const ENV_PREFIX: &str = "ICINGA_NOTIFICATIONS_";

/// Tweaks applied to one instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotificationsOption {
    /// Sets or overrides an environment entry.
    Env(String, String),
    /// Raw YAML kept alongside the instance.
    Config(String),
}

impl NotificationsOption {
    /// Sets or overrides environment variable `key`.
    pub fn env(key: impl Into<String>, value: impl Into<String>) -> Self {
        NotificationsOption::Env(key.into(), value.into())
    }

    /// Adds raw YAML configuration.
    pub fn config(raw: impl Into<String>) -> Self {
        NotificationsOption::Config(raw.into())
    }
}

/// The environment every instance starts with.
pub fn default_env(rdb: &dyn RelationalDatabase, listen: &str) -> BTreeMap<String, String> {
    let entries = [
        ("LISTEN", listen.to_string()),
        ("DATABASE_TYPE", rdb.icingadb_type().to_string()),
        ("DATABASE_HOST", rdb.host().to_string()),
        ("DATABASE_PORT", rdb.port().to_string()),
        ("DATABASE_DATABASE", rdb.database().to_string()),
        ("DATABASE_USER", rdb.username().to_string()),
        ("DATABASE_PASSWORD", rdb.password().to_string()),
        ("LOGGING_LEVEL", "debug".to_string()),
    ];
    entries
        .into_iter()
        .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v))
        .collect()
}

#[derive(Serialize)]
struct ConfigFile<'a> {
    listen: &'a str,
    database: DatabaseSection<'a>,
    logging: LoggingSection<'a>,
}

#[derive(Serialize)]
struct DatabaseSection<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    host: &'a str,
    port: u16,
    database: &'a str,
    user: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoggingSection<'a> {
    level: &'a str,
}

/// Builds an instance container description.
pub fn container_spec(
    settings: &Settings,
    name: &str,
    network: NetworkAttachment,
    env: &BTreeMap<String, String>,
) -> ContainerSpec {
    env.iter()
        .fold(ContainerSpec::new(name, &settings.notifications_image), |spec, (k, v)| {
            spec.env(k, v)
        })
        .network(network)
        .label("icinga", "testing")
}

struct Shared {
    runtime: Arc<dyn ContainerRuntime>,
    settings: Arc<Settings>,
    prefix: String,
    network_id: String,
    counter: AtomicU32,
    running: Running<IcingaNotifications>,
}

/// Starts Icinga Notifications instances on demand.
#[derive(Clone)]
pub struct NotificationsCreator {
    shared: Arc<Shared>,
}

impl NotificationsCreator {
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

    /// Starts an instance using `rdb`.
    ///
    /// The schema is not imported here; call
    /// [`RelationalDatabase::import_notifications_schema`] first.
    pub async fn create_instance(
        &self,
        rdb: SharedDatabase,
        options: &[NotificationsOption],
    ) -> Result<Arc<IcingaNotifications>> {
        let shared = &self.shared;
        let runtime = &shared.runtime;

        let mut env = default_env(rdb.as_ref(), &format!(":{NOTIFICATIONS_PORT}"));
        let mut config = String::new();
        for option in options {
            match option {
                NotificationsOption::Env(k, v) => {
                    env.insert(k.clone(), v.clone());
                }
                NotificationsOption::Config(raw) => config.push_str(raw),
            }
        }

        let n = shared.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let container_name = format!("{}-{n}", shared.prefix);
        let network = container::attach_to(runtime.as_ref(), &shared.network_id, &[]).await?;
        let spec = container_spec(&shared.settings, &container_name, network, &env);

        let container_id = container::launch(runtime.as_ref(), &spec).await?;
        let host = match runtime.container_address(&container_id).await {
            Ok(host) => host,
            Err(e) => {
                container::discard(runtime.as_ref(), &container_name, &container_id).await;
                return Err(e.into());
            }
        };
        info!(container_name = %container_name, host = %host, "started icinga notifications");

        let instance = Arc::new(IcingaNotifications {
            host,
            port: NOTIFICATIONS_PORT,
            rdb,
            env,
            config,
            container_id: container_id.clone(),
            container_name,
            runtime: Arc::clone(runtime),
            running: shared.running.clone(),
            cleaned: AtomicBool::new(false),
        });
        shared.running.insert(container_id, Arc::clone(&instance));
        Ok(instance)
    }

    /// Number of instances not yet cleaned up.
    pub fn running(&self) -> usize {
        self.shared.running.len()
    }

    /// Stops every instance still running. Failures are logged.
    pub async fn cleanup(&self) -> Result<()> {
        for instance in self.shared.running.snapshot() {
            if let Err(e) = instance.cleanup().await {
                error!(container_name = %instance.container_name, error = %e, "failed to clean up icinga notifications");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NotificationsCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationsCreator")
            .field("prefix", &self.shared.prefix)
            .field("running", &self.shared.running.len())
            .finish()
    }
}

/// One running Icinga Notifications daemon.
pub struct IcingaNotifications {
    host: String,
    port: u16,
    rdb: SharedDatabase,
    env: BTreeMap<String, String>,
    config: String,
    container_id: String,
    container_name: String,
    runtime: Arc<dyn ContainerRuntime>,
    running: Running<IcingaNotifications>,
    cleaned: AtomicBool,
}

impl IcingaNotifications {
    /// Listener host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Listener port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database the daemon uses.
    pub fn rdb(&self) -> &SharedDatabase {
        &self.rdb
    }

    /// Raw YAML passed through options.
    pub fn config(&self) -> &str {
        &self.config
    }

    /// Environment the container was started with.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Name of the instance container.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// The daemon configuration as YAML, followed by the raw option config.
    pub fn render_config(&self) -> Result<String> {
        let rdb = self.rdb.as_ref();
        let listen = format!(":{}", self.port);
        let file = ConfigFile {
            listen: &listen,
            database: DatabaseSection {
                kind: rdb.icingadb_type(),
                host: rdb.host(),
                port: rdb.port(),
                database: rdb.database(),
                user: rdb.username(),
                password: rdb.password(),
            },
            logging: LoggingSection { level: "debug" },
        };
        let mut out = serde_yaml::to_string(&file)?;
        if !self.config.is_empty() {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.config);
        }
        Ok(out)
    }

    /// Unregisters the instance and removes its container. Safe to call
    /// more than once.
    pub async fn cleanup(&self) -> Result<()> {
        if self.cleaned.load(Ordering::SeqCst) {
            return Ok(());
        }
        container::remove(&self.runtime, &self.container_name, &self.container_id).await?;
        self.running.remove(&self.container_id);
        self.cleaned.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl fmt::Debug for IcingaNotifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcingaNotifications")
            .field("container_name", &self.container_name)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}
