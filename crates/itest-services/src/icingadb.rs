//! Icinga DB daemon containers.
//!
//! The daemon under test is a statically linked binary from the host. It is
//! bind-mounted into a small base image together with a rendered
//! `icingadb.yml`.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use itest_core::Settings;
use itest_docker::{ContainerRuntime, ContainerSpec, Endpoint, NetworkAttachment};
use serde::Serialize;
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

use crate::container;
use crate::error::Result;
use crate::redis::RedisServer;
use crate::registry::Running;
use crate::relational::{RelationalDatabase, SharedDatabase};

/// Binary location inside the container.
pub const BINARY_TARGET: &str = "/icingadb";
/// Config location inside the container.
pub const CONFIG_TARGET: &str = "/icingadb.yml";

/// Tweaks applied to one instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IcingaDbOption {
    /// Raw YAML appended to the rendered config.
    Config(String),
}

impl IcingaDbOption {
    /// Appends raw YAML to the rendered config.
    pub fn config(raw: impl Into<String>) -> Self {
        IcingaDbOption::Config(raw.into())
    }
}

#[derive(Serialize)]
struct ConfigFile<'a> {
    database: DatabaseSection<'a>,
    redis: RedisSection<'a>,
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
struct RedisSection<'a> {
    host: &'a str,
    port: u16,
}

#[derive(Serialize)]
struct LoggingSection<'a> {
    level: &'a str,
}

/// Renders `icingadb.yml` for a Redis server and a database.
pub fn render_config(redis: &Endpoint, rdb: &dyn RelationalDatabase, options: &[IcingaDbOption]) -> Result<String> {
    let file = ConfigFile {
        database: DatabaseSection {
            kind: rdb.icingadb_type(),
            host: rdb.host(),
            port: rdb.port(),
            database: rdb.database(),
            user: rdb.username(),
            password: rdb.password(),
        },
        redis: RedisSection {
            host: &redis.host,
            port: redis.port,
        },
        logging: LoggingSection { level: "debug" },
    };
    let mut out = serde_yaml::to_string(&file)?;
    for option in options {
        match option {
            IcingaDbOption::Config(raw) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(raw);
            }
        }
    }
    Ok(out)
}

/// Builds an instance container description.
pub fn container_spec(
    settings: &Settings,
    name: &str,
    network: NetworkAttachment,
    binary: &Path,
    config: &Path,
) -> ContainerSpec {
    ContainerSpec::new(name, &settings.icingadb_image)
        .cmd([BINARY_TARGET, "--config", CONFIG_TARGET])
        .mount(binary.display().to_string(), BINARY_TARGET, true)
        .mount(config.display().to_string(), CONFIG_TARGET, true)
        .network(network)
        .label("icinga", "testing")
}

struct Shared {
    runtime: Arc<dyn ContainerRuntime>,
    settings: Arc<Settings>,
    prefix: String,
    network_id: String,
    binary: PathBuf,
    counter: AtomicU32,
    running: Running<IcingaDbInstance>,
}

struct Launched {
    container_id: String,
    container_name: String,
    config_file: TempPath,
}

/// Starts Icinga DB instances on demand.
#[derive(Clone)]
pub struct IcingaDbCreator {
    shared: Arc<Shared>,
}

impl IcingaDbCreator {
    /// Creates a creator running `binary`, naming containers `<prefix>-<n>`.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        settings: Arc<Settings>,
        prefix: &str,
        network_id: &str,
        binary: &Path,
    ) -> Result<Self> {
        let binary = std::path::absolute(binary)?;
        Ok(Self {
            shared: Arc::new(Shared {
                runtime,
                settings,
                prefix: prefix.to_string(),
                network_id: network_id.to_string(),
                binary,
                counter: AtomicU32::new(0),
                running: Running::default(),
            }),
        })
    }

    /// Absolute path of the binary being tested.
    pub fn binary(&self) -> &Path {
        &self.shared.binary
    }

    /// Imports the schema into `rdb` and starts an instance syncing `redis`
    /// into it.
    pub async fn create_instance(
        &self,
        redis: Arc<RedisServer>,
        rdb: SharedDatabase,
        options: &[IcingaDbOption],
    ) -> Result<Arc<IcingaDbInstance>> {
        rdb.import_icingadb_schema().await?;
        let launched = self.launch(redis.endpoint(), rdb.as_ref(), options).await?;
        let container_id = launched.container_id.clone();
        let instance = Arc::new(IcingaDbInstance {
            container_id: launched.container_id,
            container_name: launched.container_name,
            config_file: Mutex::new(Some(launched.config_file)),
            redis,
            rdb,
            runtime: Arc::clone(&self.shared.runtime),
            running: self.shared.running.clone(),
            cleaned: AtomicBool::new(false),
        });
        self.shared.running.insert(container_id, Arc::clone(&instance));
        Ok(instance)
    }

    async fn launch(
        &self,
        redis: &Endpoint,
        rdb: &dyn RelationalDatabase,
        options: &[IcingaDbOption],
    ) -> Result<Launched> {
        let shared = &self.shared;
        let runtime = &shared.runtime;

        let config = render_config(redis, rdb, options)?;
        let mut file = tempfile::Builder::new()
            .prefix("icingadb")
            .suffix(".yml")
            .tempfile()?;
        file.write_all(config.as_bytes())?;
        file.flush()?;
        let config_file = file.into_temp_path();

        let n = shared.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let container_name = format!("{}-{n}", shared.prefix);
        let network = container::attach_to(runtime.as_ref(), &shared.network_id, &[]).await?;
        let spec = container_spec(&shared.settings, &container_name, network, &shared.binary, &config_file);

        let container_id = container::launch(runtime.as_ref(), &spec).await?;
        info!(container_name = %container_name, container_id = %container_id, "started icingadb");
        Ok(Launched {
            container_id,
            container_name,
            config_file,
        })
    }

    /// Number of instances not yet cleaned up.
    pub fn running(&self) -> usize {
        self.shared.running.len()
    }

    /// Stops every instance still running. Failures are logged.
    pub async fn cleanup(&self) -> Result<()> {
        for instance in self.shared.running.snapshot() {
            if let Err(e) = instance.cleanup().await {
                error!(container_name = %instance.container_name, error = %e, "failed to clean up icingadb instance");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for IcingaDbCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcingaDbCreator")
            .field("prefix", &self.shared.prefix)
            .field("binary", &self.shared.binary)
            .finish()
    }
}

/// One running Icinga DB daemon.
pub struct IcingaDbInstance {
    container_id: String,
    container_name: String,
    config_file: Mutex<Option<TempPath>>,
    redis: Arc<RedisServer>,
    rdb: SharedDatabase,
    runtime: Arc<dyn ContainerRuntime>,
    running: Running<IcingaDbInstance>,
    cleaned: AtomicBool,
}

impl IcingaDbInstance {
    /// Redis server the instance reads from.
    pub fn redis(&self) -> &Arc<RedisServer> {
        &self.redis
    }

    /// Database the instance writes to.
    pub fn rdb(&self) -> &SharedDatabase {
        &self.rdb
    }

    /// Name of the instance container.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Removes the container and the rendered config. Safe to call more
    /// than once.
    pub async fn cleanup(&self) -> Result<()> {
        if self.cleaned.load(Ordering::SeqCst) {
            return Ok(());
        }
        container::remove(&self.runtime, &self.container_name, &self.container_id).await?;
        self.running.remove(&self.container_id);
        self.cleaned.store(true, Ordering::SeqCst);

        let config_file = self
            .config_file
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(path) = config_file {
            if let Err(e) = path.close() {
                warn!(container_name = %self.container_name, error = %e, "failed to delete icingadb config");
            } else {
                debug!(container_name = %self.container_name, "deleted icingadb config");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for IcingaDbInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcingaDbInstance")
            .field("container_name", &self.container_name)
            .field("redis", &self.redis)
            .field("rdb", &self.rdb)
            .finish()
    }
}
