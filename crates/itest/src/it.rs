//! The harness entry point.
//!
//! An [`It`] owns one Docker network named after a random prefix. Service
//! creators are started the first time a test asks for their service and
//! live until [`It::cleanup`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use itest_core::settings::{ENV_ICINGADB_BINARY, require_path};
use itest_core::{CleanupStack, Settings, random_string};
use itest_docker::{ContainerRuntime, DockerRuntime, Endpoint, free_tcp_port};
use itest_services::{
    Icinga2Creator, Icinga2Node, IcingaDbCreator, IcingaDbInstance, IcingaDbOption,
    IcingaNotifications, MysqlCreator, MysqlDatabase, NotificationsCreator, NotificationsOption,
    PostgresqlCreator, PostgresqlDatabase, RedisCreator, RedisServer, SharedDatabase,
    WebhookReceiver,
};
use tokio::sync::OnceCell;
use tracing::{Span, info, info_span};

use crate::error::{Error, Result};
use crate::logging;
use crate::scope::Scope;

/// Prefix of every network and container name.
pub const NAME_PREFIX: &str = "icinga-testing-";

/// Label put on the network.
pub const LABEL: (&str, &str) = ("icinga", "testing");

/// One harness instance, usually shared by all tests of a binary.
pub struct It {
    settings: Arc<Settings>,
    runtime: Arc<dyn ContainerRuntime>,
    prefix: String,
    network_id: String,
    cleanup: CleanupStack,
    mysql: OnceCell<MysqlCreator>,
    postgresql: OnceCell<PostgresqlCreator>,
    redis: OnceCell<RedisCreator>,
    icinga2: OnceCell<Icinga2Creator>,
    icingadb: OnceCell<IcingaDbCreator>,
    notifications: OnceCell<NotificationsCreator>,
}

impl It {
    /// Reads [`Settings`] from the environment and sets up the harness.
    pub async fn new() -> Result<Self> {
        Self::with_settings(Settings::from_env()).await
    }

    /// Installs logging, connects to Docker and creates the network.
    pub async fn with_settings(settings: Settings) -> Result<Self> {
        logging::init(settings.debug_log.as_deref())?;
        let runtime = DockerRuntime::connect(settings.docker_host.as_deref()).await?;
        Self::with_runtime(Arc::new(runtime), settings).await
    }

    /// Sets up the harness on an existing runtime. Logging is left alone.
    pub async fn with_runtime(runtime: Arc<dyn ContainerRuntime>, settings: Settings) -> Result<Self> {
        let prefix = format!("{NAME_PREFIX}{}", random_string(8));
        let labels = HashMap::from([(LABEL.0.to_string(), LABEL.1.to_string())]);
        let network_id = runtime.create_network(&prefix, &labels).await?;
        info!(network_id = %network_id, prefix = %prefix, "created test network");

        let cleanup = CleanupStack::new();
        let network_runtime = Arc::clone(&runtime);
        let id = network_id.clone();
        cleanup.defer("network", async move {
            network_runtime
                .remove_network(&id)
                .await
                .map_err(anyhow::Error::from)
        });

        Ok(Self {
            settings: Arc::new(settings),
            runtime,
            prefix,
            network_id,
            cleanup,
            mysql: OnceCell::new(),
            postgresql: OnceCell::new(),
            redis: OnceCell::new(),
            icinga2: OnceCell::new(),
            icingadb: OnceCell::new(),
            notifications: OnceCell::new(),
        })
    }

    /// Settings in effect.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// `icinga-testing-<random>`, shared by all names this harness creates.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// ID of the test network.
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// The container runtime.
    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// A span carrying a `testcase` field. Enter it inside a test so its
    /// events can be told apart in the debug log.
    pub fn test_span(&self, name: &str) -> Span {
        info_span!("test", testcase = name)
    }

    /// A cleanup scope for one test.
    pub fn scope(&self, name: &str) -> Scope<'_> {
        Scope::new(self, self.test_span(name))
    }

    fn child_name(&self, service: &str) -> String {
        format!("{}-{service}", self.prefix)
    }

    /// A new database on the shared MySQL server.
    pub async fn mysql_database(&self) -> Result<Arc<MysqlDatabase>> {
        Ok(self.mysql().await?.create_database().await?)
    }

    /// A new database on the shared PostgreSQL server.
    pub async fn postgresql_database(&self) -> Result<Arc<PostgresqlDatabase>> {
        Ok(self.postgresql().await?.create_database().await?)
    }

    /// A new Redis server.
    pub async fn redis_server(&self) -> Result<Arc<RedisServer>> {
        Ok(self.redis().await.create_server().await?)
    }

    /// A new Icinga 2 node called `name`, with its API ready.
    pub async fn icinga2_node(&self, name: &str) -> Result<Arc<Icinga2Node>> {
        Ok(self.icinga2().await.create_node(name).await?)
    }

    /// A new Icinga DB daemon syncing `redis` into `rdb`.
    ///
    /// Fails with a configuration error unless
    /// `ICINGA_TESTING_ICINGADB_BINARY` is set.
    pub async fn icingadb_instance(
        &self,
        redis: Arc<RedisServer>,
        rdb: SharedDatabase,
        options: &[IcingaDbOption],
    ) -> Result<Arc<IcingaDbInstance>> {
        Ok(self
            .icingadb()
            .await?
            .create_instance(redis, rdb, options)
            .await?)
    }

    /// A new Icinga Notifications daemon using `rdb`.
    pub async fn notifications_instance(
        &self,
        rdb: SharedDatabase,
        options: &[NotificationsOption],
    ) -> Result<Arc<IcingaNotifications>> {
        Ok(self
            .notifications()
            .await
            .create_instance(rdb, options)
            .await?)
    }

    /// A webhook receiver on a free port of the network gateway, so that
    /// containers can reach it.
    pub async fn webhook_receiver(&self) -> Result<Arc<WebhookReceiver>> {
        let gateway = self.runtime.network_gateway(&self.network_id).await?;
        let listen = Endpoint {
            host: gateway,
            port: free_tcp_port()?,
        };
        let receiver = Arc::new(WebhookReceiver::launch(listen.to_string()).await?);
        let handle = Arc::clone(&receiver);
        self.cleanup
            .defer(format!("webhook receiver {listen}"), async move {
                handle.cleanup().await.map_err(anyhow::Error::from)
            });
        Ok(receiver)
    }

    /// Tears down everything this harness created, newest first. Failures
    /// are logged.
    pub async fn cleanup(&self) {
        self.cleanup.run().await;
        info!(prefix = %self.prefix, "cleaned up test environment");
    }

    async fn mysql(&self) -> Result<&MysqlCreator> {
        self.mysql
            .get_or_try_init(|| async {
                let creator = MysqlCreator::start(
                    Arc::clone(&self.runtime),
                    Arc::clone(&self.settings),
                    &self.child_name("mysql"),
                    &self.network_id,
                )
                .await?;
                let handle = creator.clone();
                self.cleanup.defer("mysql", async move {
                    handle.cleanup().await.map_err(anyhow::Error::from)
                });
                Ok::<_, Error>(creator)
            })
            .await
    }

    async fn postgresql(&self) -> Result<&PostgresqlCreator> {
        self.postgresql
            .get_or_try_init(|| async {
                let creator = PostgresqlCreator::start(
                    Arc::clone(&self.runtime),
                    Arc::clone(&self.settings),
                    &self.child_name("postgresql"),
                    &self.network_id,
                )
                .await?;
                let handle = creator.clone();
                self.cleanup.defer("postgresql", async move {
                    handle.cleanup().await.map_err(anyhow::Error::from)
                });
                Ok::<_, Error>(creator)
            })
            .await
    }

    async fn redis(&self) -> &RedisCreator {
        self.redis
            .get_or_init(|| async {
                let creator = RedisCreator::new(
                    Arc::clone(&self.runtime),
                    Arc::clone(&self.settings),
                    &self.child_name("redis"),
                    &self.network_id,
                );
                let handle = creator.clone();
                self.cleanup.defer("redis", async move {
                    handle.cleanup().await.map_err(anyhow::Error::from)
                });
                creator
            })
            .await
    }

    async fn icinga2(&self) -> &Icinga2Creator {
        self.icinga2
            .get_or_init(|| async {
                let creator = Icinga2Creator::new(
                    Arc::clone(&self.runtime),
                    Arc::clone(&self.settings),
                    &self.child_name("icinga2"),
                    &self.network_id,
                );
                let handle = creator.clone();
                self.cleanup.defer("icinga2", async move {
                    handle.cleanup().await.map_err(anyhow::Error::from)
                });
                creator
            })
            .await
    }

    async fn icingadb(&self) -> Result<&IcingaDbCreator> {
        self.icingadb
            .get_or_try_init(|| async {
                let binary = require_path(ENV_ICINGADB_BINARY, self.settings.icingadb_binary.as_ref())?;
                let creator = IcingaDbCreator::new(
                    Arc::clone(&self.runtime),
                    Arc::clone(&self.settings),
                    &self.child_name("icingadb"),
                    &self.network_id,
                    binary,
                )?;
                let handle = creator.clone();
                self.cleanup.defer("icingadb", async move {
                    handle.cleanup().await.map_err(anyhow::Error::from)
                });
                Ok::<_, Error>(creator)
            })
            .await
    }

    async fn notifications(&self) -> &NotificationsCreator {
        self.notifications
            .get_or_init(|| async {
                let creator = NotificationsCreator::new(
                    Arc::clone(&self.runtime),
                    Arc::clone(&self.settings),
                    &self.child_name("notifications"),
                    &self.network_id,
                );
                let handle = creator.clone();
                self.cleanup.defer("notifications", async move {
                    handle.cleanup().await.map_err(anyhow::Error::from)
                });
                creator
            })
            .await
    }
}

impl fmt::Debug for It {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("It")
            .field("prefix", &self.prefix)
            .field("network_id", &self.network_id)
            .field("cleanup", &self.cleanup)
            .finish()
    }
}
