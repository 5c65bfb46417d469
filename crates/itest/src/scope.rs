//! Per-test cleanup.
//!
//! Handles obtained through a [`Scope`] are torn down by
//! [`Scope::cleanup`] instead of living until the harness shuts down. The
//! shared server containers still belong to the [`It`].

use std::fmt;
use std::sync::Arc;

use itest_core::CleanupStack;
use itest_services::{
    Icinga2Node, IcingaDbInstance, IcingaDbOption, IcingaNotifications, MysqlDatabase,
    NotificationsOption, PostgresqlDatabase, RedisServer, RelationalDatabase, SharedDatabase,
    WebhookReceiver,
};
use tracing::{Span, debug};

use crate::error::Result;
use crate::it::It;

/// Handles of one test, cleaned up together.
pub struct Scope<'a> {
    it: &'a It,
    span: Span,
    cleanup: CleanupStack,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(it: &'a It, span: Span) -> Self {
        Self {
            it,
            span,
            cleanup: CleanupStack::new(),
        }
    }

    /// The harness this scope belongs to.
    pub fn it(&self) -> &'a It {
        self.it
    }

    /// The test span; enter it to tag events with the test name.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Number of handles waiting for cleanup.
    pub fn pending(&self) -> usize {
        self.cleanup.len()
    }

    /// See [`It::mysql_database`]. The database and its user are dropped on
    /// cleanup.
    pub async fn mysql_database(&self) -> Result<Arc<MysqlDatabase>> {
        let db = self.it.mysql_database().await?;
        let handle = Arc::clone(&db);
        self.cleanup
            .defer(format!("mysql database {}", db.database()), async move {
                handle.cleanup().await.map_err(anyhow::Error::from)
            });
        Ok(db)
    }

    /// See [`It::postgresql_database`].
    pub async fn postgresql_database(&self) -> Result<Arc<PostgresqlDatabase>> {
        let db = self.it.postgresql_database().await?;
        let handle = Arc::clone(&db);
        self.cleanup
            .defer(format!("postgresql database {}", db.database()), async move {
                handle.cleanup().await.map_err(anyhow::Error::from)
            });
        Ok(db)
    }

    /// See [`It::redis_server`].
    pub async fn redis_server(&self) -> Result<Arc<RedisServer>> {
        let server = self.it.redis_server().await?;
        let handle = Arc::clone(&server);
        self.cleanup
            .defer(format!("redis {}", server.container_name()), async move {
                handle.cleanup().await.map_err(anyhow::Error::from)
            });
        Ok(server)
    }

    /// See [`It::icinga2_node`].
    pub async fn icinga2_node(&self, name: &str) -> Result<Arc<Icinga2Node>> {
        let node = self.it.icinga2_node(name).await?;
        let handle = Arc::clone(&node);
        self.cleanup
            .defer(format!("icinga2 {}", node.container_name()), async move {
                handle.cleanup().await.map_err(anyhow::Error::from)
            });
        Ok(node)
    }

    /// See [`It::icingadb_instance`].
    pub async fn icingadb_instance(
        &self,
        redis: Arc<RedisServer>,
        rdb: SharedDatabase,
        options: &[IcingaDbOption],
    ) -> Result<Arc<IcingaDbInstance>> {
        let instance = self.it.icingadb_instance(redis, rdb, options).await?;
        let handle = Arc::clone(&instance);
        self.cleanup
            .defer(format!("icingadb {}", instance.container_name()), async move {
                handle.cleanup().await.map_err(anyhow::Error::from)
            });
        Ok(instance)
    }

    /// See [`It::notifications_instance`].
    pub async fn notifications_instance(
        &self,
        rdb: SharedDatabase,
        options: &[NotificationsOption],
    ) -> Result<Arc<IcingaNotifications>> {
        let instance = self.it.notifications_instance(rdb, options).await?;
        let handle = Arc::clone(&instance);
        self.cleanup.defer(
            format!("notifications {}", instance.container_name()),
            async move { handle.cleanup().await.map_err(anyhow::Error::from) },
        );
        Ok(instance)
    }

    /// See [`It::webhook_receiver`]. Cleanup stops the receiver right away.
    pub async fn webhook_receiver(&self) -> Result<Arc<WebhookReceiver>> {
        let receiver = self.it.webhook_receiver().await?;
        let handle = Arc::clone(&receiver);
        self.cleanup
            .defer(format!("webhook receiver {}", receiver.local_addr()), async move {
                handle.cleanup().await.map_err(anyhow::Error::from)
            });
        Ok(receiver)
    }

    /// Tears down this scope's handles, newest first.
    pub async fn cleanup(&self) {
        debug!(parent: &self.span, pending = self.cleanup.len(), "cleaning up test scope");
        self.cleanup.run().await;
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("prefix", &self.it.prefix())
            .field("cleanup", &self.cleanup)
            .finish()
    }
}
