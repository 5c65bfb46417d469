//! itest services: Docker-backed creators and typed handles for every
//! service the harness can provision.
//!
//! # Modules
//!
//! - [`mysql`], [`postgresql`]: shared SQL servers with a database per test
//! - [`redis`]: a Redis server per test
//! - [`icinga2`], [`icinga2_client`]: Icinga 2 nodes and their REST API
//! - [`icingadb`]: the Icinga DB daemon under test
//! - [`notifications`], [`webhook`]: Icinga Notifications and a webhook sink
//! - [`relational`], [`schema`], [`pretty`]: database helpers
//! - [`error`]: Error types and Result alias

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod container;
mod registry;

pub mod error;
pub mod icinga2;
pub mod icinga2_client;
pub mod icingadb;
pub mod mysql;
pub mod notifications;
pub mod postgresql;
pub mod pretty;
pub mod redis;
pub mod relational;
pub mod schema;
pub mod webhook;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use icinga2::{Icinga2Creator, Icinga2Node};
pub use icinga2_client::Icinga2Client;
pub use icingadb::{IcingaDbCreator, IcingaDbInstance, IcingaDbOption};
pub use mysql::{MysqlCreator, MysqlDatabase};
pub use notifications::{IcingaNotifications, NotificationsCreator, NotificationsOption};
pub use postgresql::{PostgresqlCreator, PostgresqlDatabase};
pub use pretty::{pretty_select_mysql, pretty_select_postgres};
pub use redis::{RedisCreator, RedisServer};
pub use relational::{DatabaseInfo, DatabaseKind, RelationalDatabase, SharedDatabase};
pub use schema::split_statements;
pub use webhook::WebhookReceiver;
