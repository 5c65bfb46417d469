//! Environment-driven harness configuration.
//!
//! Every setting comes from an `ICINGA_TESTING_*` variable and has a
//! default, so a bare environment still yields a usable [`Settings`].
//! Optional paths stay `None` until set; callers that need them go through
//! [`require_path`].

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Variable naming the Icinga 2 image.
pub const ENV_ICINGA2_IMAGE: &str = "ICINGA_TESTING_ICINGA2_IMAGE";
/// Variable naming the MySQL/MariaDB image.
pub const ENV_MYSQL_IMAGE: &str = "ICINGA_TESTING_MYSQL_IMAGE";
/// Variable naming the PostgreSQL image.
pub const ENV_PGSQL_IMAGE: &str = "ICINGA_TESTING_PGSQL_IMAGE";
/// Variable naming the Redis image.
pub const ENV_REDIS_IMAGE: &str = "ICINGA_TESTING_REDIS_IMAGE";
/// Variable naming the Icinga Notifications image.
pub const ENV_NOTIFICATIONS_IMAGE: &str = "ICINGA_TESTING_NOTIFICATIONS_IMAGE";
/// Variable naming the base image the Icinga DB binary runs in.
pub const ENV_ICINGADB_IMAGE: &str = "ICINGA_TESTING_ICINGADB_IMAGE";
/// Set to `1` to stream `redis-cli monitor` into the debug log.
pub const ENV_REDIS_MONITOR: &str = "ICINGA_TESTING_REDIS_MONITOR";
/// Path of a statically linked Icinga DB binary.
pub const ENV_ICINGADB_BINARY: &str = "ICINGA_TESTING_ICINGADB_BINARY";
/// Icinga DB MySQL schema file.
pub const ENV_ICINGADB_SCHEMA_MYSQL: &str = "ICINGA_TESTING_ICINGADB_SCHEMA_MYSQL";
/// Icinga DB PostgreSQL schema file.
pub const ENV_ICINGADB_SCHEMA_PGSQL: &str = "ICINGA_TESTING_ICINGADB_SCHEMA_PGSQL";
/// Icinga Notifications MySQL schema file.
pub const ENV_NOTIFICATIONS_SCHEMA_MYSQL: &str = "ICINGA_TESTING_NOTIFICATIONS_SCHEMA_MYSQL";
/// Icinga Notifications PostgreSQL schema file.
pub const ENV_NOTIFICATIONS_SCHEMA_PGSQL: &str = "ICINGA_TESTING_NOTIFICATIONS_SCHEMA_PGSQL";
/// JSON debug log destination.
pub const ENV_DEBUG_LOG: &str = "ICINGA_TESTING_DEBUG_LOG";
/// Docker daemon address.
pub const ENV_DOCKER_HOST: &str = "DOCKER_HOST";

/// Harness configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Icinga 2 image.
    pub icinga2_image: String,
    /// MySQL/MariaDB image.
    pub mysql_image: String,
    /// PostgreSQL image.
    pub pgsql_image: String,
    /// Redis image.
    pub redis_image: String,
    /// Icinga Notifications image.
    pub notifications_image: String,
    /// Base image for the Icinga DB binary.
    pub icingadb_image: String,
    /// Stream `redis-cli monitor` output of every Redis server.
    pub redis_monitor: bool,
    /// Icinga DB binary on the host.
    pub icingadb_binary: Option<PathBuf>,
    /// Icinga DB MySQL schema.
    pub icingadb_schema_mysql: Option<PathBuf>,
    /// Icinga DB PostgreSQL schema.
    pub icingadb_schema_pgsql: Option<PathBuf>,
    /// Icinga Notifications MySQL schema.
    pub notifications_schema_mysql: Option<PathBuf>,
    /// Icinga Notifications PostgreSQL schema.
    pub notifications_schema_pgsql: Option<PathBuf>,
    /// JSON debug log file.
    pub debug_log: Option<PathBuf>,
    /// Docker daemon address (`DOCKER_HOST`).
    pub docker_host: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            icinga2_image: "icinga/icinga2:master".to_string(),
            mysql_image: "mysql:latest".to_string(),
            pgsql_image: "postgres:latest".to_string(),
            redis_image: "redis:latest".to_string(),
            notifications_image: "icinga-notifications:latest".to_string(),
            icingadb_image: "alpine:latest".to_string(),
            redis_monitor: false,
            icingadb_binary: None,
            icingadb_schema_mysql: None,
            icingadb_schema_pgsql: None,
            notifications_schema_mysql: None,
            notifications_schema_pgsql: None,
            debug_log: None,
            docker_host: None,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its
    /// value. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let path = |key: &str| get(key).map(PathBuf::from);
        let defaults = Self::default();

        Self {
            icinga2_image: get(ENV_ICINGA2_IMAGE).unwrap_or(defaults.icinga2_image),
            mysql_image: get(ENV_MYSQL_IMAGE).unwrap_or(defaults.mysql_image),
            pgsql_image: get(ENV_PGSQL_IMAGE).unwrap_or(defaults.pgsql_image),
            redis_image: get(ENV_REDIS_IMAGE).unwrap_or(defaults.redis_image),
            notifications_image: get(ENV_NOTIFICATIONS_IMAGE)
                .unwrap_or(defaults.notifications_image),
            icingadb_image: get(ENV_ICINGADB_IMAGE).unwrap_or(defaults.icingadb_image),
            redis_monitor: get(ENV_REDIS_MONITOR).is_some_and(|v| v == "1"),
            icingadb_binary: path(ENV_ICINGADB_BINARY),
            icingadb_schema_mysql: path(ENV_ICINGADB_SCHEMA_MYSQL),
            icingadb_schema_pgsql: path(ENV_ICINGADB_SCHEMA_PGSQL),
            notifications_schema_mysql: path(ENV_NOTIFICATIONS_SCHEMA_MYSQL),
            notifications_schema_pgsql: path(ENV_NOTIFICATIONS_SCHEMA_PGSQL),
            debug_log: path(ENV_DEBUG_LOG),
            docker_host: get(ENV_DOCKER_HOST),
        }
    }
}

/// Returns the value of `key`, or `default` when it is unset or empty.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Unwraps an optional path setting, naming `key` in the error.
pub fn require_path<'a>(key: &str, value: Option<&'a PathBuf>) -> Result<&'a Path> {
    value
        .map(PathBuf::as_path)
        .ok_or_else(|| Error::missing_env(key))
}
