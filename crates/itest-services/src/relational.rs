//! The common face of MySQL and PostgreSQL databases.
//!
//! Icinga DB and Icinga Notifications accept either backend, so their
//! creators take an `Arc<dyn RelationalDatabase>` and only look at the
//! connection data and the backend kind.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Which SQL server a database lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    /// MySQL or MariaDB.
    Mysql,
    /// PostgreSQL.
    Postgresql,
}

impl DatabaseKind {
    /// Database type as Icinga DB and Icinga Notifications spell it.
    pub fn icingadb_type(self) -> &'static str {
        match self {
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Postgresql => "pgsql",
        }
    }

    /// URL scheme of the DSN.
    pub fn driver(self) -> &'static str {
        match self {
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Postgresql => "postgres",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.icingadb_type())
    }
}

/// Connection data of one database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl fmt::Debug for DatabaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// A database provisioned for one test.
#[async_trait]
pub trait RelationalDatabase: Send + Sync + fmt::Debug {
    /// Connection data.
    fn info(&self) -> &DatabaseInfo;

    /// Backend kind.
    fn kind(&self) -> DatabaseKind;

    /// Connection URL for this database.
    fn dsn(&self) -> String;

    /// Imports the Icinga DB schema matching the backend.
    async fn import_icingadb_schema(&self) -> Result<()>;

    /// Imports the Icinga Notifications schema matching the backend.
    async fn import_notifications_schema(&self) -> Result<()>;

    /// Drops the database and its user. Safe to call more than once.
    async fn cleanup(&self) -> Result<()>;

    /// Server host.
    fn host(&self) -> &str {
        &self.info().host
    }

    /// Server port.
    fn port(&self) -> u16 {
        self.info().port
    }

    /// Login user.
    fn username(&self) -> &str {
        &self.info().username
    }

    /// Login password.
    fn password(&self) -> &str {
        &self.info().password
    }

    /// Database name.
    fn database(&self) -> &str {
        &self.info().database
    }

    /// Database type as Icinga DB spells it (`mysql` or `pgsql`).
    fn icingadb_type(&self) -> &'static str {
        self.kind().icingadb_type()
    }

    /// DSN scheme.
    fn driver(&self) -> &'static str {
        self.kind().driver()
    }
}

/// Shared handle to any relational database.
pub type SharedDatabase = Arc<dyn RelationalDatabase>;

/// `DROP` statements for a database and its user.
///
/// Both tolerate objects that are already gone, so a cleanup that failed
/// halfway can simply be run again.
pub(crate) fn drop_statements(info: &DatabaseInfo) -> [String; 2] {
    [
        format!("DROP DATABASE IF EXISTS {}", info.database),
        format!("DROP USER IF EXISTS {}", info.username),
    ]
}
