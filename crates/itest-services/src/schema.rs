//! SQL schema import.
//!
//! Schema files are plain DDL scripts. They are split into statements the
//! same way the Icinga DB container entrypoint does it: comment lines are
//! dropped and a `;` at the end of a line terminates a statement.

use std::path::Path;
use std::sync::LazyLock;

use itest_core::Settings;
use itest_core::settings::{
    ENV_ICINGADB_SCHEMA_MYSQL, ENV_ICINGADB_SCHEMA_PGSQL, ENV_NOTIFICATIONS_SCHEMA_MYSQL,
    ENV_NOTIFICATIONS_SCHEMA_PGSQL, require_path,
};
use regex::Regex;
use sqlx::{MySqlPool, PgPool};
use tracing::{debug, info};

use crate::error::{Error, Result, mysql_error_number};
use crate::relational::DatabaseKind;

/// MySQL "table already exists".
pub const MYSQL_TABLE_EXISTS: u16 = 1050;

#[allow(clippy::expect_used)]
static SQL_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^--.*").expect("Invalid SQL comment regex"));

#[allow(clippy::expect_used)]
static SQL_STATEMENT_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m);$").expect("Invalid SQL statement separator regex"));

/// Which product a schema belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schema {
    /// Icinga DB.
    IcingaDb,
    /// Icinga Notifications.
    Notifications,
}

impl Schema {
    /// Environment variable holding the schema path for `kind`.
    pub fn env_key(self, kind: DatabaseKind) -> &'static str {
        match (self, kind) {
            (Schema::IcingaDb, DatabaseKind::Mysql) => ENV_ICINGADB_SCHEMA_MYSQL,
            (Schema::IcingaDb, DatabaseKind::Postgresql) => ENV_ICINGADB_SCHEMA_PGSQL,
            (Schema::Notifications, DatabaseKind::Mysql) => ENV_NOTIFICATIONS_SCHEMA_MYSQL,
            (Schema::Notifications, DatabaseKind::Postgresql) => ENV_NOTIFICATIONS_SCHEMA_PGSQL,
        }
    }

    /// The configured schema file for `kind`.
    pub fn path(self, settings: &Settings, kind: DatabaseKind) -> Result<&Path> {
        let value = match (self, kind) {
            (Schema::IcingaDb, DatabaseKind::Mysql) => settings.icingadb_schema_mysql.as_ref(),
            (Schema::IcingaDb, DatabaseKind::Postgresql) => settings.icingadb_schema_pgsql.as_ref(),
            (Schema::Notifications, DatabaseKind::Mysql) => {
                settings.notifications_schema_mysql.as_ref()
            }
            (Schema::Notifications, DatabaseKind::Postgresql) => {
                settings.notifications_schema_pgsql.as_ref()
            }
        };
        Ok(require_path(self.env_key(kind), value)?)
    }
}

/// Splits a DDL script into individual statements.
pub fn split_statements(text: &str) -> Vec<String> {
    let without_comments = SQL_COMMENT.replace_all(text, "");
    SQL_STATEMENT_END
        .split(&without_comments)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads the schema file at `path`.
pub async fn read_schema(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Schema {
            path: path.display().to_string(),
            source,
        })
}

/// Runs every statement of `text` against a MySQL database.
///
/// Stops without error at the first "table already exists", which means the
/// schema is already in place.
pub async fn import_mysql(pool: &MySqlPool, text: &str) -> Result<()> {
    let statements = split_statements(text);
    debug!(statements = statements.len(), "importing MySQL schema");
    for ddl in &statements {
        if let Err(e) = sqlx::raw_sql(ddl).execute(pool).await {
            if mysql_error_number(&e) == Some(MYSQL_TABLE_EXISTS) {
                info!("schema already present, skipping import");
                return Ok(());
            }
            return Err(e.into());
        }
    }
    Ok(())
}

/// Runs every statement of `text` against a PostgreSQL database.
pub async fn import_postgres(pool: &PgPool, text: &str) -> Result<()> {
    let statements = split_statements(text);
    debug!(statements = statements.len(), "importing PostgreSQL schema");
    for ddl in &statements {
        sqlx::raw_sql(ddl).execute(pool).await?;
    }
    Ok(())
}
