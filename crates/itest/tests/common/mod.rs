//! Shared fixtures for itest tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use itest::It;
use itest::itest_docker::mock::MockRuntime;
use itest::itest_services::{DatabaseInfo, DatabaseKind, RelationalDatabase, Result};
use itest::Settings;

/// A database that only carries connection data.
#[derive(Debug)]
pub struct FakeDatabase {
    pub info: DatabaseInfo,
}

impl FakeDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            info: DatabaseInfo {
                host: "172.18.0.3".to_string(),
                port: 5432,
                username: "u1".to_string(),
                password: "secret".to_string(),
                database: "d1".to_string(),
            },
        })
    }
}

#[async_trait]
impl RelationalDatabase for FakeDatabase {
    fn info(&self) -> &DatabaseInfo {
        &self.info
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgresql
    }

    fn dsn(&self) -> String {
        "postgres://fake".to_string()
    }

    async fn import_icingadb_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn import_notifications_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

/// A harness on the recording runtime, with every default image present.
pub async fn mock_it() -> (Arc<MockRuntime>, It) {
    let mock = Arc::new(MockRuntime::new());
    let settings = Settings::default();
    for image in [&settings.notifications_image, &settings.redis_image, &settings.icinga2_image] {
        mock.add_image(image);
    }
    let it = It::with_runtime(mock.clone(), settings).await.unwrap();
    (mock, it)
}
