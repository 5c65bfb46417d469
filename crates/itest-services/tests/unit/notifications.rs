//! Icinga Notifications creator against the mock runtime.

use std::sync::Arc;

use itest_core::Settings;
use itest_docker::mock::Op;
use itest_services::notifications::{ENV_PREFIX, NOTIFICATIONS_PORT};
use itest_services::{DatabaseKind, NotificationsCreator, NotificationsOption, SharedDatabase};

use crate::common::{FakeDatabase, mock_with_network};

#[tokio::test]
async fn test_create_instance_configures_env_from_database() {
    let (mock, runtime, net) = mock_with_network().await;
    let creator = NotificationsCreator::new(runtime, Arc::new(Settings::default()), "it-notifications", &net);
    let rdb: SharedDatabase = FakeDatabase::new(DatabaseKind::Postgresql);

    let instance = creator.create_instance(rdb, &[]).await.unwrap();

    assert_eq!(instance.container_name(), "it-notifications-1");
    assert_eq!(instance.port(), NOTIFICATIONS_PORT);
    assert!(instance.host().starts_with("172.18.0."));

    let env = instance.env();
    let get = |k: &str| env.get(&format!("{ENV_PREFIX}{k}")).map(String::as_str);
    assert_eq!(get("LISTEN"), Some(":5680"));
    assert_eq!(get("DATABASE_TYPE"), Some("pgsql"));
    assert_eq!(get("DATABASE_HOST"), Some("172.18.0.3"));
    assert_eq!(get("DATABASE_PORT"), Some("5432"));
    assert_eq!(get("DATABASE_DATABASE"), Some("d1"));
    assert_eq!(get("DATABASE_USER"), Some("u1"));
    assert_eq!(get("DATABASE_PASSWORD"), Some("secret"));

    let (_, container) = mock.container_by_name("it-notifications-1").unwrap();
    assert!(container.started);
    assert_eq!(container.spec.image, "icinga-notifications:latest");
    assert!(
        container
            .spec
            .env
            .contains(&"ICINGA_NOTIFICATIONS_DATABASE_TYPE=pgsql".to_string())
    );
    assert_eq!(creator.running(), 1);
}

#[tokio::test]
async fn test_options_override_env_and_keep_config() {
    let (_mock, runtime, net) = mock_with_network().await;
    let creator = NotificationsCreator::new(runtime, Arc::new(Settings::default()), "it-notifications", &net);
    let rdb: SharedDatabase = FakeDatabase::new(DatabaseKind::Mysql);

    let instance = creator
        .create_instance(
            rdb,
            &[
                NotificationsOption::env("ICINGA_NOTIFICATIONS_LOGGING_LEVEL", "info"),
                NotificationsOption::config("channel-plugin-dir: /usr/libexec/channels\n"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(
        instance
            .env()
            .get("ICINGA_NOTIFICATIONS_LOGGING_LEVEL")
            .map(String::as_str),
        Some("info")
    );
    assert_eq!(instance.config(), "channel-plugin-dir: /usr/libexec/channels\n");

    let rendered = instance.render_config().unwrap();
    assert!(rendered.starts_with("listen:"));
    assert!(rendered.contains(":5680"));
    assert!(rendered.contains("type: mysql"));
    assert!(rendered.contains("port: 3306"));
    assert!(rendered.ends_with("channel-plugin-dir: /usr/libexec/channels\n"));
}

#[tokio::test]
async fn test_cleanup_removes_every_instance_once() {
    let (mock, runtime, net) = mock_with_network().await;
    let creator = NotificationsCreator::new(runtime, Arc::new(Settings::default()), "it-notifications", &net);

    let first = creator
        .create_instance(FakeDatabase::new(DatabaseKind::Mysql), &[])
        .await
        .unwrap();
    creator
        .create_instance(FakeDatabase::new(DatabaseKind::Postgresql), &[])
        .await
        .unwrap();
    assert_eq!(creator.running(), 2);

    first.cleanup().await.unwrap();
    assert_eq!(creator.running(), 1);

    creator.cleanup().await.unwrap();
    assert_eq!(creator.running(), 0);

    let removals = mock
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::RemoveContainer(_)))
        .count();
    assert_eq!(removals, 2);
}

#[tokio::test]
async fn test_failed_cleanup_can_be_retried() {
    let (mock, runtime, net) = mock_with_network().await;
    let creator = NotificationsCreator::new(runtime, Arc::new(Settings::default()), "it-notifications", &net);
    let instance = creator
        .create_instance(FakeDatabase::new(DatabaseKind::Mysql), &[])
        .await
        .unwrap();

    mock.fail_removals(1);
    assert!(instance.cleanup().await.is_err());
    assert_eq!(creator.running(), 1);
    assert!(mock.container_by_name("it-notifications-1").is_some());

    instance.cleanup().await.unwrap();
    assert_eq!(creator.running(), 0);
    assert!(mock.container_by_name("it-notifications-1").is_none());

    instance.cleanup().await.unwrap();
    let removals = mock
        .ops()
        .into_iter()
        .filter(|op| matches!(op, Op::RemoveContainer(_)))
        .count();
    assert_eq!(removals, 2);
}
