//! Icinga 2 node operations against the mock runtime and a fake API.

use std::sync::Arc;

use itest_docker::mock::{ExecOutcome, Op};
use itest_docker::{ContainerRuntime, ContainerSpec, Endpoint};
use itest_services::Icinga2Node;
use itest_services::icinga2::ICINGADB_FEATURE_CONFIG;

use crate::common::{FakeApi, mock_with_network};

async fn node() -> (Arc<itest_docker::mock::MockRuntime>, Icinga2Node, String, FakeApi) {
    let (mock, runtime, _net) = mock_with_network().await;
    let id = runtime
        .create_container(&ContainerSpec::new("it-1-master", "icinga/icinga2:master"))
        .await
        .unwrap();
    let api = FakeApi::default();
    let base = api.serve().await;
    let endpoint = Endpoint {
        host: "172.18.0.2".to_string(),
        port: 5665,
    };
    let node = Icinga2Node::new(runtime, "master", &id, "it-1-master", endpoint, Some(base)).unwrap();
    (mock, node, id, api)
}

#[tokio::test]
async fn test_accessors() {
    let (_mock, node, _id, _api) = node().await;
    assert_eq!(node.name(), "master");
    assert_eq!(node.host(), "172.18.0.2");
    assert_eq!(node.port(), 5665);
    assert_eq!(node.container_name(), "it-1-master");
    assert!(node.api_client().base_url().starts_with("http://127.0.0.1:"));
}

#[tokio::test]
async fn test_write_config_pipes_data_through_tee() {
    let (mock, node, id, _api) = node().await;

    node.write_config("etc/icinga2/conf.d/test.conf", b"object Host \"h\" {}")
        .await
        .unwrap();

    let execs = mock.execs();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].container, id);
    assert_eq!(execs[0].cmd, vec!["tee", "/etc/icinga2/conf.d/test.conf"]);
    assert_eq!(execs[0].stdin.as_deref(), Some(&b"object Host \"h\" {}"[..]));
}

#[tokio::test]
async fn test_write_config_failure_is_reported() {
    let (mock, node, _id, _api) = node().await;
    mock.on_exec(|_| ExecOutcome {
        stderr: b"tee: /etc/x: Permission denied\n".to_vec(),
        exit_code: 1,
        ..Default::default()
    });

    assert!(node.write_config("etc/x", b"data").await.is_err());
}

#[tokio::test]
async fn test_delete_config_glob() {
    let (mock, node, _id, _api) = node().await;
    node.delete_config_glob("etc/icinga2/conf.d/*.conf").await.unwrap();
    assert_eq!(
        mock.execs()[0].cmd,
        vec!["sh", "-c", "rm -f /etc/icinga2/conf.d/*.conf"]
    );
}

#[tokio::test]
async fn test_enable_icingadb_writes_feature_then_enables() {
    let (mock, node, _id, _api) = node().await;
    let redis = Endpoint {
        host: "172.18.0.7".to_string(),
        port: 6379,
    };

    node.enable_icingadb_at(&redis).await.unwrap();

    let execs = mock.execs();
    assert_eq!(execs.len(), 2);
    assert_eq!(execs[0].cmd, vec!["tee".to_string(), format!("/{ICINGADB_FEATURE_CONFIG}")]);
    let written = String::from_utf8(execs[0].stdin.clone().unwrap()).unwrap();
    assert!(written.contains("host = \"172.18.0.7\""));
    assert!(written.contains("port = 6379"));
    assert_eq!(execs[1].cmd, vec!["icinga2", "feature", "enable", "icingadb"]);
}

#[tokio::test]
async fn test_reload_signals_and_waits_for_api() {
    let (mock, node, id, api) = node().await;

    node.reload().await.unwrap();

    assert!(mock.ops().contains(&Op::KillContainer(id, "HUP".to_string())));
    assert!(api.requests().iter().any(|r| r.uri == "/v1"));
}

#[tokio::test]
async fn test_reload_waits_for_new_process() {
    let (mock, node, id, api) = node().await;
    api.program_starts(&[1000.0, 1000.0, 1000.0, 1012.5]);

    node.reload().await.unwrap();

    assert!(mock.ops().contains(&Op::KillContainer(id, "HUP".to_string())));
    let status_requests = api
        .requests()
        .iter()
        .filter(|r| r.uri == "/v1/status/IcingaApplication")
        .count();
    assert_eq!(status_requests, 4);
}

#[tokio::test]
async fn test_reload_gives_up_when_process_never_restarts() {
    let (_mock, node, _id, api) = node().await;
    api.program_starts(&[1000.0]);

    let err = node.reload().await.unwrap_err();
    assert!(err.to_string().contains("icinga2 reload"), "{err}");
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let (mock, node, id, _api) = node().await;

    node.cleanup().await.unwrap();
    node.cleanup().await.unwrap();

    let removals = mock
        .ops()
        .into_iter()
        .filter(|op| *op == Op::RemoveContainer(id.clone()))
        .count();
    assert_eq!(removals, 1);
    assert!(mock.container_by_name("it-1-master").is_none());
}

#[tokio::test]
async fn test_cleanup_retries_after_failed_removal() {
    let (mock, node, id, _api) = node().await;

    mock.fail_removals(1);
    assert!(node.cleanup().await.is_err());
    assert!(mock.container_by_name("it-1-master").is_some());

    node.cleanup().await.unwrap();
    assert!(mock.container_by_name("it-1-master").is_none());

    let removals = mock
        .ops()
        .into_iter()
        .filter(|op| *op == Op::RemoveContainer(id.clone()))
        .count();
    assert_eq!(removals, 2);
}
