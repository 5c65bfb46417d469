//! The Icinga 2 API client against a recording HTTP server.

use std::collections::HashMap;
use std::time::Duration;

use itest_services::{Error, Icinga2Client};
use serde_json::json;

use crate::common::FakeApi;

async fn client(api: &FakeApi) -> Icinga2Client {
    let base = api.serve().await;
    Icinga2Client::with_base_url(base, "root", "root")
        .unwrap()
        .with_retry(Duration::from_millis(5), 300)
}

#[tokio::test]
async fn test_create_host_sends_default_body_and_headers() {
    let api = FakeApi::default();
    let client = client(&api).await;

    client.create_host("web-1", None).await.unwrap();

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "PUT");
    assert_eq!(req.uri, "/v1/objects/hosts/web-1");
    assert_eq!(req.accept.as_deref(), Some("application/json"));
    assert_eq!(req.content_type.as_deref(), Some("application/json"));
    assert_eq!(req.authorization.as_deref(), Some("Basic cm9vdDpyb290"));
    assert_eq!(req.body, r#"{"attrs":{"check_command":"dummy"}}"#);
}

#[tokio::test]
async fn test_get_has_no_json_headers() {
    let api = FakeApi::default();
    let client = client(&api).await;

    let res = client.get_json("/v1/status").await.unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let req = &api.requests()[0];
    assert_eq!(req.method, "GET");
    assert!(req.accept.is_none());
    assert!(req.content_type.is_none());
}

#[tokio::test]
async fn test_service_and_cascade_paths() {
    let api = FakeApi::default();
    let client = client(&api).await;

    client
        .create_service("web-1", "http", Some(json!({"attrs": {"check_command": "http"}})))
        .await
        .unwrap();
    client.delete_service("web-1", "http", true).await.unwrap();
    client.delete_host("web-1", false).await.unwrap();

    let requests = api.requests();
    assert_eq!(requests[0].uri, "/v1/objects/services/web-1!http");
    assert_eq!(requests[0].body, r#"{"attrs":{"check_command":"http"}}"#);
    assert_eq!(requests[1].method, "DELETE");
    assert_eq!(requests[1].uri, "/v1/objects/services/web-1!http?cascade=1");
    assert_eq!(requests[1].accept.as_deref(), Some("application/json"));
    assert!(requests[1].content_type.is_none());
    assert_eq!(requests[2].uri, "/v1/objects/hosts/web-1");
}

#[tokio::test]
async fn test_unavailable_is_retried() {
    let api = FakeApi::default();
    api.script(&[503, 503, 503]);
    let client = client(&api).await;

    client
        .update_object("hosts", "web-1", &json!({"attrs": {"vars": {"a": 1}}}))
        .await
        .unwrap();

    let requests = api.requests();
    assert_eq!(requests.len(), 4);
    assert!(requests.iter().all(|r| r.method == "POST" && r.body.contains("\"a\":1")));
}

#[tokio::test]
async fn test_unavailable_after_all_attempts_is_returned() {
    let api = FakeApi::default();
    api.script(&[503, 503, 503]);
    let base = api.serve().await;
    let client = Icinga2Client::with_base_url(base, "root", "root")
        .unwrap()
        .with_retry(Duration::from_millis(1), 2);

    let res = client.get_json("/v1/status").await.unwrap();
    assert_eq!(res.status().as_u16(), 503);
    assert_eq!(api.requests().len(), 2);
}

#[tokio::test]
async fn test_non_ok_status_is_an_error() {
    let api = FakeApi::default();
    api.script(&[500]);
    let client = client(&api).await;

    let err = client.create_object("hosts", "web-1", &json!({})).await.unwrap_err();
    match err {
        Error::UnexpectedStatus {
            method,
            path,
            status,
            body,
        } => {
            assert_eq!(method, "PUT");
            assert_eq!(path, "/v1/objects/hosts/web-1");
            assert_eq!(status, 500);
            assert_eq!(body, "{}");
        }
        other => unreachable!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_config_packages() {
    let api = FakeApi::default();
    let client = client(&api).await;

    let mut files = HashMap::new();
    files.insert(
        "conf.d/test.conf".to_string(),
        "object Host \"h\" { check_command = \"dummy\" }".to_string(),
    );

    client.create_config_package("itest").await.unwrap();
    client.create_config_package_stage("itest", &files).await.unwrap();
    client.delete_config_package("itest").await.unwrap();

    let requests = api.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].uri, "/v1/config/packages/itest");
    assert!(requests[0].content_type.is_none());
    assert_eq!(requests[1].uri, "/v1/config/stages/itest");
    let body: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(
        body["files"]["conf.d/test.conf"].as_str(),
        Some("object Host \"h\" { check_command = \"dummy\" }")
    );
    assert_eq!(requests[2].method, "DELETE");
}

#[tokio::test]
async fn test_ping_accepts_any_status() {
    let api = FakeApi::default();
    api.script(&[401]);
    let client = client(&api).await;
    client.ping().await.unwrap();
    assert_eq!(api.requests()[0].uri, "/v1");
}

#[tokio::test]
async fn test_ping_fails_without_server() {
    let port = itest_docker::free_tcp_port().unwrap();
    let client =
        Icinga2Client::with_base_url(format!("http://127.0.0.1:{port}"), "root", "root").unwrap();
    assert!(matches!(client.ping().await, Err(Error::Http(_))));
}
