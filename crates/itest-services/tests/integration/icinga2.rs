use std::sync::Arc;
use std::time::Duration;

use itest_core::eventually;
use itest_services::Icinga2Creator;
use serde_json::Value;

use super::docker_network;

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_icinga2_node_accepts_objects() {
    let (runtime, settings, prefix, network) = docker_network().await;
    let creator = Icinga2Creator::new(Arc::clone(&runtime), settings, &format!("{prefix}-icinga2"), &network);

    let node = creator.create_node("master").await.unwrap();
    let client = node.api_client();

    client.create_host("web-1", None).await.unwrap();
    client.create_service("web-1", "ping", None).await.unwrap();

    eventually::require(Duration::from_secs(10), Duration::from_millis(200), || {
        let client = client.clone();
        async move {
            let res = client
                .get_json("/v1/objects/services/web-1!ping")
                .await
                .map_err(|e| e.to_string())?;
            let body: Value = res.json().await.map_err(|e| e.to_string())?;
            match body["results"][0]["name"].as_str() {
                Some("web-1!ping") => Ok(()),
                other => Err(format!("unexpected object name {other:?}")),
            }
        }
    })
    .await;

    client.delete_host("web-1", true).await.unwrap();
    creator.cleanup().await.unwrap();
    assert_eq!(creator.running(), 0);
    runtime.remove_network(&network).await.unwrap();
}
