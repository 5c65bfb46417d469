//! Exec and container lifecycle against a live daemon.

use std::collections::HashMap;

use itest_docker::{ContainerRuntime, ContainerSpec, Error, ExecRequest, NetworkAttachment};

use crate::common::{Captured, runtime};

const IMAGE: &str = "alpine:latest";

async fn sleeper(rt: &impl ContainerRuntime, name: &str, network: Option<NetworkAttachment>) -> String {
    rt.pull_image(IMAGE, false).await.unwrap();
    let mut spec = ContainerSpec::new(name, IMAGE).cmd(["sleep", "300"]);
    spec.network = network;
    let id = rt.create_container(&spec).await.unwrap();
    rt.start_container(&id).await.unwrap();
    id
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_exec_routes_streams_and_stdin() {
    let rt = runtime().await;
    let name = format!("itest-docker-exec-{}", itest_core::random_string(8));
    let id = sleeper(&rt, &name, None).await;

    let out = Captured::default();
    let err = Captured::default();
    let result = rt
        .exec(
            &id,
            ExecRequest::new(["sh", "-c", "cat; echo oops >&2"])
                .stdin(b"hello from stdin\n".to_vec())
                .stdout(out.sink())
                .stderr(err.sink()),
        )
        .await;

    rt.remove_container(&id).await.unwrap();
    result.unwrap();
    assert_eq!(out.text(), "hello from stdin\n");
    assert_eq!(err.text(), "oops\n");
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_exec_nonzero_exit() {
    let rt = runtime().await;
    let name = format!("itest-docker-exit-{}", itest_core::random_string(8));
    let id = sleeper(&rt, &name, None).await;

    let result = rt.exec(&id, ExecRequest::new(["sh", "-c", "exit 3"])).await;
    rt.remove_container(&id).await.unwrap();

    assert!(matches!(result, Err(Error::ExitCode { code: 3 })));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_network_address_and_gateway() {
    let rt = runtime().await;
    let name = format!("itest-docker-net-{}", itest_core::random_string(8));
    let labels = HashMap::from([("icinga".to_string(), "testing".to_string())]);
    let net = rt.create_network(&name, &labels).await.unwrap();

    assert_eq!(rt.network_name(&net).await.unwrap(), name);
    assert!(!rt.network_gateway(&net).await.unwrap().is_empty());

    let id = sleeper(
        &rt,
        &format!("{name}-c"),
        Some(NetworkAttachment {
            id: net.clone(),
            name: name.clone(),
            aliases: vec!["sleeper".to_string()],
        }),
    )
    .await;
    let address = rt.container_address(&id).await;

    rt.remove_container(&id).await.unwrap();
    rt.remove_network(&net).await.unwrap();
    assert!(address.unwrap().parse::<std::net::IpAddr>().is_ok());
}
