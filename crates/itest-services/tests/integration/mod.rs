mod icinga2;
mod redis;

use std::collections::HashMap;
use std::sync::Arc;

use itest_core::{Settings, random_string};
use itest_docker::{ContainerRuntime, DockerRuntime};

/// A Docker runtime, settings from the environment and a fresh network.
pub async fn docker_network() -> (Arc<dyn ContainerRuntime>, Arc<Settings>, String, String) {
    let settings = Arc::new(Settings::from_env());
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(
        DockerRuntime::connect(settings.docker_host.as_deref())
            .await
            .expect("docker daemon reachable"),
    );
    let prefix = format!("icinga-testing-{}", random_string(8));
    let labels = HashMap::from([("icinga".to_string(), "testing".to_string())]);
    let network = runtime.create_network(&prefix, &labels).await.unwrap();
    (runtime, settings, prefix, network)
}
