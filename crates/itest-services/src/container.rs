//! Container plumbing shared by the service creators.

use std::sync::Arc;

use itest_docker::{ContainerRuntime, ContainerSpec, NetworkAttachment, log_sink};
use tracing::{Level, debug, error, warn};

use crate::error::Result;

/// Resolves `network_id` into an attachment carrying `aliases`.
pub(crate) async fn attach_to(
    runtime: &dyn ContainerRuntime,
    network_id: &str,
    aliases: &[&str],
) -> Result<NetworkAttachment> {
    Ok(NetworkAttachment {
        id: network_id.to_string(),
        name: runtime.network_name(network_id).await?,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    })
}

/// Pulls the image, creates the container, forwards its output to the debug
/// log and starts it. Returns the container ID.
///
/// A container that fails to start is removed again.
pub(crate) async fn launch(runtime: &dyn ContainerRuntime, spec: &ContainerSpec) -> Result<String> {
    runtime.pull_image(&spec.image, false).await?;

    let id = runtime.create_container(spec).await?;
    debug!(container_name = %spec.name, container_id = %id, image = %spec.image, "created container");

    let started = async {
        runtime
            .forward_output(&id, false, log_sink(spec.name.clone(), Level::DEBUG))
            .await?;
        runtime.start_container(&id).await
    }
    .await;

    if let Err(e) = started {
        discard(runtime, &spec.name, &id).await;
        return Err(e.into());
    }
    debug!(container_name = %spec.name, container_id = %id, "started container");
    Ok(id)
}

/// Removes a container that never became usable.
///
/// The original failure is what the caller reports, so a failed removal is
/// only logged.
pub(crate) async fn discard(runtime: &dyn ContainerRuntime, name: &str, id: &str) {
    match runtime.remove_container(id).await {
        Ok(()) => debug!(container_name = %name, container_id = %id, "removed container that did not come up"),
        Err(e) => warn!(container_name = %name, container_id = %id, error = %e, "failed to remove container that did not come up"),
    }
}

/// Force-removes a container, logging the outcome.
pub(crate) async fn remove(runtime: &Arc<dyn ContainerRuntime>, name: &str, id: &str) -> Result<()> {
    match runtime.remove_container(id).await {
        Ok(()) => {
            debug!(container_name = %name, container_id = %id, "removed container");
            Ok(())
        }
        Err(e) => {
            error!(container_name = %name, container_id = %id, error = %e, "failed to remove container");
            Err(e.into())
        }
    }
}
