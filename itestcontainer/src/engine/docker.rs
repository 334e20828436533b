//! Docker engine backed by the `bollard` API client.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, InspectContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount, MountTypeEnum, PortBinding, PortMap};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::{ContainerDetails, ContainerEngine, PublishedPort, RunningContainer, logs};
use crate::errors::{ItestError, ItestResult};
use crate::runtime::options::{ContainerOptions, PullPolicy};

/// How long terminate waits for the log forwarder to drain after stop.
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct DockerEngine {
    docker: Docker,
    forwarders: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl DockerEngine {
    /// Connect using the local defaults (`DOCKER_HOST` or the platform socket)
    /// and verify the daemon answers.
    pub async fn connect() -> ItestResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Self::with_client(docker).await
    }

    pub async fn with_client(docker: Docker) -> ItestResult<Self> {
        docker.ping().await.map_err(|e| {
            ItestError::Engine(format!("Docker daemon is not reachable: {}", e))
        })?;

        match docker.version().await {
            Ok(version) => tracing::debug!(
                version = version.version.as_deref().unwrap_or("unknown"),
                api_version = version.api_version.as_deref().unwrap_or("unknown"),
                "Connected to Docker daemon"
            ),
            Err(e) => tracing::warn!(error = %e, "Could not retrieve Docker version"),
        }

        Ok(Self {
            docker,
            forwarders: Mutex::new(HashMap::new()),
        })
    }

    async fn image_present(&self, image: &str) -> ItestResult<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(ItestError::image(image, e)),
        }
    }

    async fn ensure_image(&self, options: &ContainerOptions) -> ItestResult<()> {
        let reference = options.image.to_string();

        if options.pull_policy == PullPolicy::Missing && self.image_present(&reference).await? {
            tracing::debug!(image = %reference, "Image present locally");
            return Ok(());
        }

        tracing::info!(image = %reference, policy = %options.pull_policy, "Pulling image");

        // A digest pins the image; the tag is ignored by the daemon in that case.
        let pull = match &options.image.digest {
            Some(digest) => CreateImageOptions {
                from_image: format!("{}@{}", options.image.repository, digest),
                ..Default::default()
            },
            None => CreateImageOptions {
                from_image: options.image.repository.clone(),
                tag: options.image.tag_or_default().to_string(),
                ..Default::default()
            },
        };

        let mut progress = Box::pin(self.docker.create_image(Some(pull), None, None));
        while let Some(event) = progress.next().await {
            let info = event.map_err(|e| ItestError::image(&reference, e))?;
            if let Some(status) = info.status {
                tracing::trace!(image = %reference, status = %status, "Pull progress");
            }
        }

        tracing::info!(image = %reference, "Image pulled");
        Ok(())
    }

    async fn remove(&self, container_id: &str) -> ItestResult<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self.docker.remove_container(container_id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn run(&self, options: &ContainerOptions) -> ItestResult<RunningContainer> {
        options.sanitize()?;
        self.ensure_image(options).await?;

        let config = container_config(options);
        let response = self
            .docker
            .create_container(None::<bollard::container::CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| ItestError::Engine(format!("Failed to create container: {}", e)))?;

        for warning in &response.warnings {
            tracing::warn!(container_id = %response.id, "{}", warning);
        }

        let container = RunningContainer {
            id: response.id,
            image: options.image.to_string(),
        };
        tracing::debug!(container = ?container, "Container created");

        start_or_remove(
            self.docker
                .start_container(&container.id, None::<StartContainerOptions<String>>),
            || self.remove(&container.id),
        )
        .await?;

        let forwarder = logs::spawn_forwarder(self.docker.clone(), container.id.clone());
        self.forwarders.lock().insert(container.id.clone(), forwarder);

        tracing::info!(container = ?container, "Container started");
        Ok(container)
    }

    async fn inspect(&self, container: &RunningContainer) -> ItestResult<ContainerDetails> {
        let response = self
            .docker
            .inspect_container(&container.id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    ItestError::NotFound(container.id.clone())
                } else {
                    e.into()
                }
            })?;

        let ports = response
            .network_settings
            .and_then(|settings| settings.ports)
            .map(published_ports)
            .unwrap_or_default();

        Ok(ContainerDetails {
            id: response.id.unwrap_or_else(|| container.id.clone()),
            name: response
                .name
                .map(|name| name.trim_start_matches('/').to_string())
                .filter(|name| !name.is_empty()),
            ports,
        })
    }

    async fn terminate(&self, container: &RunningContainer, timeout: Duration) -> ItestResult<()> {
        let options = StopContainerOptions {
            t: stop_timeout_secs(timeout),
        };
        let result = self.docker.stop_container(&container.id, Some(options)).await;
        match stop_outcome(&result) {
            StopOutcome::Stopped => tracing::debug!(container = ?container, "Container stopped"),
            StopOutcome::AlreadyGone => {
                tracing::debug!(container = ?container, "Container already gone");
            }
            StopOutcome::AlreadyStopped => {
                tracing::debug!(container = ?container, "Container already stopped");
            }
            StopOutcome::Failed => {
                let reason = result.err().map(|e| e.to_string()).unwrap_or_default();
                return Err(ItestError::Engine(format!(
                    "Failed to stop container {}: {}",
                    container.short_id(),
                    reason
                )));
            }
        }

        let forwarder = self.forwarders.lock().remove(&container.id);
        if let Some(mut handle) = forwarder
            && tokio::time::timeout(LOG_DRAIN_TIMEOUT, &mut handle).await.is_err()
        {
            handle.abort();
        }

        self.remove(&container.id).await?;
        tracing::debug!(container = ?container, "Container removed");
        Ok(())
    }
}

fn status_code(err: &DockerError) -> Option<u16> {
    match err {
        DockerError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn is_not_found(err: &DockerError) -> bool {
    status_code(err) == Some(404)
}

fn is_not_modified(err: &DockerError) -> bool {
    status_code(err) == Some(304)
}

/// How a stop request ended, as far as teardown is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopOutcome {
    Stopped,
    AlreadyGone,
    AlreadyStopped,
    Failed,
}

fn stop_outcome(result: &Result<(), DockerError>) -> StopOutcome {
    match result {
        Ok(()) => StopOutcome::Stopped,
        Err(e) if is_not_found(e) => StopOutcome::AlreadyGone,
        Err(e) if is_not_modified(e) => StopOutcome::AlreadyStopped,
        Err(_) => StopOutcome::Failed,
    }
}

/// Grace period in whole seconds. Docker reads negative values as "wait forever".
fn stop_timeout_secs(timeout: Duration) -> i64 {
    i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX)
}

/// Await `start`; if it fails, run `remove` so no created container is left
/// behind, then report the start error.
async fn start_or_remove<S, R, F>(start: S, remove: R) -> ItestResult<()>
where
    S: Future<Output = Result<(), DockerError>>,
    R: FnOnce() -> F,
    F: Future<Output = ItestResult<()>>,
{
    let Err(e) = start.await else {
        return Ok(());
    };
    if let Err(cleanup) = remove().await {
        tracing::warn!(error = %cleanup, "Cleanup after failed start failed");
    }
    Err(ItestError::Engine(format!("Failed to start container: {}", e)))
}

/// Translate options into the Docker create-container body.
pub(crate) fn container_config(options: &ContainerOptions) -> Config<String> {
    let mut exposed_ports = HashMap::new();
    let mut port_bindings: PortMap = HashMap::new();
    for port in &options.ports {
        let key = port.exposed_key();
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings
            .entry(key)
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(PortBinding {
                host_ip: port.host_ip.clone(),
                // Empty host port lets the daemon pick an ephemeral one.
                host_port: Some(port.host_port.map(|p| p.to_string()).unwrap_or_default()),
            });
    }

    let mounts = options
        .mounts
        .iter()
        .map(|mount| Mount {
            target: Some(mount.target.clone()),
            source: Some(mount.volume_name.clone()),
            typ: Some(MountTypeEnum::VOLUME),
            ..Default::default()
        })
        .collect::<Vec<_>>();

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        mounts: Some(mounts),
        ..Default::default()
    };

    let labels = options
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<HashMap<_, _>>();

    Config {
        image: Some(options.image.to_string()),
        env: Some(options.env_pairs()),
        labels: Some(labels),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

fn published_ports(ports: PortMap) -> Vec<PublishedPort> {
    let mut published: Vec<PublishedPort> = ports
        .into_iter()
        .flat_map(|(container, bindings)| {
            let bindings = bindings.unwrap_or_default();
            if bindings.is_empty() {
                return vec![PublishedPort {
                    container,
                    host_ip: None,
                    host_port: None,
                }];
            }
            bindings
                .into_iter()
                .map(|binding| PublishedPort {
                    container: container.clone(),
                    host_ip: binding.host_ip.filter(|ip| !ip.is_empty()),
                    host_port: binding.host_port.and_then(|p| p.parse().ok()),
                })
                .collect()
        })
        .collect();
    published.sort_by(|a, b| {
        (&a.container, &a.host_ip, a.host_port).cmp(&(&b.container, &b.host_ip, b.host_port))
    });
    published
}
