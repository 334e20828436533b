//! Start / wait / terminate sequencing for one container.

use std::future::Future;

use crate::engine::{ContainerDetails, ContainerEngine, RunningContainer};
use crate::errors::ItestResult;
use crate::runtime::options::ContainerOptions;

/// Drives a single container through its whole lifetime.
pub struct Supervisor<E> {
    engine: E,
}

impl<E: ContainerEngine> Supervisor<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Start the container, wait for `shutdown`, then terminate it.
    ///
    /// Startup failures are returned before anything needs tearing down.
    /// Once the container is running it is terminated exactly once, whatever
    /// happens while waiting.
    pub async fn run_until<F>(&self, options: &ContainerOptions, shutdown: F) -> ItestResult<()>
    where
        F: Future<Output = ()>,
    {
        let container = self.engine.run(options).await?;
        let details = self.describe(&container).await;

        for port in &details.ports {
            tracing::info!(
                container_port = %port.container,
                host_ip = port.host_ip.as_deref().unwrap_or("*"),
                host_port = ?port.host_port,
                "Published port"
            );
        }

        tracing::info!("Started {}", options.image);
        tracing::info!("Waiting, press Ctrl-C to shutdown");

        shutdown.await;

        tracing::info!("Stopping {}", details.display_name());
        if let Err(e) = self.engine.terminate(&container, options.stop_timeout).await {
            tracing::error!(container = ?container, error = %e, "Failed to terminate container");
            return Err(e);
        }

        tracing::info!("itestcontainer done");
        Ok(())
    }

    /// Inspect the container, falling back to its bare ID if that fails.
    async fn describe(&self, container: &RunningContainer) -> ContainerDetails {
        match self.engine.inspect(container).await {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!(container = ?container, error = %e, "Failed to inspect container");
                ContainerDetails {
                    id: container.id.clone(),
                    ..Default::default()
                }
            }
        }
    }
}
