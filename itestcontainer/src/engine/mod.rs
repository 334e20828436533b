//! Engine abstraction for starting and tearing down the test container.
//!
//! The runtime only needs three capabilities from a container engine: run a
//! container from [`ContainerOptions`], inspect it, and terminate it. Docker
//! (through `bollard`) is the production implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ItestResult;
use crate::runtime::constants::lifecycle::SHORT_ID_LENGTH;
use crate::runtime::options::ContainerOptions;

pub mod docker;
mod logs;

pub use docker::DockerEngine;

/// Handle to a container started by an engine.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningContainer {
    pub id: String,
    pub image: String,
}

impl RunningContainer {
    /// Short form of the ID for display.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(SHORT_ID_LENGTH)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

impl fmt::Debug for RunningContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunningContainer({}, {})", self.short_id(), self.image)
    }
}

/// A container port published on the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPort {
    /// Engine port key, e.g. `5432/tcp`.
    pub container: String,
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
}

/// Details reported by the engine after start.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub id: String,
    pub name: Option<String>,
    pub ports: Vec<PublishedPort>,
}

impl ContainerDetails {
    /// Name for log lines; falls back to the ID when the engine has no name.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Start / inspect / terminate capability of a container engine.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Make the image available, create and start the container, and begin
    /// forwarding its output to the log.
    async fn run(&self, options: &ContainerOptions) -> ItestResult<RunningContainer>;

    async fn inspect(&self, container: &RunningContainer) -> ItestResult<ContainerDetails>;

    /// Stop the container with `timeout` as grace period, then remove it.
    ///
    /// A container that no longer exists is treated as already terminated.
    async fn terminate(&self, container: &RunningContainer, timeout: Duration) -> ItestResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        let container = RunningContainer {
            id: "0123456789abcdef0123".into(),
            image: "redis".into(),
        };
        assert_eq!(container.short_id(), "0123456789ab");
        assert_eq!(
            format!("{container:?}"),
            "RunningContainer(0123456789ab, redis)"
        );

        let short = RunningContainer {
            id: "abc".into(),
            image: "redis".into(),
        };
        assert_eq!(short.short_id(), "abc");
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut details = ContainerDetails {
            id: "abc123".into(),
            ..Default::default()
        };
        assert_eq!(details.display_name(), "abc123");
        details.name = Some("eager_turing".into());
        assert_eq!(details.display_name(), "eager_turing");
    }
}
