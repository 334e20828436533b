//! itestcontainer - run a single container for the lifetime of an integration test.
//!
//! The crate turns a handful of flag values (image, environment passthrough,
//! ports, named volumes, labels) into a [`ContainerOptions`], starts the
//! container through a [`ContainerEngine`], and tears it down again once the
//! [`Supervisor`] is told to shut down.

pub mod engine;
pub mod errors;
pub mod runtime;
pub mod util;

pub use engine::{ContainerDetails, ContainerEngine, DockerEngine, RunningContainer};
pub use errors::{ItestError, ItestResult};
pub use runtime::options::{
    ContainerOptions, ImageRef, MountSpec, PortProtocol, PortSpec, PullPolicy, VolumeSpec,
};
pub use runtime::supervisor::Supervisor;
