//! Runtime configuration and lifecycle for a single test container.

pub mod constants;
pub mod environment;
pub mod options;
pub mod supervisor;
pub mod volumes;
