//! Constants for the itestcontainer runtime
//!
//! Centralized location for names and defaults shared by the library and CLI.

/// Environment variables read by the runtime.
pub mod envs {
    /// Set by the test runner; identifies the test that owns the container.
    pub const TEST_TARGET: &str = "TEST_TARGET";

    /// Overrides the stop grace period (seconds).
    pub const STOP_TIMEOUT: &str = "ITESTCONTAINER_STOP_TIMEOUT";

    /// Overrides the image pull policy.
    pub const PULL_POLICY: &str = "ITESTCONTAINER_PULL";
}

/// Volume naming
pub mod volumes {
    /// Every volume created on behalf of a test lives under this prefix.
    pub const NAME_PREFIX: &str = "bazel-itest-";
}

/// Image reference defaults
pub mod images {
    pub const DEFAULT_TAG: &str = "latest";
}

/// Container lifecycle defaults
pub mod lifecycle {
    /// Grace period between SIGTERM and SIGKILL when stopping, in seconds.
    pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

    /// Length of the short container ID used in log lines.
    pub const SHORT_ID_LENGTH: usize = 12;
}
