#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;

/// Environment variables that would change how the binary behaves.
const SCRUBBED_ENV: &[&str] = &[
    "TEST_TARGET",
    "ITESTCONTAINER_STOP_TIMEOUT",
    "ITESTCONTAINER_PULL",
    "RUST_LOG",
];

/// Command for the built binary with a scrubbed environment.
pub fn itestcontainer() -> Command {
    let bin_path = env!("CARGO_BIN_EXE_itestcontainer");
    let mut cmd = Command::new(bin_path);
    // Every test here fails before touching a container engine.
    cmd.timeout(Duration::from_secs(30));
    for name in SCRUBBED_ENV {
        cmd.env_remove(name);
    }
    cmd
}
