//! Deterministic naming for named volumes.
//!
//! Volume names are always prefixed with `bazel-itest-`. When the process runs
//! inside a test (`TEST_TARGET` is set), the SHA-256 of the target label is
//! appended so concurrently running tests never share a volume.

use sha2::{Digest, Sha256};

use crate::runtime::constants::volumes::NAME_PREFIX;
use crate::runtime::options::{MountSpec, VolumeSpec};

/// Hex-encoded SHA-256 of the test target, or `None` outside a test.
pub fn volume_suffix(test_target: Option<&str>) -> Option<String> {
    let target = test_target.filter(|t| !t.is_empty())?;
    let mut hasher = Sha256::new();
    hasher.update(target.as_bytes());
    Some(hex::encode(hasher.finalize()))
}

pub fn volume_name(base: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{NAME_PREFIX}{base}-{suffix}"),
        None => format!("{NAME_PREFIX}{base}"),
    }
}

/// Names every volume of one run with the same suffix.
#[derive(Clone, Debug, Default)]
pub struct VolumeNamer {
    suffix: Option<String>,
}

impl VolumeNamer {
    pub fn new(test_target: Option<&str>) -> Self {
        Self {
            suffix: volume_suffix(test_target),
        }
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn name(&self, base: &str) -> String {
        volume_name(base, self.suffix())
    }

    pub fn resolve_mounts(&self, specs: &[VolumeSpec]) -> Vec<MountSpec> {
        specs
            .iter()
            .map(|spec| MountSpec {
                volume_name: self.name(&spec.name),
                target: spec.target.clone(),
            })
            .collect()
    }
}
