//! Container options and the flag-value grammars that produce them.
//!
//! Every list-valued flag is a comma-separated string. Empty entries are
//! skipped, so `""`, `"a,"` and `"a,,b"` are all accepted.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ItestError, ItestResult};
use crate::runtime::constants::{images, lifecycle};

/// Split a comma-separated flag value, dropping empty entries.
pub fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').filter(|entry| !entry.is_empty())
}

// ============================================================================
// IMAGE REFERENCE
// ============================================================================

/// Image reference in `repository[:tag][@digest]` form.
///
/// A colon that is followed by a path separator belongs to a registry host
/// port and is not treated as a tag separator:
///
/// ```
/// use itestcontainer::ImageRef;
///
/// let image: ImageRef = "localhost:5000/redis".parse().unwrap();
/// assert_eq!(image.repository, "localhost:5000/redis");
/// assert_eq!(image.tag, None);
/// assert_eq!(image.tag_or_default(), "latest");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or(images::DEFAULT_TAG)
    }
}

impl FromStr for ImageRef {
    type Err = ItestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ItestError::config("`name` must be set"));
        }

        let (rest, digest) = match s.split_once('@') {
            Some((rest, digest)) if !digest.is_empty() => (rest, Some(digest.to_string())),
            Some(_) => {
                return Err(ItestError::config(format!(
                    "invalid image reference {s:?}: empty digest"
                )));
            }
            None => (s, None),
        };

        let (repository, tag) = match rest.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => {
                if tag.is_empty() {
                    return Err(ItestError::config(format!(
                        "invalid image reference {s:?}: empty tag"
                    )));
                }
                (repo, Some(tag.to_string()))
            }
            _ => (rest, None),
        };

        if repository.is_empty() {
            return Err(ItestError::config(format!(
                "invalid image reference {s:?}: empty repository"
            )));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag,
            digest,
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

// ============================================================================
// PORTS
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl PortProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
            PortProtocol::Sctp => "sctp",
        }
    }
}

impl FromStr for PortProtocol {
    type Err = ItestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(PortProtocol::Tcp),
            "udp" => Ok(PortProtocol::Udp),
            "sctp" => Ok(PortProtocol::Sctp),
            _ => Err(ItestError::config(format!(
                "unknown port protocol {s:?}. Supported: tcp, udp, sctp"
            ))),
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port mapping specification (host -> container).
///
/// Grammar: `[[ip:]host_port:]container_port[/proto]`. IPv6 addresses are
/// written in brackets (`[::1]:8080:80`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortSpec {
    pub host_ip: Option<String>,
    pub host_port: Option<u16>, // None => assigned by the engine
    pub container_port: u16,
    #[serde(default)]
    pub protocol: PortProtocol,
}

impl PortSpec {
    /// Key under which the engine reports this port, e.g. `8080/tcp`.
    pub fn exposed_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

fn parse_port(value: &str, what: &str, spec: &str) -> ItestResult<u16> {
    value.parse::<u16>().map_err(|_| {
        ItestError::config(format!("invalid {what} {value:?} in port mapping {spec:?}"))
    })
}

impl FromStr for PortSpec {
    type Err = ItestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mapping, protocol) = match s.rsplit_once('/') {
            Some((mapping, proto)) => (mapping, proto.parse()?),
            None => (s, PortProtocol::default()),
        };

        // Pull a bracketed IPv6 host address off the front before splitting on ':'.
        let (host_ip, mapping) = match mapping.strip_prefix('[') {
            Some(rest) => {
                let (ip, rest) = rest.split_once("]:").ok_or_else(|| {
                    ItestError::config(format!("invalid port mapping {s:?}: unterminated IPv6 address"))
                })?;
                (Some(ip.to_string()), rest)
            }
            None => (None, mapping),
        };

        let parts: Vec<&str> = mapping.split(':').collect();
        let (ip, host, container) = match (host_ip, parts.as_slice()) {
            (None, [container]) => (None, None, *container),
            (None, [host, container]) => (None, Some(*host), *container),
            (None, [ip, host, container]) => (Some(ip.to_string()), Some(*host), *container),
            (Some(ip), [host, container]) => (Some(ip), Some(*host), *container),
            _ => {
                return Err(ItestError::config(format!("invalid port mapping {s:?}")));
            }
        };

        let container_port = parse_port(container, "container port", s)?;
        if container_port == 0 {
            return Err(ItestError::config(format!(
                "invalid port mapping {s:?}: container port must be non-zero"
            )));
        }

        // An empty or zero host port asks the engine for an ephemeral one.
        let host_port = match host {
            None | Some("") => None,
            Some(port) => Some(parse_port(port, "host port", s)?).filter(|p| *p != 0),
        };

        Ok(Self {
            host_ip: ip.filter(|ip| !ip.is_empty()),
            host_port,
            container_port,
            protocol,
        })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.host_ip, self.host_port) {
            (Some(ip), port) if ip.contains(':') => {
                write!(f, "[{ip}]:{}:", port.map(|p| p.to_string()).unwrap_or_default())?
            }
            (Some(ip), port) => {
                write!(f, "{ip}:{}:", port.map(|p| p.to_string()).unwrap_or_default())?
            }
            (None, Some(port)) => write!(f, "{port}:")?,
            (None, None) => {}
        }
        write!(f, "{}", self.exposed_key())
    }
}

pub fn parse_ports(raw: &str) -> ItestResult<Vec<PortSpec>> {
    split_list(raw).map(str::parse).collect()
}

// ============================================================================
// VOLUMES
// ============================================================================

/// A `name:path` pair as written on the command line.
///
/// `name` is the bare volume name; the runtime prefixes (and possibly
/// suffixes) it before handing it to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub target: String,
}

impl FromStr for VolumeSpec {
    type Err = ItestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, target) = s.split_once(':').ok_or_else(|| {
            ItestError::config(format!("invalid volume {s:?}: expected `name:path`"))
        })?;
        if name.is_empty() {
            return Err(ItestError::config(format!("invalid volume {s:?}: empty name")));
        }
        if !target.starts_with('/') {
            return Err(ItestError::config(format!(
                "invalid volume {s:?}: mount path must be absolute"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            target: target.to_string(),
        })
    }
}

pub fn parse_volumes(raw: &str) -> ItestResult<Vec<VolumeSpec>> {
    split_list(raw).map(str::parse).collect()
}

/// Named-volume mount with its final, engine-facing name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub volume_name: String,
    pub target: String,
}

// ============================================================================
// LABELS
// ============================================================================

fn parse_label(s: &str) -> ItestResult<(String, String)> {
    let (key, value) = s.split_once('=').ok_or_else(|| {
        ItestError::config(format!("invalid label {s:?}: expected `key=value`"))
    })?;
    if key.is_empty() {
        return Err(ItestError::config(format!("invalid label {s:?}: empty key")));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse `key=value` pairs. A repeated key keeps its last value.
pub fn parse_labels(raw: &str) -> ItestResult<BTreeMap<String, String>> {
    split_list(raw).map(parse_label).collect()
}

// ============================================================================
// CONTAINER OPTIONS
// ============================================================================

/// When to pull the image before creating the container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullPolicy {
    /// Pull only if the image is not present locally.
    #[default]
    Missing,
    /// Always pull, refreshing mutable tags.
    Always,
}

impl FromStr for PullPolicy {
    type Err = ItestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "missing" => Ok(PullPolicy::Missing),
            "always" => Ok(PullPolicy::Always),
            _ => Err(ItestError::config(format!(
                "unknown pull policy {s:?}. Supported: missing, always"
            ))),
        }
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullPolicy::Missing => f.write_str("missing"),
            PullPolicy::Always => f.write_str("always"),
        }
    }
}

/// Everything the engine needs to start the container.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerOptions {
    pub image: ImageRef,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub mounts: Vec<MountSpec>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub pull_policy: PullPolicy,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: Duration,
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(lifecycle::DEFAULT_STOP_TIMEOUT_SECS)
}

impl ContainerOptions {
    pub fn new(image: ImageRef) -> Self {
        Self {
            image,
            env: BTreeMap::new(),
            ports: Vec::new(),
            mounts: Vec::new(),
            labels: BTreeMap::new(),
            pull_policy: PullPolicy::default(),
            stop_timeout: default_stop_timeout(),
        }
    }

    /// Validate option combinations the engine would reject later.
    pub fn sanitize(&self) -> ItestResult<()> {
        let mut targets = HashSet::new();
        for mount in &self.mounts {
            if !targets.insert(mount.target.as_str()) {
                return Err(ItestError::config(format!(
                    "duplicate mount point {:?}",
                    mount.target
                )));
            }
        }

        let mut ports = HashSet::new();
        for port in &self.ports {
            if !ports.insert(port) {
                return Err(ItestError::config(format!("duplicate port mapping {port}")));
            }
        }
        Ok(())
    }

    /// `KEY=value` strings in the form the engine API expects.
    pub fn env_pairs(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}
