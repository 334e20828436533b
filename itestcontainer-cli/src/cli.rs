use clap::Parser;
use itestcontainer::runtime::constants::{envs, lifecycle};
use itestcontainer::{ItestError, PullPolicy};

/// Launch one container for an integration test and tear it down on SIGINT/SIGTERM.
///
/// Exposed ports use Docker port syntax (`[[ip:]host_port:]container_port[/proto]`);
/// without a host port the engine assigns one. Volumes live in the engine's volume
/// space under the `bazel-itest-` prefix; when `TEST_TARGET` is set its SHA-256 is
/// appended so concurrent tests never share a volume.
#[derive(Parser, Debug)]
#[command(name = "itestcontainer", version)]
pub struct Cli {
    /// Name and optional tag of the container image to launch
    #[arg(long, value_name = "NAME[:TAG]", default_value = "")]
    pub name: String,

    /// Environment variable names to pass through to the container
    #[arg(long, value_name = "KEY[,KEY]", default_value = "")]
    pub env: String,

    /// Port mappings to expose
    #[arg(long, value_name = "SPEC[,SPEC]", default_value = "")]
    pub ports: String,

    /// Named volumes to mount
    #[arg(long, value_name = "NAME:PATH[,NAME:PATH]", default_value = "")]
    pub volume: String,

    /// Labels to set on the container
    #[arg(long, value_name = "KEY=VALUE[,KEY=VALUE]", default_value = "")]
    pub labels: String,

    /// Seconds to wait for the container to stop before killing it
    #[arg(
        long,
        value_name = "SECS",
        env = envs::STOP_TIMEOUT,
        default_value_t = lifecycle::DEFAULT_STOP_TIMEOUT_SECS
    )]
    pub stop_timeout: u64,

    /// When to pull the image: `missing` or `always`
    #[arg(
        long,
        value_name = "POLICY",
        env = envs::PULL_POLICY,
        default_value = "missing",
        value_parser = parse_pull_policy
    )]
    pub pull: PullPolicy,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

fn parse_pull_policy(s: &str) -> Result<PullPolicy, String> {
    s.parse().map_err(|e: ItestError| e.to_string())
}

/// Long flags that may be written with a single dash (`-name=redis`).
const LONG_FLAGS: &[&str] = &[
    "name",
    "env",
    "ports",
    "volume",
    "labels",
    "stop-timeout",
    "pull",
    "debug",
    "help",
    "version",
];

/// Long flags whose value may come as the following argument.
const VALUE_FLAGS: &[&str] = &[
    "name",
    "env",
    "ports",
    "volume",
    "labels",
    "stop-timeout",
    "pull",
];

/// Rewrite single-dash long flags to their double-dash form.
///
/// Test harnesses often pass flags in `-flag=value` style. The argument
/// following a value-taking flag (`--labels -debug`) is kept as is, and so
/// is everything after a bare `--`.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut passthrough = false;
    let mut expects_value = false;
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || passthrough {
                return arg;
            }
            if std::mem::take(&mut expects_value) {
                return arg;
            }
            if arg == "--" {
                passthrough = true;
                return arg;
            }
            let (arg, flag) = match arg.strip_prefix("--") {
                Some(rest) => (arg.clone(), rest.to_string()),
                None => match arg.strip_prefix('-') {
                    Some(rest) if LONG_FLAGS.contains(&flag_name(rest)) => {
                        (format!("-{arg}"), rest.to_string())
                    }
                    _ => return arg,
                },
            };
            expects_value = !flag.contains('=') && VALUE_FLAGS.contains(&flag.as_str());
            arg
        })
        .collect()
}

fn flag_name(arg: &str) -> &str {
    arg.split_once('=').map_or(arg, |(flag, _)| flag)
}
