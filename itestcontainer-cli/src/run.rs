use std::time::Duration;

use anyhow::Context;
use itestcontainer::runtime::constants::envs;
use itestcontainer::runtime::environment::{process_env, resolve_env};
use itestcontainer::runtime::options::{parse_labels, parse_ports, parse_volumes};
use itestcontainer::runtime::volumes::VolumeNamer;
use itestcontainer::util::ShutdownSignal;
use itestcontainer::{ContainerOptions, DockerEngine, ImageRef, ItestResult, Supervisor};

use crate::cli::Cli;

/// Turn the flag values into container options.
///
/// Every check that can fail without a container engine happens here, so bad
/// input is reported before connecting to the daemon.
pub fn build_options<F>(cli: &Cli, lookup: F) -> ItestResult<ContainerOptions>
where
    F: Fn(&str) -> Option<String>,
{
    let image: ImageRef = cli.name.parse()?;

    let ports = parse_ports(&cli.ports)?;
    let env = resolve_env(&cli.env, &lookup)?;

    let namer = VolumeNamer::new(lookup(envs::TEST_TARGET).as_deref());
    let mounts = namer.resolve_mounts(&parse_volumes(&cli.volume)?);

    let labels = parse_labels(&cli.labels)?;

    let mut options = ContainerOptions::new(image);
    options.env = env;
    options.ports = ports;
    options.mounts = mounts;
    options.labels = labels;
    options.pull_policy = cli.pull;
    options.stop_timeout = Duration::from_secs(cli.stop_timeout);
    options.sanitize()?;
    Ok(options)
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    // Install handlers first so a signal during startup still tears down.
    let shutdown = ShutdownSignal::install();

    let options = build_options(&cli, process_env)?;

    let ports: Vec<String> = options.ports.iter().map(ToString::to_string).collect();
    tracing::info!("Exposed Ports: {:?}", ports);
    // Values may be secrets; only names are logged.
    tracing::info!("Environment: {:?}", options.env.keys().collect::<Vec<_>>());
    tracing::info!(
        "Volume Mounts: {:?}",
        options
            .mounts
            .iter()
            .map(|m| format!("{}:{}", m.volume_name, m.target))
            .collect::<Vec<_>>()
    );
    tracing::info!("Labels: {:?}", options.labels);
    tracing::debug!(
        pull_policy = %options.pull_policy,
        stop_timeout = ?options.stop_timeout,
        "Container options"
    );

    let engine = DockerEngine::connect()
        .await
        .context("failed to connect to the container engine")?;

    Supervisor::new(engine)
        .run_until(&options, shutdown.recv())
        .await
        .with_context(|| format!("running {}", options.image))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use itestcontainer::ItestError;
    use std::collections::HashMap;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["itestcontainer"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_build_options_full() {
        let cli = cli(&[
            "--name=postgres:16",
            "--env=PGPASSWORD",
            "--ports=5432",
            "--volume=pgdata:/var/lib/postgresql/data",
            "--labels=team=db",
            "--stop-timeout=3",
        ]);
        let options = build_options(&cli, lookup(&[("PGPASSWORD", "pw")])).unwrap();

        assert_eq!(options.image.to_string(), "postgres:16");
        assert_eq!(options.env["PGPASSWORD"], "pw");
        assert_eq!(options.ports[0].exposed_key(), "5432/tcp");
        assert_eq!(options.mounts[0].volume_name, "bazel-itest-pgdata");
        assert_eq!(options.labels["team"], "db");
        assert_eq!(options.stop_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_build_options_suffixes_volumes_inside_tests() {
        let cli = cli(&["--name=redis", "--volume=cache:/data"]);
        let options = build_options(&cli, lookup(&[("TEST_TARGET", "abc")])).unwrap();
        assert_eq!(
            options.mounts[0].volume_name,
            "bazel-itest-cache-ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_build_options_requires_name() {
        let err = build_options(&cli(&[]), lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("`name` must be set"));
    }

    #[test]
    fn test_build_options_missing_env() {
        let cli = cli(&["--name=redis", "--env=REDIS_PASSWORD"]);
        let err = build_options(&cli, lookup(&[])).unwrap_err();
        assert!(matches!(err, ItestError::MissingEnv(_)));
    }

    #[test]
    fn test_build_options_duplicate_mount_target() {
        let cli = cli(&["--name=redis", "--volume=a:/data,b:/data"]);
        let err = build_options(&cli, lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("duplicate mount point"));
    }
}
