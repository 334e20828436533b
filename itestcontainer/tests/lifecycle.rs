//! Integration tests for the supervisor (run, wait, terminate) against a fake engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itestcontainer::engine::PublishedPort;
use itestcontainer::{
    ContainerDetails, ContainerEngine, ContainerOptions, ItestError, ItestResult,
    RunningContainer, Supervisor,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;

// ============================================================================
// TEST FIXTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Run(String),
    Inspect(String),
    Terminate(String, Duration),
}

/// Engine that records every call and fails on demand.
#[derive(Default)]
struct FakeEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_run: bool,
    fail_inspect: bool,
    fail_terminate: bool,
}

impl FakeEngine {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn run(&self, options: &ContainerOptions) -> ItestResult<RunningContainer> {
        self.record(Call::Run(options.image.to_string()));
        if self.fail_run {
            return Err(ItestError::image(options.image.to_string(), "pull access denied"));
        }
        Ok(RunningContainer {
            id: "f00dfeedcafe0123456789".into(),
            image: options.image.to_string(),
        })
    }

    async fn inspect(&self, container: &RunningContainer) -> ItestResult<ContainerDetails> {
        self.record(Call::Inspect(container.id.clone()));
        if self.fail_inspect {
            return Err(ItestError::NotFound(container.id.clone()));
        }
        Ok(ContainerDetails {
            id: container.id.clone(),
            name: Some("eager_turing".into()),
            ports: vec![PublishedPort {
                container: "6379/tcp".into(),
                host_ip: Some("0.0.0.0".into()),
                host_port: Some(49153),
            }],
        })
    }

    async fn terminate(&self, container: &RunningContainer, timeout: Duration) -> ItestResult<()> {
        self.record(Call::Terminate(container.id.clone(), timeout));
        if self.fail_terminate {
            return Err(ItestError::Engine("daemon went away".into()));
        }
        Ok(())
    }
}

fn options() -> ContainerOptions {
    let mut opts = ContainerOptions::new("redis:7".parse().unwrap());
    opts.stop_timeout = Duration::from_secs(3);
    opts
}

const ID: &str = "f00dfeedcafe0123456789";

// ============================================================================
// LIFECYCLE TESTS
// ============================================================================

#[tokio::test]
async fn run_waits_for_shutdown_then_terminates_once() {
    let supervisor = Supervisor::new(FakeEngine::default());
    let (tx, rx) = oneshot::channel::<()>();

    let opts = options();
    let run = supervisor.run_until(&opts, async move {
        let _ = rx.await;
    });
    tokio::pin!(run);

    // Nothing terminates until shutdown fires.
    assert!(
        tokio::time::timeout(Duration::from_millis(50), &mut run)
            .await
            .is_err()
    );
    assert_eq!(
        supervisor.engine().calls(),
        vec![Call::Run("redis:7".into()), Call::Inspect(ID.into())]
    );

    tx.send(()).unwrap();
    run.await.unwrap();

    assert_eq!(
        supervisor.engine().calls(),
        vec![
            Call::Run("redis:7".into()),
            Call::Inspect(ID.into()),
            Call::Terminate(ID.into(), Duration::from_secs(3)),
        ]
    );
}

#[tokio::test]
async fn run_failure_skips_terminate() {
    let supervisor = Supervisor::new(FakeEngine {
        fail_run: true,
        ..Default::default()
    });

    let err = supervisor
        .run_until(&options(), async {})
        .await
        .unwrap_err();

    assert!(matches!(err, ItestError::Image { .. }));
    assert_eq!(supervisor.engine().calls(), vec![Call::Run("redis:7".into())]);
}

#[tokio::test]
async fn inspect_failure_is_not_fatal() {
    let supervisor = Supervisor::new(FakeEngine {
        fail_inspect: true,
        ..Default::default()
    });

    supervisor.run_until(&options(), async {}).await.unwrap();

    let calls = supervisor.engine().calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(calls[2], Call::Terminate(ref id, _) if id == ID));
}

#[tokio::test]
async fn terminate_failure_is_reported() {
    let supervisor = Supervisor::new(FakeEngine {
        fail_terminate: true,
        ..Default::default()
    });

    let err = supervisor
        .run_until(&options(), async {})
        .await
        .unwrap_err();

    assert!(err.to_string().contains("daemon went away"));
}
