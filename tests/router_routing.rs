// tests/router_routing.rs

mod common;
use crate::common::{init_tracing, TestResult};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use nodevisor::backend::{BackendRegistry, BackendRouter};
use nodevisor::errors::NodevisorError;
use nodevisor::types::{ContainerId, Signal};
use nodevisor_test_utils::builders::LaunchSpecBuilder;
use nodevisor_test_utils::recording_backend::{BackendCall, RecordingBackend};

const OVERRIDE: &str = "NODEVISOR_BACKEND";

type CallLog = Arc<Mutex<Vec<BackendCall>>>;

struct Fixture {
    router: BackendRouter,
    alpha: CallLog,
    beta: CallLog,
}

fn fixture_with(alpha: RecordingBackend, beta: RecordingBackend, probe: bool) -> Fixture {
    let alpha_log = alpha.calls_handle();
    let beta_log = beta.calls_handle();

    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(alpha));
    registry.register(Arc::new(beta));

    Fixture {
        router: BackendRouter::new(registry, Some("alpha".to_string()), OVERRIDE, probe),
        alpha: alpha_log,
        beta: beta_log,
    }
}

fn fixture() -> Fixture {
    fixture_with(RecordingBackend::new("alpha"), RecordingBackend::new("beta"), false)
}

fn calls(log: &CallLog) -> Vec<BackendCall> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn environment_hint_wins_over_default() -> TestResult {
    init_tracing();
    let fx = fixture();

    let spec = LaunchSpecBuilder::new("container_01", "/tmp/wd")
        .env(OVERRIDE, "beta")
        .build();
    let code = fx.router.launch(&spec).await?;

    assert_eq!(code, 0);
    assert_eq!(fx.router.route_of(&spec.container_id).as_deref(), Some("beta"));
    assert_eq!(calls(&fx.beta), vec![BackendCall::Launch(spec.container_id.clone())]);
    assert!(calls(&fx.alpha).is_empty());
    Ok(())
}

#[tokio::test]
async fn default_backend_used_without_hint() -> TestResult {
    init_tracing();
    let fx = fixture();

    let spec = LaunchSpecBuilder::new("container_02", "/tmp/wd").build();
    fx.router.launch(&spec).await?;

    assert_eq!(fx.router.route_of(&spec.container_id).as_deref(), Some("alpha"));
    assert_eq!(calls(&fx.alpha).len(), 1);
    Ok(())
}

#[tokio::test]
async fn later_calls_follow_the_recorded_route() -> TestResult {
    init_tracing();
    let fx = fixture();

    let spec = LaunchSpecBuilder::new("container_03", "/tmp/wd")
        .env(OVERRIDE, "beta")
        .build();
    fx.router.launch(&spec).await?;

    // Nothing about the later calls mentions the hint any more.
    fx.router
        .signal(&spec.container_id, "nobody", 77, Signal::Term)
        .await?;
    fx.router
        .delete_resources(Some(&spec.container_id), "nobody", Path::new("app"), &[])
        .await?;

    let beta = calls(&fx.beta);
    assert_eq!(
        beta,
        vec![
            BackendCall::Launch(spec.container_id.clone()),
            BackendCall::Signal {
                pid: 77,
                signal: Signal::Term
            },
            BackendCall::Delete {
                subdir: PathBuf::from("app")
            },
        ]
    );
    // Cleanup still fans out to the other backend, after the routed one.
    assert_eq!(
        calls(&fx.alpha),
        vec![BackendCall::Delete {
            subdir: PathBuf::from("app")
        }]
    );
    assert_eq!(fx.router.route_of(&spec.container_id), None);
    Ok(())
}

#[tokio::test]
async fn route_is_kept_when_launch_fails() -> TestResult {
    init_tracing();
    let fx = fixture_with(
        RecordingBackend::new("alpha").with_launch_exit(1),
        RecordingBackend::new("beta"),
        false,
    );

    let spec = LaunchSpecBuilder::new("container_04", "/tmp/wd").build();
    let code = fx.router.launch(&spec).await?;

    assert_eq!(code, 1);
    assert_eq!(fx.router.route_of(&spec.container_id).as_deref(), Some("alpha"));
    Ok(())
}

#[tokio::test]
async fn unknown_hint_is_rejected_without_recording_a_route() {
    init_tracing();
    let fx = fixture();

    let spec = LaunchSpecBuilder::new("container_05", "/tmp/wd")
        .env(OVERRIDE, "gamma")
        .build();

    match fx.router.launch(&spec).await {
        Err(NodevisorError::UnknownBackend(name)) => assert_eq!(name, "gamma"),
        other => panic!("expected UnknownBackend, got {other:?}"),
    }
    assert_eq!(fx.router.route_of(&spec.container_id), None);
    assert!(calls(&fx.alpha).is_empty());
    assert!(calls(&fx.beta).is_empty());
}

#[tokio::test]
async fn no_hint_and_no_default_is_unknown_backend() {
    init_tracing();
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(RecordingBackend::new("alpha")));
    let router = BackendRouter::new(registry, None, OVERRIDE, false);

    let spec = LaunchSpecBuilder::new("container_06", "/tmp/wd").build();
    assert!(matches!(
        router.launch(&spec).await,
        Err(NodevisorError::UnknownBackend(_))
    ));
}

#[tokio::test]
async fn signal_without_route_is_unknown_container() {
    init_tracing();
    let fx = fixture();

    let id = ContainerId::new("container_never_launched");
    match fx.router.signal(&id, "nobody", 1, Signal::Kill).await {
        Err(NodevisorError::UnknownContainer(c)) => assert_eq!(c, id.as_str()),
        other => panic!("expected UnknownContainer, got {other:?}"),
    }
}

#[tokio::test]
async fn degraded_mode_signals_only_the_backend_owning_the_pid() -> TestResult {
    init_tracing();
    let fx = fixture_with(
        RecordingBackend::new("alpha"),
        RecordingBackend::new("beta").with_alive_pid(900),
        true,
    );

    let id = ContainerId::new("container_after_restart");
    let delivered = fx.router.signal(&id, "nobody", 900, Signal::Term).await?;

    assert!(delivered);
    assert_eq!(calls(&fx.alpha), vec![BackendCall::IsAlive { pid: 900 }]);
    assert_eq!(
        calls(&fx.beta),
        vec![
            BackendCall::IsAlive { pid: 900 },
            BackendCall::Signal {
                pid: 900,
                signal: Signal::Term
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn degraded_mode_without_match_signals_nobody() -> TestResult {
    init_tracing();
    let fx = fixture_with(RecordingBackend::new("alpha"), RecordingBackend::new("beta"), true);

    let id = ContainerId::new("container_gone");
    let delivered = fx.router.signal(&id, "nobody", 901, Signal::Kill).await?;

    assert!(!delivered);
    let signalled = calls(&fx.alpha)
        .into_iter()
        .chain(calls(&fx.beta))
        .any(|c| matches!(c, BackendCall::Signal { .. }));
    assert!(!signalled);
    Ok(())
}

#[tokio::test]
async fn is_alive_probes_until_one_backend_confirms() -> TestResult {
    init_tracing();
    let fx = fixture_with(
        RecordingBackend::new("alpha").with_alive_pid(5),
        RecordingBackend::new("beta"),
        false,
    );

    assert!(fx.router.is_alive("nobody", 5).await?);
    assert!(calls(&fx.beta).is_empty());

    assert!(!fx.router.is_alive("nobody", 6).await?);
    assert_eq!(calls(&fx.beta), vec![BackendCall::IsAlive { pid: 6 }]);
    Ok(())
}

#[tokio::test]
async fn cleanup_tolerates_partial_backend_failure() -> TestResult {
    init_tracing();
    let fx = fixture_with(
        RecordingBackend::new("alpha").failing_delete(),
        RecordingBackend::new("beta"),
        false,
    );

    fx.router
        .delete_resources(None, "nobody", Path::new("x"), &[])
        .await?;
    assert_eq!(calls(&fx.alpha).len(), 1);
    assert_eq!(calls(&fx.beta).len(), 1);
    Ok(())
}

#[tokio::test]
async fn cleanup_fails_only_when_every_backend_fails() {
    init_tracing();
    let fx = fixture_with(
        RecordingBackend::new("alpha").failing_delete(),
        RecordingBackend::new("beta").failing_delete(),
        false,
    );

    assert!(matches!(
        fx.router
            .delete_resources(None, "nobody", Path::new("x"), &[])
            .await,
        Err(NodevisorError::CleanupFailed(_))
    ));
}

proptest! {
    #[test]
    fn routed_backend_receives_every_follow_up(hint_beta in any::<bool>(), pid in 1u32..100_000) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let fx = fixture();
            let mut builder = LaunchSpecBuilder::new("container_prop", "/tmp/wd");
            if hint_beta {
                builder = builder.env(OVERRIDE, "beta");
            }
            let spec = builder.build();

            fx.router.launch(&spec).await.unwrap();
            fx.router.signal(&spec.container_id, "nobody", pid, Signal::Quit).await.unwrap();

            let (chosen, other) = if hint_beta { (&fx.beta, &fx.alpha) } else { (&fx.alpha, &fx.beta) };
            assert_eq!(calls(chosen).len(), 2);
            assert!(calls(other).is_empty());
        });
    }
}
