// ABOUTME: Integration tests for the local and container provisioners.
// ABOUTME: Container tests run against a local Docker/Podman daemon and skip when none is found.

use halyard::config::{ContainerEnvironment, LocalEnvironment, PipelineFile, PullPolicy};
use halyard::pipeline::{Executor, RunStatus, Stage, StageFailure, StageStatus};
use halyard::provision::{
    CommandLine, ContainerProvisioner, EnvironmentRouter, Invocation, LocalProvisioner,
    OutputBuffer, OutputStream, ProvisionErrorKind, Provisioner, RuntimeConfig, detect_local,
};
use halyard::resolve::PipelineConfig;
use halyard::types::{EnvironmentName, ImageRef, StageName};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn env(name: &str) -> EnvironmentName {
    EnvironmentName::new(name).unwrap()
}

fn script(stage: &str, environment: &str, body: &str) -> Stage {
    Stage::script(StageName::new(stage).unwrap(), env(environment), body)
}

fn local(workspace: &TempDir) -> LocalProvisioner {
    LocalProvisioner::new(workspace.path()).with_environment(env("host"), LocalEnvironment::default())
}

// =============================================================================
// Local provisioner
// =============================================================================

#[tokio::test]
async fn stages_share_the_workspace() {
    let workspace = TempDir::new().unwrap();
    let executor = Executor::new(local(&workspace));
    let stages = [
        script("write", "host", "echo built > artifact.txt"),
        script("read", "host", "cat artifact.txt"),
    ];

    let run = executor
        .run(&stages, &PipelineConfig::default())
        .await
        .unwrap();

    assert_eq!(run.status(), RunStatus::Succeeded);
    assert_eq!(run.results()[1].output().stdout(), "built");
}

#[tokio::test]
async fn stdout_and_stderr_are_captured_separately() {
    let workspace = TempDir::new().unwrap();
    let provisioner = local(&workspace);
    let handle = provisioner.acquire(&env("host")).await.unwrap();
    let output = OutputBuffer::new();
    let invocation = Invocation {
        command: CommandLine::Script("echo out; echo err >&2; printf partial".to_string()),
        env: BTreeMap::new(),
    };

    let code = provisioner.exec(&handle, &invocation, &output).await.unwrap();
    provisioner.release(handle).await.unwrap();

    assert_eq!(code, 0);
    let captured = output.snapshot();
    assert_eq!(captured.stdout(), "out\npartial");
    assert_eq!(captured.stderr(), "err");
    assert!(
        captured
            .lines()
            .iter()
            .any(|l| l.stream == OutputStream::Stderr)
    );
}

#[tokio::test]
async fn timeout_terminates_a_local_command() {
    let workspace = TempDir::new().unwrap();
    let executor = Executor::new(local(&workspace));
    let stages = [script("slow", "host", "sleep 30").with_timeout(Duration::from_millis(200))];

    let started = Instant::now();
    let run = executor
        .run(&stages, &PipelineConfig::default())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        run.results()[0].failure(),
        Some(&StageFailure::Timeout(Duration::from_millis(200)))
    );
}

#[tokio::test]
async fn timeout_stops_tools_started_by_the_stage() {
    let workspace = TempDir::new().unwrap();
    let executor = Executor::new(local(&workspace));
    let stages = [
        script("deploy", "host", "(sleep 2; touch deployed-late) ; true")
            .with_timeout(Duration::from_millis(300)),
    ];

    let run = executor
        .run(&stages, &PipelineConfig::default())
        .await
        .unwrap();
    assert_eq!(
        run.results()[0].failure(),
        Some(&StageFailure::Timeout(Duration::from_millis(300)))
    );

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!workspace.path().join("deployed-late").exists());
}

#[tokio::test]
async fn router_rejects_undeclared_environments() {
    let workspace = TempDir::new().unwrap();
    let file = PipelineFile::from_yaml(
        r#"
pipeline: smoke
environments:
  host:
    provider: local
stages:
  - name: hello
    environment: host
    run: [echo, hello]
"#,
    )
    .unwrap();
    let router = EnvironmentRouter::new(&file, workspace.path());

    let err = router.acquire(&env("elsewhere")).await.unwrap_err();
    assert_eq!(err.kind(), ProvisionErrorKind::UnknownEnvironment);

    let handle = router.acquire(&env("host")).await.unwrap();
    router.release(handle).await.unwrap();
}

// =============================================================================
// Container provisioner
// =============================================================================

/// Skip test if no local runtime available.
macro_rules! require_runtime {
    () => {
        match detect_local(&RuntimeConfig::default()) {
            Ok(info) => info,
            Err(_) => {
                eprintln!("Skipping test: no local container runtime found");
                return;
            }
        }
    };
}

fn alpine() -> ContainerEnvironment {
    ContainerEnvironment {
        image: ImageRef::parse("alpine:3.19").unwrap(),
        shell: "/bin/sh".to_string(),
        workdir: "/workspace".to_string(),
        env: BTreeMap::from([("GREETING".to_string(), "hello".to_string())]),
        volumes: Vec::new(),
        user: None,
        pull: PullPolicy::IfNotPresent,
    }
}

#[tokio::test]
async fn container_stage_sees_workspace_and_env() {
    let info = require_runtime!();
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("input.txt"), "from host\n").unwrap();

    let provisioner = ContainerProvisioner::new(
        RuntimeConfig {
            runtime: Some(info.runtime_type),
            socket: Some(info.socket_path.clone()),
        },
        workspace.path(),
    )
    .with_environment(env("box"), alpine());

    let handle = match provisioner.acquire(&env("box")).await {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Skipping test: runtime not usable: {e}");
            return;
        }
    };
    let output = OutputBuffer::new();
    let invocation = Invocation {
        command: CommandLine::Script("cat input.txt; echo $GREETING; exit 4".to_string()),
        env: BTreeMap::new(),
    };
    let code = provisioner.exec(&handle, &invocation, &output).await;
    provisioner.release(handle).await.unwrap();

    assert_eq!(code.unwrap(), 4);
    assert_eq!(output.snapshot().stdout(), "from host\nhello");
}

#[tokio::test]
async fn always_pull_refreshes_the_image() {
    let info = require_runtime!();
    let workspace = TempDir::new().unwrap();
    let provisioner = ContainerProvisioner::new(
        RuntimeConfig {
            runtime: Some(info.runtime_type),
            socket: Some(info.socket_path.clone()),
        },
        workspace.path(),
    )
    .with_environment(
        env("box"),
        ContainerEnvironment {
            pull: PullPolicy::Always,
            ..alpine()
        },
    );

    let handle = match provisioner.acquire(&env("box")).await {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Skipping test: runtime or registry not usable: {e}");
            return;
        }
    };
    let output = OutputBuffer::new();
    let invocation = Invocation {
        command: CommandLine::Script("echo pulled".to_string()),
        env: BTreeMap::new(),
    };
    let code = provisioner.exec(&handle, &invocation, &output).await;
    provisioner.release(handle).await.unwrap();

    assert_eq!(code.unwrap(), 0);
    assert_eq!(output.snapshot().stdout(), "pulled");
}

#[tokio::test]
async fn container_pipeline_runs_through_executor() {
    let info = require_runtime!();
    let workspace = TempDir::new().unwrap();
    let provisioner = ContainerProvisioner::new(
        RuntimeConfig {
            runtime: Some(info.runtime_type),
            socket: Some(info.socket_path.clone()),
        },
        workspace.path(),
    )
    .with_environment(env("box"), alpine());
    let executor = Executor::new(provisioner);
    let stages = [
        script("produce", "box", "echo 42 > tag"),
        script("consume", "box", "test \"$(cat tag)\" = 42"),
    ];

    let run = executor
        .run(&stages, &PipelineConfig::default())
        .await
        .unwrap();

    if let Some(StageFailure::Provision(e)) = run.results()[0].failure() {
        eprintln!("Skipping test: runtime not usable: {e}");
        return;
    }
    assert_eq!(run.status(), RunStatus::Succeeded);
    assert!(
        run.results()
            .iter()
            .all(|r| r.status() == StageStatus::Succeeded)
    );
}
