// ABOUTME: Integration tests for the stage execution state machine.
// ABOUTME: Verifies the results produced by each terminal transition.

use halyard::pipeline::{Stage, StageExecution, StageFailure, StageStatus};
use halyard::provision::{OutputBuffer, OutputStream, ProvisionError};
use halyard::types::{EnvironmentName, StageName};
use std::time::Duration;

fn stage() -> Stage {
    Stage::script(
        StageName::new("build").unwrap(),
        EnvironmentName::new("kaniko").unwrap(),
        "make image",
    )
}

#[test]
fn skipped_stage_never_started() {
    let stage = stage();
    let result = StageExecution::new(&stage).skip();

    assert_eq!(result.status(), StageStatus::Skipped);
    assert!(result.status().is_terminal());
    assert!(result.started_at().is_none());
    assert_eq!(result.duration(), Duration::ZERO);
    assert!(result.output().is_empty());
    assert_eq!(result.environment().as_str(), "kaniko");
}

#[test]
fn exit_code_decides_success() {
    let stage = stage();
    let ok = StageExecution::new(&stage)
        .start()
        .exited(0, Default::default());
    assert_eq!(ok.status(), StageStatus::Succeeded);
    assert_eq!(ok.exit_code(), Some(0));
    assert!(ok.failure().is_none());

    let failed = StageExecution::new(&stage)
        .start()
        .exited(137, Default::default());
    assert_eq!(failed.status(), StageStatus::Failed);
    assert_eq!(failed.exit_code(), Some(137));
    assert_eq!(failed.failure(), Some(&StageFailure::NonZeroExit(137)));
}

#[test]
fn failures_without_exit_code() {
    let stage = stage();
    let provision = ProvisionError::Unavailable {
        environment: "kaniko".to_string(),
        reason: "no container runtime found".to_string(),
    };

    let result = StageExecution::new(&stage)
        .start()
        .fail(provision.into(), Default::default());

    assert_eq!(result.exit_code(), None);
    assert_eq!(
        result.failure().unwrap().to_string(),
        "environment 'kaniko' is unavailable: no container runtime found"
    );
}

#[test]
fn result_keeps_output_and_timing() {
    let stage = stage();
    let output = OutputBuffer::new();
    output.push_line(OutputStream::Stdout, "INFO[0001] Building");
    output.push_chunk(OutputStream::Stderr, b"error: push denied\n");

    let running = StageExecution::new(&stage).start();
    std::thread::sleep(Duration::from_millis(5));
    let started_at = running.started_at();
    let result = running.exited(1, output.snapshot());

    assert_eq!(result.started_at(), Some(started_at));
    assert!(result.finished_at() >= started_at);
    assert!(result.duration() >= Duration::from_millis(5));
    assert_eq!(result.output().tail(1), ["error: push denied"]);
}

#[test]
fn status_names() {
    assert_eq!(StageStatus::Succeeded.to_string(), "succeeded");
    assert_eq!(StageStatus::Skipped.to_string(), "skipped");
    assert!(!StageStatus::Running.is_terminal());
    assert!(!StageStatus::Pending.is_terminal());
}
