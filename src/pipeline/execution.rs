// ABOUTME: A stage moving through its lifecycle, parameterized by state marker.
// ABOUTME: Transitions consume self; terminal transitions yield a StageResult.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use super::failure::StageFailure;
use super::run::{StageResult, StageStatus};
use super::stage::Stage;
use super::state::{Pending, Running};
use crate::provision::CapturedOutput;
use crate::types::{EnvironmentName, StageName};

/// One stage of one run.
///
/// `Skipped` is only reachable from `Pending`, and `Succeeded`/`Failed`
/// only from `Running`; the compiler rejects anything else.
#[derive(Debug)]
pub struct StageExecution<S> {
    stage: StageName,
    environment: EnvironmentName,
    state: S,
}

impl StageExecution<Pending> {
    pub fn new(stage: &Stage) -> Self {
        Self {
            stage: stage.name().clone(),
            environment: stage.environment().clone(),
            state: Pending,
        }
    }

    pub fn start(self) -> StageExecution<Running> {
        StageExecution {
            stage: self.stage,
            environment: self.environment,
            state: Running {
                started_at: Utc::now(),
                clock: Instant::now(),
            },
        }
    }

    /// Finalize without running, because an earlier stage failed or the
    /// run was cancelled.
    pub fn skip(self) -> StageResult {
        StageResult {
            stage: self.stage,
            environment: self.environment,
            status: StageStatus::Skipped,
            exit_code: None,
            failure: None,
            output: CapturedOutput::default(),
            started_at: None,
            finished_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }
}

impl StageExecution<Running> {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.state.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.state.clock.elapsed()
    }

    pub fn succeed(self, output: CapturedOutput) -> StageResult {
        self.finish(StageStatus::Succeeded, Some(0), None, output)
    }

    pub fn fail(self, failure: StageFailure, output: CapturedOutput) -> StageResult {
        let exit_code = failure.exit_code();
        self.finish(StageStatus::Failed, exit_code, Some(failure), output)
    }

    /// Succeed on exit code 0, otherwise fail with `NonZeroExit`.
    pub fn exited(self, code: i32, output: CapturedOutput) -> StageResult {
        if code == 0 {
            self.succeed(output)
        } else {
            self.fail(StageFailure::NonZeroExit(code), output)
        }
    }

    fn finish(
        self,
        status: StageStatus,
        exit_code: Option<i32>,
        failure: Option<StageFailure>,
        output: CapturedOutput,
    ) -> StageResult {
        StageResult {
            stage: self.stage,
            environment: self.environment,
            status,
            exit_code,
            failure,
            output,
            started_at: Some(self.state.started_at),
            finished_at: Utc::now(),
            duration: self.state.clock.elapsed(),
        }
    }
}

impl<S> StageExecution<S> {
    pub fn stage(&self) -> &StageName {
        &self.stage
    }

    pub fn environment(&self) -> &EnvironmentName {
        &self.environment
    }
}
