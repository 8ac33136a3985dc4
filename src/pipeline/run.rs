// ABOUTME: Records of a pipeline run: per-stage results and the run itself.
// ABOUTME: Results are finalized once and only exposed through accessors.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::failure::StageFailure;
use crate::diagnostics::Warning;
use crate::provision::CapturedOutput;
use crate::types::{EnvironmentName, RunId, StageName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Succeeded | StageStatus::Failed | StageStatus::Skipped
        )
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Final record of one stage.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub(super) stage: StageName,
    pub(super) environment: EnvironmentName,
    pub(super) status: StageStatus,
    pub(super) exit_code: Option<i32>,
    pub(super) failure: Option<StageFailure>,
    pub(super) output: CapturedOutput,
    pub(super) started_at: Option<DateTime<Utc>>,
    pub(super) finished_at: DateTime<Utc>,
    pub(super) duration: Duration,
}

impl StageResult {
    pub fn stage(&self) -> &StageName {
        &self.stage
    }

    pub fn environment(&self) -> &EnvironmentName {
        &self.environment
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    pub fn output(&self) -> &CapturedOutput {
        &self.output
    }

    /// `None` for stages that never ran.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One execution of a pipeline, returned whatever the outcome.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub(super) id: RunId,
    pub(super) results: Vec<StageResult>,
    pub(super) started_at: DateTime<Utc>,
    pub(super) finished_at: DateTime<Utc>,
    pub(super) cancelled: bool,
    pub(super) warnings: Vec<Warning>,
}

impl PipelineRun {
    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Results in declared stage order.
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Non-fatal problems such as environments that failed to release.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn status(&self) -> RunStatus {
        if self.cancelled {
            RunStatus::Cancelled
        } else if self
            .results
            .iter()
            .any(|r| r.status == StageStatus::Failed)
        {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    pub fn first_failure(&self) -> Option<&StageResult> {
        self.results
            .iter()
            .find(|r| r.status == StageStatus::Failed)
    }
}
