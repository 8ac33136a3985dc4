// ABOUTME: Runs stages in declared order inside provisioned environments.
// ABOUTME: Fails fast, honours timeouts and cancellation, always releases environments.

use chrono::Utc;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use super::cancel::CancelToken;
use super::execution::StageExecution;
use super::failure::StageFailure;
use super::run::{PipelineRun, StageResult, StageStatus};
use super::stage::Stage;
use super::state::Running;
use crate::diagnostics::{Diagnostics, Warning};
use crate::provision::{CapturedOutput, ExecutionHandle, Invocation, OutputBuffer, Provisioner};
use crate::resolve::{ConfigError, PipelineConfig};
use crate::types::RunId;

/// Receives progress callbacks while a run executes.
pub trait RunObserver: Send + Sync {
    fn stage_started(&self, _stage: &Stage) {}
    fn stage_finished(&self, _result: &StageResult) {}
    /// Cancellation arrived while the stage's environment was being acquired.
    fn cancellation_pending(&self, _stage: &Stage) {}
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    /// Applied to stages without their own timeout.
    pub default_timeout: Option<Duration>,
    /// Run only the stage with this name.
    pub only: Option<String>,
}

/// A stage with its command rendered, ready to run.
#[derive(Debug, Clone)]
pub struct PlannedStage<'a> {
    pub stage: &'a Stage,
    pub invocation: Invocation,
    pub timeout: Option<Duration>,
}

type CommandOutcome = Result<i32, StageFailure>;

pub struct Executor<P> {
    provisioner: P,
    options: ExecutorOptions,
    cancel: CancelToken,
    observer: Option<Arc<dyn RunObserver>>,
    run_id: Option<RunId>,
}

impl<P: Provisioner> Executor<P> {
    pub fn new(provisioner: P) -> Self {
        Self {
            provisioner,
            options: ExecutorOptions::default(),
            cancel: CancelToken::never(),
            observer: None,
            run_id: None,
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Use a caller-chosen run id instead of generating one per run.
    pub fn with_run_id(mut self, id: RunId) -> Self {
        self.run_id = Some(id);
        self
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Select stages, check every required key and render every command,
    /// without touching any environment.
    pub fn plan<'a>(
        &self,
        stages: &'a [Stage],
        config: &PipelineConfig,
    ) -> Result<Vec<PlannedStage<'a>>, ConfigError> {
        let selected = self.select(stages)?;

        for stage in &selected {
            stage.check(config)?;
        }

        selected
            .into_iter()
            .map(|stage| -> Result<_, ConfigError> {
                Ok(PlannedStage {
                    stage,
                    invocation: stage.render(config)?,
                    timeout: stage.timeout().or(self.options.default_timeout),
                })
            })
            .collect()
    }

    fn select<'a>(&self, stages: &'a [Stage]) -> Result<Vec<&'a Stage>, ConfigError> {
        let mut seen = BTreeSet::new();
        for stage in stages {
            if !seen.insert(stage.name()) {
                return Err(ConfigError::DuplicateStage(stage.name().clone()));
            }
        }

        match &self.options.only {
            None => Ok(stages.iter().collect()),
            Some(only) => stages
                .iter()
                .find(|s| s.name().as_str() == only)
                .map(|s| vec![s])
                .ok_or_else(|| ConfigError::UnknownStage(only.clone())),
        }
    }

    /// Execute `stages` in order against `config`.
    ///
    /// Configuration problems are returned before any environment is
    /// acquired. Once execution starts the run is always returned; stage
    /// failures are recorded in it.
    pub async fn run(
        &self,
        stages: &[Stage],
        config: &PipelineConfig,
    ) -> Result<PipelineRun, ConfigError> {
        let planned = self.plan(stages, config)?;
        let id = self.run_id.clone().unwrap_or_else(RunId::generate);
        let started_at = Utc::now();
        tracing::info!(run = %id, stages = planned.len(), "starting pipeline run");

        let mut diagnostics = Diagnostics::default();
        let mut results = Vec::with_capacity(planned.len());
        let mut halted = false;
        let mut cancelled = false;

        for step in &planned {
            let execution = StageExecution::new(step.stage);

            if self.cancel.is_cancelled() {
                cancelled = true;
            }
            let result = if halted || cancelled {
                tracing::debug!(stage = %step.stage.name(), "skipping stage");
                execution.skip()
            } else {
                self.notify(|o| o.stage_started(step.stage));
                self.execute(execution.start(), step, &mut diagnostics)
                    .await
            };

            if result.status() == StageStatus::Failed {
                halted = true;
                if matches!(result.failure(), Some(StageFailure::Cancelled)) {
                    cancelled = true;
                }
            }
            self.notify(|o| o.stage_finished(&result));
            results.push(result);
        }

        let run = PipelineRun {
            id,
            results,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            warnings: diagnostics.into_warnings(),
        };
        tracing::info!(run = %run.id(), status = %run.status(), "pipeline run finished");
        Ok(run)
    }

    fn notify(&self, f: impl FnOnce(&dyn RunObserver)) {
        if let Some(observer) = &self.observer {
            f(observer.as_ref());
        }
    }

    /// Acquire, run and release for one stage.
    async fn execute(
        &self,
        running: StageExecution<Running>,
        step: &PlannedStage<'_>,
        diagnostics: &mut Diagnostics,
    ) -> StageResult {
        let stage = step.stage;
        tracing::info!(stage = %stage.name(), environment = %stage.environment(), "running stage");

        // Acquire runs to completion so every created environment reaches release.
        let acquire = self.provisioner.acquire(stage.environment());
        tokio::pin!(acquire);
        let ready = tokio::select! {
            biased;
            acquired = &mut acquire => Some(acquired),
            _ = self.cancel.cancelled() => None,
        };
        let acquired = match ready {
            Some(acquired) => acquired,
            None => {
                tracing::warn!(
                    stage = %stage.name(),
                    environment = %stage.environment(),
                    "cancellation pending until environment is ready"
                );
                self.notify(|o| o.cancellation_pending(stage));
                acquire.await
            }
        };
        let handle = match acquired {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(stage = %stage.name(), error = %e, "environment unavailable");
                return running.fail(StageFailure::Provision(e), CapturedOutput::default());
            }
        };

        let output = OutputBuffer::new();
        let outcome = self.supervise(&handle, step, &output).await;

        let handle_id = handle.id().clone();
        if let Err(e) = self.provisioner.release(handle).await {
            diagnostics.warn(Warning::environment_release(format!(
                "stage '{}': failed to release {}: {}",
                stage.name(),
                handle_id,
                e
            )));
        }

        let captured = output.snapshot();
        let result = match outcome {
            Ok(code) => running.exited(code, captured),
            Err(failure) => running.fail(failure, captured),
        };
        match result.failure() {
            Some(failure) => {
                tracing::warn!(stage = %stage.name(), %failure, "stage failed")
            }
            None => {
                tracing::info!(stage = %stage.name(), elapsed = ?result.duration(), "stage succeeded")
            }
        }
        result
    }

    /// Run the command, racing it against the stage timeout and cancellation.
    ///
    /// Losing the race drops the command future, which terminates the
    /// command. Panics inside it are caught so the caller can still release.
    async fn supervise(
        &self,
        handle: &ExecutionHandle,
        step: &PlannedStage<'_>,
        output: &OutputBuffer,
    ) -> CommandOutcome {
        let command = AssertUnwindSafe(self.provisioner.exec(handle, &step.invocation, output))
            .catch_unwind();
        let deadline = async {
            match step.timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StageFailure::Cancelled),
            limit = deadline => Err(StageFailure::Timeout(limit)),
            result = command => match result {
                Ok(Ok(code)) => Ok(code),
                Ok(Err(e)) => Err(StageFailure::Exec(e)),
                Err(_) => {
                    tracing::error!(stage = %step.stage.name(), "command panicked");
                    Err(StageFailure::Panicked)
                }
            },
        }
    }
}
