// ABOUTME: Hooks system for pipeline run lifecycle events.
// ABOUTME: Discovers and executes scripts at pre-run, on-success, and on-failure points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::pipeline::RunStatus;
use crate::report::Summary;
use crate::types::{PipelineName, RunId};

/// Hook execution points in a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before any stage runs. Failure aborts the run.
    PreRun,
    /// After a successful run. Failure logs warning.
    OnSuccess,
    /// After a failed or cancelled run. Failure logs warning.
    OnFailure,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreRun => "pre-run",
            HookPoint::OnSuccess => "on-success",
            HookPoint::OnFailure => "on-failure",
        }
    }

    /// Whether failure at this hook point should abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreRun)
    }

    /// The completion hook for a finished run.
    pub fn after(status: RunStatus) -> Self {
        match status {
            RunStatus::Succeeded => HookPoint::OnSuccess,
            RunStatus::Failed | RunStatus::Cancelled => HookPoint::OnFailure,
        }
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub pipeline: PipelineName,
    pub run_id: RunId,
    pub host: String,
    /// `repository:tag` of the image, when both keys resolved.
    pub image: Option<String>,
    /// Unset for pre-run.
    pub status: Option<RunStatus>,
    pub failed_stage: Option<String>,
}

impl HookContext {
    pub fn new(pipeline: PipelineName, run_id: RunId, host: impl Into<String>) -> Self {
        Self {
            pipeline,
            run_id,
            host: host.into(),
            image: None,
            status: None,
            failed_stage: None,
        }
    }

    /// Fill in the outcome from a finished run's summary.
    pub fn with_summary(mut self, summary: &Summary) -> Self {
        self.status = Some(summary.status);
        self.failed_stage = summary.failure.as_ref().map(|f| f.stage.clone());
        self
    }

    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("HALYARD_PIPELINE".to_string(), self.pipeline.to_string());
        env.insert("HALYARD_RUN_ID".to_string(), self.run_id.to_string());
        env.insert("HALYARD_HOST".to_string(), self.host.clone());
        if let Some(ref image) = self.image {
            env.insert("HALYARD_IMAGE".to_string(), image.clone());
        }
        if let Some(status) = self.status {
            env.insert("HALYARD_STATUS".to_string(), status.to_string());
        }
        if let Some(ref stage) = self.failed_stage {
            env.insert("HALYARD_FAILED_STAGE".to_string(), stage.clone());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a hook runner looking in `<project_dir>/.halyard/hooks`.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            hooks_dir: project_dir.join(".halyard").join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let output = Command::new(&hook_path)
            .envs(context.to_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}
