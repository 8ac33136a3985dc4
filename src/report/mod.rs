// ABOUTME: Summaries of finished pipeline runs.
// ABOUTME: Builds a serializable Summary and renders the human-readable view.

mod sink;

pub use sink::{ConsoleSink, FileSink, ReportError, ReportSink, TracingSink, publish};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use crate::diagnostics::Warning;
use crate::pipeline::{PipelineRun, RunStatus, StageResult, StageStatus};
use crate::types::PipelineName;

/// Default number of output lines kept for the first failure.
pub const DEFAULT_TAIL_LINES: usize = 20;

/// Turns a `PipelineRun` into a `Summary`.
#[derive(Debug, Clone)]
pub struct Reporter {
    tail_lines: usize,
    pipeline: Option<PipelineName>,
    host: String,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(DEFAULT_TAIL_LINES)
    }
}

impl Reporter {
    pub fn new(tail_lines: usize) -> Self {
        Self {
            tail_lines,
            pipeline: None,
            host: gethostname::gethostname().to_string_lossy().into_owned(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineName) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn report(&self, run: &PipelineRun) -> Summary {
        let failure = run.first_failure().map(|result| FailureSummary {
            stage: result.stage().to_string(),
            exit_code: result.exit_code(),
            reason: result
                .failure()
                .map(ToString::to_string)
                .unwrap_or_default(),
            output_tail: result.output().tail(self.tail_lines),
        });

        Summary {
            run_id: run.id().to_string(),
            pipeline: self.pipeline.as_ref().map(ToString::to_string),
            host: self.host.clone(),
            status: run.status(),
            started_at: run.started_at(),
            finished_at: run.finished_at(),
            duration_secs: run.duration().as_secs_f64(),
            stages: run.results().iter().map(StageSummary::from).collect(),
            failure,
            warnings: run.warnings().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    pub host: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub stages: Vec<StageSummary>,
    /// The first stage that failed, with the tail of its output.
    pub failure: Option<FailureSummary>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub name: String,
    pub environment: String,
    pub status: StageStatus,
    pub exit_code: Option<i32>,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<&StageResult> for StageSummary {
    fn from(result: &StageResult) -> Self {
        Self {
            name: result.stage().to_string(),
            environment: result.environment().to_string(),
            status: result.status(),
            exit_code: result.exit_code(),
            duration_secs: result.duration().as_secs_f64(),
            failure: result.failure().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub stage: String,
    pub exit_code: Option<i32>,
    pub reason: String,
    pub output_tail: Vec<String>,
}

impl Summary {
    /// One-line outcome, used in quiet mode.
    pub fn headline(&self) -> String {
        let name = self.pipeline.as_deref().unwrap_or("pipeline");
        match &self.failure {
            Some(failure) => format!(
                "{} {} {}: stage '{}' {}",
                name, self.run_id, self.status, failure.stage, failure.reason
            ),
            _ => format!(
                "{} {} {} in {:.1}s",
                name, self.run_id, self.status, self.duration_secs
            ),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let name = self.pipeline.as_deref().unwrap_or("pipeline");
        let _ = writeln!(
            out,
            "{} run {} on {}: {} ({:.1}s)",
            name,
            self.run_id,
            self.host,
            self.status.to_string().to_uppercase(),
            self.duration_secs
        );

        let width = self.stages.iter().map(|s| s.name.len()).max().unwrap_or(0);
        for stage in &self.stages {
            let timing = match stage.status {
                StageStatus::Skipped => String::new(),
                _ => format!("{:>7.1}s", stage.duration_secs),
            };
            let _ = write!(
                out,
                "  {:<width$}  {:<9} {}",
                stage.name,
                stage.status.to_string(),
                timing,
                width = width
            );
            if let Some(failure) = &stage.failure {
                let _ = write!(out, "  {}", failure);
            }
            out.push('\n');
        }

        if let Some(failure) = &self.failure {
            let _ = writeln!(out, "\nFirst failure: {} ({})", failure.stage, failure.reason);
            if !failure.output_tail.is_empty() {
                let _ = writeln!(out, "Last {} lines of output:", failure.output_tail.len());
                for line in &failure.output_tail {
                    let _ = writeln!(out, "  | {}", line);
                }
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "  - {}", warning);
            }
        }

        out
    }
}
