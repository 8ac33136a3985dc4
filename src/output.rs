// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes; doubles as run observer.

use serde::Serialize;
use std::time::Instant;

use crate::pipeline::{RunObserver, Stage, StageResult, StageStatus};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.json_line(&JsonEvent {
                event: "success",
                message,
                stage: None,
                status: None,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a warning (suppressed in quiet mode).
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.json_line(&JsonEvent {
                event: "warning",
                message,
                stage: None,
                status: None,
                duration_secs: None,
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    stage: None,
                    status: None,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    fn json_line(&self, event: &JsonEvent<'_>) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }
}

impl RunObserver for Output {
    fn stage_started(&self, stage: &Stage) {
        match self.mode {
            OutputMode::Normal => {
                println!("==> {} ({})", stage.name(), stage.environment());
            }
            OutputMode::Quiet => {}
            OutputMode::Json => self.json_line(&JsonEvent {
                event: "stage_started",
                message: stage.environment().as_str(),
                stage: Some(stage.name().as_str()),
                status: None,
                duration_secs: None,
            }),
        }
    }

    fn cancellation_pending(&self, stage: &Stage) {
        match self.mode {
            OutputMode::Normal => println!(
                "... cancelling {} once {} is ready",
                stage.name(),
                stage.environment()
            ),
            OutputMode::Quiet => {}
            OutputMode::Json => self.json_line(&JsonEvent {
                event: "cancellation_pending",
                message: stage.environment().as_str(),
                stage: Some(stage.name().as_str()),
                status: None,
                duration_secs: None,
            }),
        }
    }

    fn stage_finished(&self, result: &StageResult) {
        match self.mode {
            OutputMode::Normal => match (result.status(), result.failure()) {
                (StageStatus::Skipped, _) => println!("--- {} skipped", result.stage()),
                (_, Some(failure)) => println!(
                    "!!! {} failed after {:.1}s: {}",
                    result.stage(),
                    result.duration().as_secs_f64(),
                    failure
                ),
                _ => println!(
                    "    {} done ({:.1}s)",
                    result.stage(),
                    result.duration().as_secs_f64()
                ),
            },
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let message = result
                    .failure()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                self.json_line(&JsonEvent {
                    event: "stage_finished",
                    message: &message,
                    stage: Some(result.stage().as_str()),
                    status: Some(result.status()),
                    duration_secs: Some(result.duration().as_secs_f64()),
                })
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<StageStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
