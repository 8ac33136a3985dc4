// ABOUTME: Destinations for run summaries: console, tracing, and JSON files.
// ABOUTME: Sink failures are turned into warnings by publish().

use std::path::PathBuf;

use super::Summary;
use crate::diagnostics::Warning;
use crate::output::OutputMode;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Somewhere a summary can be delivered.
pub trait ReportSink {
    fn name(&self) -> &str;
    fn emit(&self, summary: &Summary) -> Result<(), ReportError>;
}

/// Emit `summary` to every sink in order.
///
/// A failing sink adds a warning to the summary, so sinks later in the
/// list report it.
pub fn publish(summary: &mut Summary, sinks: &[Box<dyn ReportSink>]) {
    for sink in sinks {
        if let Err(e) = sink.emit(summary) {
            let warning = Warning::report_sink(format!("{} sink: {}", sink.name(), e));
            tracing::warn!("{}", warning);
            summary.warnings.push(warning);
        }
    }
}

/// Prints the summary to stdout in the style of the output mode.
pub struct ConsoleSink {
    mode: OutputMode,
}

impl ConsoleSink {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

impl ReportSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn emit(&self, summary: &Summary) -> Result<(), ReportError> {
        match self.mode {
            OutputMode::Normal => print!("\n{}", summary.render_text()),
            OutputMode::Quiet => println!("{}", summary.headline()),
            OutputMode::Json => println!("{}", serde_json::to_string(summary)?),
        }
        Ok(())
    }
}

/// Logs the summary as structured tracing events.
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn emit(&self, summary: &Summary) -> Result<(), ReportError> {
        tracing::info!(
            run = %summary.run_id,
            status = %summary.status,
            duration_secs = summary.duration_secs,
            stages = summary.stages.len(),
            "pipeline summary"
        );
        if let Some(failure) = &summary.failure {
            tracing::error!(
                run = %summary.run_id,
                stage = %failure.stage,
                exit_code = ?failure.exit_code,
                reason = %failure.reason,
                "first failure"
            );
        }
        Ok(())
    }
}

/// Writes the summary as pretty-printed JSON.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn emit(&self, summary: &Summary) -> Result<(), ReportError> {
        let io_error = |source| ReportError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(&self.path, json).map_err(io_error)?;
        tracing::debug!(path = %self.path.display(), "wrote report");
        Ok(())
    }
}
