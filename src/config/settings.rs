// ABOUTME: Run-wide settings: timeouts, workspace, report tail, container runtime.
// ABOUTME: Every field has a default so the settings block is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::provision::RuntimeType;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Timeout applied to stages that do not set their own.
    #[serde(default, with = "humantime_serde")]
    pub stage_timeout: Option<Duration>,

    /// Lines of output kept for the failure report.
    #[serde(default = "default_output_tail")]
    pub output_tail: usize,

    /// Shared workspace directory, relative to the pipeline file.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Container runtime override (auto-detected when absent).
    #[serde(default)]
    pub runtime: Option<RuntimeType>,

    /// Container runtime socket override.
    #[serde(default)]
    pub socket: Option<String>,
}

fn default_output_tail() -> usize {
    20
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".halyard/workspace")
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            stage_timeout: None,
            output_tail: default_output_tail(),
            workspace: default_workspace(),
            runtime: None,
            socket: None,
        }
    }
}
