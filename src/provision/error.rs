// ABOUTME: Provisioning and exec error types.
// ABOUTME: SNAFU enum with a kind() accessor for programmatic handling.

use snafu::Snafu;

/// Failure to acquire or release an execution environment.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ProvisionError {
    #[snafu(display("environment '{environment}' is unavailable: {reason}"))]
    Unavailable { environment: String, reason: String },

    #[snafu(display("environment '{environment}' is not declared"))]
    UnknownEnvironment { environment: String },

    #[snafu(display("failed to release environment handle {handle}: {reason}"))]
    Release { handle: String, reason: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionErrorKind {
    Unavailable,
    UnknownEnvironment,
    Release,
}

impl ProvisionError {
    pub fn kind(&self) -> ProvisionErrorKind {
        match self {
            ProvisionError::Unavailable { .. } => ProvisionErrorKind::Unavailable,
            ProvisionError::UnknownEnvironment { .. } => ProvisionErrorKind::UnknownEnvironment,
            ProvisionError::Release { .. } => ProvisionErrorKind::Release,
        }
    }
}

/// Failure to run a command inside an acquired environment.
///
/// A command that runs and exits non-zero is not an `ExecError`; the exit
/// code is returned as data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("failed to start command: {0}")]
    Spawn(String),

    #[error("command terminated without an exit code")]
    Terminated,

    #[error("exec failed: {0}")]
    Failed(String),
}
