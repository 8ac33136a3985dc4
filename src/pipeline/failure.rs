// ABOUTME: Reasons a stage can fail.
// ABOUTME: Recorded on the StageResult; never raised as a run-level error.

use std::time::Duration;

use crate::provision::{ExecError, ProvisionError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageFailure {
    #[error("command exited with status {0}")]
    NonZeroExit(i32),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("command panicked")]
    Panicked,
}

impl StageFailure {
    /// Exit code, when the command ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StageFailure::NonZeroExit(code) => Some(*code),
            _ => None,
        }
    }
}
