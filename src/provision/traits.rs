// ABOUTME: The Provisioner seam between the executor and execution backends.
// ABOUTME: Defines ExecutionHandle, Invocation and the acquire/exec/release contract.

use super::error::{ExecError, ProvisionError};
use super::output::OutputBuffer;
use crate::types::{EnvironmentName, HandleId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// What a stage asks an environment to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Program and arguments, run without a shell.
    Argv(Vec<String>),
    /// Script text for the environment's shell (`<shell> -c <script>`).
    Script(String),
}

/// A fully rendered command plus the parameters exported to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: CommandLine,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    /// Argument vector, using `shell` for script commands.
    pub fn argv(&self, shell: &str) -> Vec<String> {
        match &self.command {
            CommandLine::Argv(args) => args.clone(),
            CommandLine::Script(script) => {
                vec![shell.to_string(), "-c".to_string(), script.clone()]
            }
        }
    }

    /// One-line rendering for plans and logs.
    pub fn display(&self) -> String {
        match &self.command {
            CommandLine::Argv(args) => args.join(" "),
            CommandLine::Script(script) => script.lines().collect::<Vec<_>>().join("; "),
        }
    }
}

/// An acquired execution environment.
///
/// Not `Clone`: a handle is released by value, so it cannot be released
/// twice or used afterwards.
#[derive(Debug)]
pub struct ExecutionHandle {
    id: HandleId,
    environment: EnvironmentName,
    acquired_at: DateTime<Utc>,
}

impl ExecutionHandle {
    pub fn new(id: HandleId, environment: EnvironmentName) -> Self {
        Self {
            id,
            environment,
            acquired_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &HandleId {
        &self.id
    }

    pub fn environment(&self) -> &EnvironmentName {
        &self.environment
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

/// Supplies isolated execution environments to stages.
///
/// The executor calls `acquire` once per stage, `exec` at most once per
/// handle, and `release` exactly once per acquired handle, including when
/// `exec` is abandoned because of a timeout or cancellation.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn acquire(&self, environment: &EnvironmentName)
    -> Result<ExecutionHandle, ProvisionError>;

    /// Run `invocation` and return its exit code. Output is streamed into
    /// `output` as it arrives.
    async fn exec(
        &self,
        handle: &ExecutionHandle,
        invocation: &Invocation,
        output: &OutputBuffer,
    ) -> Result<i32, ExecError>;

    async fn release(&self, handle: ExecutionHandle) -> Result<(), ProvisionError>;
}
