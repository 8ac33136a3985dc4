// ABOUTME: Dispatches each environment to its local or container backend.
// ABOUTME: Built from the pipeline file's environments table.

use super::container::ContainerProvisioner;
use super::error::{ExecError, ProvisionError, UnknownEnvironmentSnafu};
use super::local::LocalProvisioner;
use super::output::OutputBuffer;
use super::traits::{ExecutionHandle, Invocation, Provisioner};
use super::types::RuntimeConfig;
use crate::config::{EnvironmentConfig, PipelineFile};
use crate::types::EnvironmentName;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Local,
    Container,
}

/// The provisioner used by `halyard run`.
pub struct EnvironmentRouter {
    routes: BTreeMap<EnvironmentName, Backend>,
    local: LocalProvisioner,
    container: ContainerProvisioner,
}

impl EnvironmentRouter {
    /// `workspace` should be absolute so container bind mounts resolve.
    pub fn new(file: &PipelineFile, workspace: &Path) -> Self {
        let runtime = RuntimeConfig {
            runtime: file.settings.runtime,
            socket: file.settings.socket.clone(),
        };
        let mut routes = BTreeMap::new();
        let mut local = LocalProvisioner::new(workspace);
        let mut container = ContainerProvisioner::new(runtime, workspace);

        for (name, env) in &file.environments {
            match env {
                EnvironmentConfig::Local(spec) => {
                    routes.insert(name.clone(), Backend::Local);
                    local = local.with_environment(name.clone(), spec.clone());
                }
                EnvironmentConfig::Container(spec) => {
                    routes.insert(name.clone(), Backend::Container);
                    container = container.with_environment(name.clone(), spec.clone());
                }
            }
        }

        Self {
            routes,
            local,
            container,
        }
    }

    fn backend(&self, name: &EnvironmentName) -> Result<&dyn Provisioner, ProvisionError> {
        match self.routes.get(name) {
            Some(Backend::Local) => Ok(&self.local),
            Some(Backend::Container) => Ok(&self.container),
            None => UnknownEnvironmentSnafu {
                environment: name.as_str(),
            }
            .fail(),
        }
    }
}

#[async_trait]
impl Provisioner for EnvironmentRouter {
    async fn acquire(
        &self,
        environment: &EnvironmentName,
    ) -> Result<ExecutionHandle, ProvisionError> {
        self.backend(environment)?.acquire(environment).await
    }

    async fn exec(
        &self,
        handle: &ExecutionHandle,
        invocation: &Invocation,
        output: &OutputBuffer,
    ) -> Result<i32, ExecError> {
        let backend = self
            .backend(handle.environment())
            .map_err(|e| ExecError::Failed(e.to_string()))?;
        backend.exec(handle, invocation, output).await
    }

    async fn release(&self, handle: ExecutionHandle) -> Result<(), ProvisionError> {
        self.backend(handle.environment())?.release(handle).await
    }
}
