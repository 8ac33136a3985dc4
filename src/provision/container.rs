// ABOUTME: Runs stage commands inside throwaway containers via the Docker-compatible API.
// ABOUTME: One keep-alive container per acquired handle, force-removed on release.

use super::detection::detect_local;
use super::error::{
    ExecError, ProvisionError, ReleaseSnafu, UnavailableSnafu, UnknownEnvironmentSnafu,
};
use super::output::{OutputBuffer, OutputStream};
use super::traits::{ExecutionHandle, Invocation, Provisioner};
use super::types::{RuntimeConfig, RuntimeType};
use crate::config::{ContainerEnvironment, PullPolicy};
use crate::types::{ContainerId, EnvironmentName, HandleId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, HostConfig, Mount, MountTypeEnum};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, RemoveContainerOptions, StartContainerOptions,
};
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Keeps the container alive until it is removed; exits cleanly on SIGTERM.
const KEEP_ALIVE: &str = "trap 'exit 0' TERM; while :; do sleep 1; done";

pub const LABEL_MANAGED: &str = "halyard.managed";
pub const LABEL_ENVIRONMENT: &str = "halyard.environment";

const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(200);
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

struct Connection {
    client: Docker,
    runtime_type: RuntimeType,
}

/// Provisioner for `provider: container` environments.
pub struct ContainerProvisioner {
    runtime: RuntimeConfig,
    workspace: PathBuf,
    environments: BTreeMap<EnvironmentName, ContainerEnvironment>,
    connection: OnceCell<Connection>,
    next_handle: AtomicU64,
}

impl ContainerProvisioner {
    /// `workspace` must be absolute; it is bind-mounted into every container.
    pub fn new(runtime: RuntimeConfig, workspace: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            workspace: workspace.into(),
            environments: BTreeMap::new(),
            connection: OnceCell::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn with_environment(mut self, name: EnvironmentName, env: ContainerEnvironment) -> Self {
        self.environments.insert(name, env);
        self
    }

    fn environment(
        &self,
        name: &EnvironmentName,
    ) -> Result<&ContainerEnvironment, ProvisionError> {
        self.environments.get(name).ok_or_else(|| {
            UnknownEnvironmentSnafu {
                environment: name.as_str(),
            }
            .build()
        })
    }

    /// Connect on first use so pipelines without container stages never
    /// touch the runtime socket.
    async fn connection(&self) -> Result<&Connection, String> {
        self.connection
            .get_or_try_init(|| async {
                let info = detect_local(&self.runtime).map_err(|e| e.to_string())?;
                let client = Docker::connect_with_unix(
                    &info.socket_path,
                    120,
                    bollard::API_DEFAULT_VERSION,
                )
                .map_err(|e| format!("cannot connect to {}: {}", info.socket_path, e))?;
                client.ping().await.map_err(|e| {
                    format!(
                        "{} at {} not responding: {}",
                        info.runtime_type, info.socket_path, e
                    )
                })?;
                tracing::debug!(
                    runtime = %info.runtime_type,
                    socket = %info.socket_path,
                    "connected to container runtime"
                );
                Ok(Connection {
                    client,
                    runtime_type: info.runtime_type,
                })
            })
            .await
    }

    async fn ensure_image(
        &self,
        client: &Docker,
        image: &ImageRef,
        policy: PullPolicy,
    ) -> Result<(), String> {
        let image_name = image.to_string();

        if policy == PullPolicy::IfNotPresent {
            match client.inspect_image(&image_name).await {
                Ok(_) => return Ok(()),
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {}
                Err(e) => return Err(format!("failed to inspect {}: {}", image_name, e)),
            }
        }

        tracing::info!(image = %image_name, "pulling image");
        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };
        let mut stream =
            client.create_image(Some(opts), None, None::<bollard::auth::DockerCredentials>);
        while let Some(result) = stream.next().await {
            result.map_err(|e| format!("failed to pull {}: {}", image_name, e))?;
        }
        Ok(())
    }

    fn container_body(
        &self,
        name: &EnvironmentName,
        spec: &ContainerEnvironment,
    ) -> ContainerCreateBody {
        let mut mounts = vec![Mount {
            source: Some(self.workspace.to_string_lossy().into_owned()),
            target: Some(spec.workdir.clone()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(false),
            ..Default::default()
        }];
        mounts.extend(spec.volumes.iter().map(|v| Mount {
            source: Some(v.source.clone()),
            target: Some(v.target.clone()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(v.read_only),
            ..Default::default()
        }));

        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let labels = HashMap::from([
            (LABEL_MANAGED.to_string(), "true".to_string()),
            (LABEL_ENVIRONMENT.to_string(), name.to_string()),
        ]);

        ContainerCreateBody {
            image: Some(spec.image.to_string()),
            entrypoint: Some(vec![spec.shell.clone()]),
            cmd: Some(vec!["-c".to_string(), KEEP_ALIVE.to_string()]),
            working_dir: Some(spec.workdir.clone()),
            env: if env.is_empty() { None } else { Some(env) },
            user: spec.user.clone(),
            labels: Some(labels),
            host_config: Some(HostConfig {
                mounts: Some(mounts),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn remove(
        &self,
        client: &Docker,
        id: &ContainerId,
    ) -> Result<(), bollard::errors::Error> {
        let opts = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        client.remove_container(id.as_str(), Some(opts)).await
    }

    /// Wait for an exec to finish while draining its attached output.
    ///
    /// Podman does not always close attached exec streams, so completion is
    /// also detected by polling the exec state.
    async fn run_exec(
        &self,
        conn: &Connection,
        exec_id: &str,
        output: &OutputBuffer,
    ) -> Result<i64, ExecError> {
        let opts = StartExecOptions {
            detach: false,
            ..Default::default()
        };
        let started = conn
            .client
            .start_exec(exec_id, Some(opts))
            .await
            .map_err(|e| ExecError::Failed(e.to_string()))?;

        if let StartExecResults::Attached {
            output: mut stream,
            ..
        } = started
        {
            let drain = async {
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(LogOutput::StdOut { message }) => {
                            output.push_chunk(OutputStream::Stdout, &message)
                        }
                        Ok(LogOutput::StdErr { message }) => {
                            output.push_chunk(OutputStream::Stderr, &message)
                        }
                        Ok(_) => {}
                        Err(e) => return Err(ExecError::Failed(e.to_string())),
                    }
                }
                Ok(())
            };
            tokio::pin!(drain);

            if conn.runtime_type == RuntimeType::Podman {
                tokio::select! {
                    result = &mut drain => result?,
                    result = self.wait_exec(&conn.client, exec_id) => {
                        result?;
                        if let Ok(result) = tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut drain).await {
                            result?;
                        }
                    }
                }
            } else {
                drain.await?;
            }
        }

        self.wait_exec(&conn.client, exec_id).await
    }

    async fn wait_exec(&self, client: &Docker, exec_id: &str) -> Result<i64, ExecError> {
        loop {
            let details = client
                .inspect_exec(exec_id)
                .await
                .map_err(|e| ExecError::Failed(e.to_string()))?;
            if !details.running.unwrap_or(false) {
                return details.exit_code.ok_or(ExecError::Terminated);
            }
            tokio::time::sleep(EXEC_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Provisioner for ContainerProvisioner {
    async fn acquire(
        &self,
        environment: &EnvironmentName,
    ) -> Result<ExecutionHandle, ProvisionError> {
        let spec = self.environment(environment)?;
        let unavailable = |reason: String| {
            UnavailableSnafu {
                environment: environment.as_str(),
                reason,
            }
            .build()
        };

        let conn = self.connection().await.map_err(unavailable)?;
        self.ensure_image(&conn.client, &spec.image, spec.pull)
            .await
            .map_err(unavailable)?;

        let seq = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let container_name = format!("halyard-{}-{}-{}", environment, std::process::id(), seq);
        let opts = CreateContainerOptions {
            name: Some(container_name.clone()),
            ..Default::default()
        };
        let response = conn
            .client
            .create_container(Some(opts), self.container_body(environment, spec))
            .await
            .map_err(|e| unavailable(format!("failed to create {}: {}", container_name, e)))?;
        let id = ContainerId::new(response.id);

        if let Err(e) = conn
            .client
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
        {
            if let Err(cleanup) = self.remove(&conn.client, &id).await {
                tracing::warn!(container = %id.short(), error = %cleanup, "failed to remove unstarted container");
            }
            return Err(unavailable(format!("failed to start {}: {}", container_name, e)));
        }

        tracing::debug!(container = %container_name, image = %spec.image, "acquired container environment");
        Ok(ExecutionHandle::new(
            HandleId::new(id.as_str()),
            environment.clone(),
        ))
    }

    async fn exec(
        &self,
        handle: &ExecutionHandle,
        invocation: &Invocation,
        output: &OutputBuffer,
    ) -> Result<i32, ExecError> {
        let spec = self
            .environment(handle.environment())
            .map_err(|e| ExecError::Failed(e.to_string()))?;
        let conn = self.connection().await.map_err(ExecError::Failed)?;

        let env: Vec<String> = invocation
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let config = bollard::models::ExecConfig {
            cmd: Some(invocation.argv(&spec.shell)),
            env: if env.is_empty() { None } else { Some(env) },
            working_dir: Some(spec.workdir.clone()),
            user: spec.user.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let created = conn
            .client
            .create_exec(handle.id().as_str(), config)
            .await
            .map_err(|e| ExecError::Spawn(e.to_string()))?;

        let code = self.run_exec(conn, &created.id, output).await?;
        i32::try_from(code).map_err(|_| ExecError::Failed(format!("exit code out of range: {}", code)))
    }

    async fn release(&self, handle: ExecutionHandle) -> Result<(), ProvisionError> {
        let release_failed = |reason: String| {
            ReleaseSnafu {
                handle: handle.id().as_str(),
                reason,
            }
            .build()
        };
        let conn = self.connection().await.map_err(release_failed)?;
        let id = ContainerId::new(handle.id().as_str());

        match self.remove(&conn.client, &id).await {
            Ok(()) => {
                tracing::debug!(container = %id.short(), "released container environment");
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(release_failed(e.to_string())),
        }
    }
}
